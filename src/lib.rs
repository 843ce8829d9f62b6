//! rapid_web - Minimalist HTTP framework for fast, well-tested services
//!
//! A small request-dispatch core in the spirit of express-style routers:
//! register routes and middleware on an [`App`], then serve it over TCP or
//! drive it synchronously from tests through the built-in harness. Both
//! paths funnel every request through the same dispatcher, so what the
//! harness shows is what goes on the wire.
//!
//! # Highlights
//!
//! - **Pattern routing** - literal segments, `:name` parameters and a
//!   trailing `*` wildcard, with `405` + `Allow` for near misses
//! - **Composable middleware** - wrap handlers, short-circuit early, pass
//!   typed values inward via request locals
//! - **Commit-once responses** - status and headers stage freely, the
//!   first body write wins and later ones fail loudly
//! - **In-process test harness** - no socket, no runtime, byte-identical
//!   responses
//! - **Explicit limits** - body and header ceilings, worker pool size and
//!   timeouts in one [`limits::Limits`] value
//!
//! # Examples
//!
//! Quick start:
//! ```no_run
//! use rapid_web::App;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), rapid_web::Error> {
//!     let mut app = App::new();
//!
//!     app.get("/", |ctx| ctx.string("Quick in action!"))?;
//!     app.get("/users/:id", |ctx| {
//!         let id = ctx.param("id").to_owned();
//!         ctx.status(200).string(&id)
//!     })?;
//!
//!     app.listen("127.0.0.1:8080").await
//! }
//! ```
//! Middleware and limits:
//! ```no_run
//! use rapid_web::{App, Handler, limits::Limits};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), rapid_web::Error> {
//!     let mut app = App::with_limits(Limits {
//!         body_limit: 16 * 1024,
//!         ..Limits::default()
//!     });
//!
//!     app.use_(|next: Handler| {
//!         Arc::new(move |ctx| {
//!             if ctx.header("authorization").is_none() {
//!                 ctx.status(401);
//!                 return ctx.string("Unauthorized");
//!             }
//!             next(ctx)
//!         })
//!     })?;
//!     app.post("/upload", |ctx| {
//!         let size = ctx.body().len().to_string();
//!         ctx.status(201).string(&size)
//!     })?;
//!
//!     app.listen("127.0.0.1:8080").await
//! }
//! ```
//! Testing without a socket:
//! ```
//! use rapid_web::App;
//!
//! let mut app = App::new();
//! app.get("/ping", |ctx| ctx.string("pong"))?;
//!
//! let result = app.quick_test("GET", "/ping", None)?;
//! assert_eq!(result.status_code(), 200);
//! assert_eq!(result.body_str(), "pong");
//! # Ok::<(), rapid_web::Error>(())
//! ```

pub(crate) mod http {
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub(crate) mod router {
    pub(crate) mod route;
    pub(crate) mod table;
}
pub(crate) mod server {
    pub(crate) mod connection;
}
pub(crate) mod app;
pub(crate) mod ctx;
pub(crate) mod errors;
pub(crate) mod middleware;
pub(crate) mod testing;
pub mod limits;

pub use crate::{
    app::App,
    ctx::Ctx,
    errors::Error,
    http::{
        request::{BodyReader, MaxBytesReader, Request},
        response::Response,
        types::{Method, StatusCode},
    },
    middleware::{Handler, Middleware},
    router::{route::Params, table::RouteInfo},
    testing::{QtestOptions, TestResult},
};

#[cfg(test)]
pub mod tools {
    use std::str::from_utf8;

    #[inline]
    pub fn str_op(value: &[u8]) -> &str {
        from_utf8(value).unwrap()
    }
}
