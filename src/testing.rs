//! In-process test harness.
//!
//! Sends a request through the exact pipeline the transport adapter uses,
//! without a socket or a runtime: same routing, same middleware chain,
//! same error responses, byte-for-byte. Handlers exercised here behave
//! identically when served over TCP.
//!
//! # Examples
//!
//! ```
//! use rapid_web::App;
//!
//! let mut app = App::new();
//! app.get("/", |ctx| ctx.string("Quick in action!"))?;
//!
//! let result = app.quick_test("GET", "/", None)?;
//! assert_eq!(result.status_code(), 200);
//! assert_eq!(result.body_str(), "Quick in action!");
//! # Ok::<(), rapid_web::Error>(())
//! ```

use std::str::FromStr;

use crate::{
    app::App,
    errors::Error,
    http::{request::Request, response::Response, types::Method},
};

/// Options for [`App::qtest`].
///
/// Construct with struct-update syntax over [`QtestOptions::default`]:
/// method `GET`, uri `/`, no headers, empty body.
#[derive(Debug, Clone)]
pub struct QtestOptions {
    /// Request method token (`"GET"`, `"POST"`, ...).
    pub method: String,
    /// Request target, query string included.
    pub uri: String,
    /// Request headers in order.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: Vec<u8>,
}

impl Default for QtestOptions {
    fn default() -> Self {
        Self {
            method: "GET".to_owned(),
            uri: "/".to_owned(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }
}

/// The response produced by a harness call.
#[derive(Debug, Clone)]
pub struct TestResult {
    response: Response,
}

impl TestResult {
    /// The response status code.
    pub fn status_code(&self) -> u16 {
        self.response.status()
    }

    /// The response body.
    pub fn body(&self) -> &[u8] {
        self.response.body()
    }

    /// The response body as text. Non-UTF-8 bytes are replaced.
    pub fn body_str(&self) -> String {
        String::from_utf8_lossy(self.response.body()).into_owned()
    }

    /// A response header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.response.header(name)
    }

    /// The underlying response value.
    pub fn response(&self) -> &Response {
        &self.response
    }
}

impl App {
    /// Dispatches one synthetic request and returns the response.
    ///
    /// The short form of [`App::qtest`] for requests without headers.
    /// `method` must be an upper-case method token; an unknown token is a
    /// harness usage error, not a `400` response.
    pub fn quick_test(
        &self,
        method: &str,
        target: &str,
        body: Option<&[u8]>,
    ) -> Result<TestResult, Error> {
        let mut options = QtestOptions {
            method: method.to_owned(),
            uri: target.to_owned(),
            ..QtestOptions::default()
        };
        if let Some(body) = body {
            options.body = body.to_vec();
        }

        self.qtest(options)
    }

    /// Dispatches one synthetic request built from `options`.
    ///
    /// Applies the same body ceiling as the transport adapter: a body over
    /// [`body_limit`](crate::limits::Limits::body_limit) yields the `413`
    /// response without reaching any handler.
    pub fn qtest(&self, options: QtestOptions) -> Result<TestResult, Error> {
        let method = Method::from_str(&options.method)?;

        // The wire parser rejects relative targets before dispatch; the
        // harness must refuse them too rather than route them.
        if !options.uri.starts_with('/') {
            return Err(Error::BadRequest("target must be an absolute path"));
        }

        if options.body.len() > self.limits().body_limit {
            return Ok(TestResult {
                response: Response::from_error(&Error::PayloadTooLarge),
            });
        }

        let mut request = Request::new(method, &options.uri).with_body(options.body);
        for (name, value) in &options.headers {
            request = request.with_header(name, value);
        }

        Ok(TestResult {
            response: self.dispatch(request),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::Limits;
    use std::io::Read;

    #[test]
    fn get_root() {
        let mut app = App::new();
        app.get("/", |ctx| ctx.string("Quick in action!")).unwrap();

        let result = app.quick_test("GET", "/", None).unwrap();
        assert_eq!(result.status_code(), 200);
        assert_eq!(result.body_str(), "Quick in action!");
    }

    #[test]
    fn post_with_options() {
        let mut app = App::new();
        app.post("/users", |ctx| {
            let tag = ctx.header("x-tag").unwrap_or("none").to_owned();
            ctx.status(201).set("x-tag-echo", &tag);
            let body = ctx.body().to_vec();
            ctx.send(&body)
        })
        .unwrap();

        let result = app
            .qtest(QtestOptions {
                method: "POST".to_owned(),
                uri: "/users".to_owned(),
                headers: vec![("x-tag".to_owned(), "alpha".to_owned())],
                body: b"{\"name\":\"ferris\"}".to_vec(),
            })
            .unwrap();

        assert_eq!(result.status_code(), 201);
        assert_eq!(result.header("x-tag-echo"), Some("alpha"));
        assert_eq!(result.body(), b"{\"name\":\"ferris\"}");
    }

    #[test]
    fn unknown_method_is_a_harness_error() {
        let app = App::new();
        assert!(app.quick_test("SPY", "/", None).is_err());
    }

    #[test]
    fn relative_target_is_rejected_like_the_wire() {
        let mut app = App::new();
        app.get("/users/:id", |ctx| ctx.string("found")).unwrap();

        let err = app.quick_test("GET", "users/42", None).unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));

        let result = app.quick_test("GET", "/users/42", None).unwrap();
        assert_eq!(result.status_code(), 200);
    }

    #[test]
    fn body_over_the_server_limit_is_413() {
        let mut app = App::with_limits(Limits {
            body_limit: 1024,
            ..Limits::default()
        });
        app.post("/upload", |ctx| ctx.string("never")).unwrap();

        let result = app
            .quick_test("POST", "/upload", Some(&vec![0u8; 2048]))
            .unwrap();

        assert_eq!(result.status_code(), 413);
        assert_eq!(result.body_str(), "Request body too large");
    }

    #[test]
    fn per_route_reader_cap_maps_to_413() {
        let mut app = App::new();
        app.post("/upload", |ctx| {
            let mut buf = Vec::new();
            match ctx.body_reader(1024).read_to_end(&mut buf) {
                Ok(_) => ctx.string("stored"),
                Err(_) => Err(Error::PayloadTooLarge),
            }
        })
        .unwrap();

        let result = app
            .quick_test("POST", "/upload", Some(&vec![0u8; 2048]))
            .unwrap();
        assert_eq!(result.status_code(), 413);
        assert_eq!(result.body_str(), "Request body too large");

        let result = app
            .quick_test("POST", "/upload", Some(b"small"))
            .unwrap();
        assert_eq!(result.status_code(), 200);
        assert_eq!(result.body_str(), "stored");
    }

    #[test]
    fn missing_route_matches_the_wire_error() {
        let app = App::new();
        let result = app.quick_test("GET", "/missing", None).unwrap();

        assert_eq!(result.status_code(), 404);
        assert_eq!(result.body_str(), "Not Found");
        assert_eq!(
            result.header("content-type"),
            Some("text/plain; charset=utf-8")
        );
    }

    #[test]
    fn query_strings_pass_through() {
        let mut app = App::new();
        app.get("/search", |ctx| {
            let q = ctx.request().query().unwrap_or("").to_owned();
            ctx.string(&q)
        })
        .unwrap();

        let result = app.quick_test("GET", "/search?q=ferris", None).unwrap();
        assert_eq!(result.body_str(), "q=ferris");
    }
}
