//! Error taxonomy of the dispatch core.
//!
//! Two families live here:
//!
//! - **Registration-time errors** ([`Error::DuplicateRoute`],
//!   [`Error::RouteCapacity`], [`Error::AlreadyServing`]) are fatal to
//!   startup and returned from the registration API.
//! - **Per-request errors** are converted into HTTP responses at the
//!   dispatcher boundary and never crash a serving task. Each maps to a
//!   status code via [`Error::response_status`].

use crate::http::types::{Method, StatusCode};
use std::{io, path::PathBuf};
use thiserror::Error;

/// Errors produced by registration, dispatch and lifecycle operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An identical `(method, pattern)` pair is already registered.
    #[error("duplicate route: {method} {pattern}")]
    DuplicateRoute {
        /// Method of the conflicting registration.
        method: Method,
        /// Pattern of the conflicting registration.
        pattern: String,
    },

    /// The configured route capacity is exhausted.
    #[error("route capacity exhausted ({cap} routes)")]
    RouteCapacity {
        /// Value of [`Limits::route_capacity`](crate::limits::Limits::route_capacity).
        cap: usize,
    },

    /// Registration was attempted after the app was shared with a serving
    /// task. The route table is read-only once serving begins.
    #[error("route registration is not allowed after serving has started")]
    AlreadyServing,

    /// No registered pattern matches the requested path. Maps to `404`.
    #[error("no route matches the requested path")]
    NotFound,

    /// The path matches a pattern bound to different methods. Maps to `405`
    /// with an `Allow` header listing `allow`.
    #[error("method not allowed")]
    MethodNotAllowed {
        /// Methods that are valid for the requested path.
        allow: Vec<Method>,
    },

    /// The request body exceeds the configured byte ceiling. Maps to `413`.
    #[error("request body too large")]
    PayloadTooLarge,

    /// The request head exceeds the configured byte ceiling. Maps to `431`.
    #[error("request head too large")]
    HeadersTooLarge,

    /// The raw request bytes do not form a parseable HTTP/1.x request.
    /// Maps to `400`.
    #[error("malformed request: {0}")]
    BadRequest(&'static str),

    /// A body writer was called on a [`Ctx`](crate::Ctx) whose response is
    /// already committed. A programmer-error guard: the dispatcher logs it,
    /// the committed response is left untouched.
    #[error("response already sent")]
    ResponseAlreadySent,

    /// [`Ctx::file`](crate::Ctx::file) could not find the file. Maps to
    /// `404` unless the handler staged a different status first.
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    /// Shutdown gave up waiting for in-flight requests.
    #[error("shutdown timed out with requests still in flight")]
    ShutdownTimeout,

    /// Transport-level I/O failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// The status code this error produces when it reaches the dispatcher
    /// without a committed response.
    pub(crate) fn response_status(&self) -> StatusCode {
        match self {
            Error::NotFound | Error::FileNotFound(_) => StatusCode::NotFound,
            Error::MethodNotAllowed { .. } => StatusCode::MethodNotAllowed,
            Error::PayloadTooLarge => StatusCode::PayloadTooLarge,
            Error::HeadersTooLarge => StatusCode::RequestHeaderFieldsTooLarge,
            Error::BadRequest(_) => StatusCode::BadRequest,
            _ => StatusCode::InternalServerError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases: [(Error, u16); 6] = [
            (Error::NotFound, 404),
            (
                Error::MethodNotAllowed {
                    allow: vec![Method::Get],
                },
                405,
            ),
            (Error::PayloadTooLarge, 413),
            (Error::HeadersTooLarge, 431),
            (Error::BadRequest("bad"), 400),
            (Error::ResponseAlreadySent, 500),
        ];

        for (err, code) in cases {
            assert_eq!(err.response_status().as_u16(), code);
        }
    }

    #[test]
    fn display_is_stable() {
        let err = Error::DuplicateRoute {
            method: Method::Get,
            pattern: "/users/:id".into(),
        };
        assert_eq!(err.to_string(), "duplicate route: GET /users/:id");
        assert_eq!(
            Error::PayloadTooLarge.to_string(),
            "request body too large"
        );
    }
}
