//! Per-request context handed to handlers and middleware.
//!
//! One [`Ctx`] is built per dispatch. It owns the parsed [`Request`], the
//! parameters bound by route matching, and the staged [`Response`]. Status
//! and header setters stage state; [`Ctx::string`], [`Ctx::send`] and
//! [`Ctx::file`] write the body and commit the response, after which any
//! further body write fails with
//! [`Error::ResponseAlreadySent`](crate::Error::ResponseAlreadySent).

use std::{
    any::Any,
    collections::HashMap,
    io::Cursor,
    path::Path,
};

use crate::{
    errors::Error,
    http::{
        request::{BodyReader, MaxBytesReader, Request},
        response::Response,
        types::Method,
    },
    router::route::Params,
};

/// Request context: the single argument every handler receives.
pub struct Ctx {
    request: Request,
    response: Response,
    params: Params,
    locals: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl Ctx {
    pub(crate) fn new(request: Request, params: Params) -> Self {
        Self {
            request,
            response: Response::new(),
            params,
            locals: HashMap::new(),
        }
    }

    pub(crate) fn into_response(self) -> Response {
        self.response
    }

    pub(crate) fn response(&self) -> &Response {
        &self.response
    }

    // REQUEST SIDE

    /// The parsed request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Request method.
    pub fn method(&self) -> Method {
        self.request.method()
    }

    /// Request path, without the query string.
    pub fn path(&self) -> &str {
        self.request.path()
    }

    /// First request header matching `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.header(name)
    }

    /// Route parameter bound under `name`, or `""` if the pattern has no
    /// such parameter.
    pub fn param(&self, name: &str) -> &str {
        self.params.get(name)
    }

    /// All parameters bound by route matching.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// The request body, fully buffered.
    pub fn body(&self) -> &[u8] {
        self.request.body()
    }

    /// Reader over the request body that refuses to yield more than
    /// `limit` bytes. Reading past the limit fails with an
    /// [`InvalidData`](std::io::ErrorKind::InvalidData) error carrying the
    /// [`Error::PayloadTooLarge`](crate::Error::PayloadTooLarge) message,
    /// for handlers that enforce a per-route cap below the server-wide one.
    pub fn body_reader(&self, limit: usize) -> MaxBytesReader<BodyReader<'_>> {
        MaxBytesReader::new(Cursor::new(self.request.body()), limit)
    }

    // RESPONSE SIDE

    /// Stages a response header. Chainable; last write for a name wins.
    pub fn set(&mut self, name: &str, value: &str) -> &mut Self {
        self.response.set_header(name, value);
        self
    }

    /// Stages the response status. Chainable; last call wins. Unset status
    /// resolves to `200` on commit.
    pub fn status(&mut self, code: u16) -> &mut Self {
        self.response.set_status(code);
        self
    }

    /// Writes a text body and commits the response.
    pub fn string(&mut self, body: &str) -> Result<(), Error> {
        self.response.commit(body.as_bytes())
    }

    /// Writes a raw body and commits the response.
    pub fn send(&mut self, body: &[u8]) -> Result<(), Error> {
        self.response.commit(body)
    }

    /// Writes a text body and commits the response, staging status `200`
    /// when none was set. [`Ctx::string`] leaves an unset status alone.
    pub fn send_string(&mut self, body: &str) -> Result<(), Error> {
        if self.response.staged_status().is_none() {
            self.response.set_status(200);
        }
        self.response.commit(body.as_bytes())
    }

    /// Reads `path` from disk, stages a `content-type` guessed from its
    /// extension, and commits the file contents as the body.
    ///
    /// A missing file yields [`Error::FileNotFound`], which the dispatcher
    /// turns into a `404`; other I/O failures propagate as
    /// [`Error::Io`](crate::Error::Io).
    pub fn file(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        if self.response.is_committed() {
            return Err(Error::ResponseAlreadySent);
        }

        let path = path.as_ref();
        let contents = match std::fs::read(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::FileNotFound(path.to_owned()));
            }
            Err(err) => return Err(Error::Io(err)),
        };

        let mime = mime_guess::from_path(path).first_or_octet_stream();
        self.response.set_header("content-type", mime.as_ref());
        self.response.commit(&contents)
    }

    // LOCALS

    /// Stores a request-scoped value under `name`, replacing any previous
    /// value. Used by middleware to pass data to inner handlers.
    pub fn set_local(&mut self, name: &str, value: impl Any + Send + Sync) {
        self.locals.insert(name.to_owned(), Box::new(value));
    }

    /// The value stored under `name`, if present and of type `T`.
    pub fn local<T: Any>(&self, name: &str) -> Option<&T> {
        self.locals.get(name).and_then(|v| v.downcast_ref())
    }
}
