//! Inbound request representation and wire parsing.
//!
//! A [`Request`] is an owned, transport-independent value: the socket
//! adapter parses one out of raw bytes, the test harness constructs one
//! directly, and both feed the same dispatcher. Nothing in the dispatch
//! core ever touches a socket type.
//!
//! # Wire format
//!
//! The parser accepts `HTTP/1.1` and `HTTP/1.0` requests:
//!
//! ```text
//! [METHOD] SP [TARGET] SP [VERSION] CRLF
//! [NAME]: [VALUE] CRLF
//! ...
//! CRLF
//! [BODY]
//! ```
//!
//! - The head (request line plus headers) must be UTF-8; the body is raw
//!   bytes.
//! - `CRLF` is required exactly; a bare `LF` is a parse error.
//! - Bodies require an explicit `Content-Length`. `Transfer-Encoding:
//!   chunked` is not supported.

use crate::{
    errors::Error,
    http::types::Method,
    limits::Limits,
};
use std::io::{self, Cursor, Read};

/// An inbound HTTP request, fully read into memory.
///
/// Header name comparisons are case-insensitive; values are preserved
/// byte-for-byte.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Request {
    /// Creates a request with no headers and an empty body.
    ///
    /// `target` may carry a query string (`/search?q=ferris`); it is split
    /// off and kept separately from the routed path.
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
            None => (target.to_owned(), None),
        };

        Self {
            method,
            path,
            query,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Adds a header. Repeated names are kept in order; [`Request::header`]
    /// returns the first match.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Replaces the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// The request method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// The path component of the target, without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw query string, if the target had one.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// First value of the named header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All headers in arrival order.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// The raw body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub(crate) fn from_head(head: Head, body: Vec<u8>) -> Self {
        Self {
            method: head.method,
            path: head.path,
            query: head.query,
            headers: head.headers,
            body,
        }
    }
}

/// Parsed request head, before the body has been read off the wire.
#[derive(Debug)]
pub(crate) struct Head {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Option<String>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) content_length: usize,
    pub(crate) keep_alive: bool,
}

impl Head {
    /// Parses the request line and headers from `raw`, the bytes up to but
    /// excluding the `\r\n\r\n` terminator.
    pub(crate) fn parse(raw: &[u8], limits: &Limits) -> Result<Self, Error> {
        if raw.len() > limits.max_header_bytes {
            return Err(Error::HeadersTooLarge);
        }

        let head = simdutf8::basic::from_utf8(raw)
            .map_err(|_| Error::BadRequest("request head is not UTF-8"))?;

        let mut lines = head.split("\r\n");
        let first = lines
            .next()
            .ok_or(Error::BadRequest("empty request head"))?;

        let mut parts = first.split(' ');
        let method = Method::from_bytes(
            parts
                .next()
                .ok_or(Error::BadRequest("missing method"))?
                .as_bytes(),
        )?;
        let target = parts.next().ok_or(Error::BadRequest("missing target"))?;
        let version = parts.next().ok_or(Error::BadRequest("missing version"))?;
        if parts.next().is_some() {
            return Err(Error::BadRequest("malformed request line"));
        }

        if !target.starts_with('/') {
            return Err(Error::BadRequest("target must be an absolute path"));
        }

        // HTTP/1.1 defaults to keep-alive, HTTP/1.0 to close.
        let mut keep_alive = match version {
            "HTTP/1.1" => true,
            "HTTP/1.0" => false,
            _ => return Err(Error::BadRequest("unsupported HTTP version")),
        };

        let mut headers = Vec::new();
        let mut content_length = 0usize;

        for line in lines {
            if line.is_empty() {
                return Err(Error::BadRequest("empty header line"));
            }
            let (name, value) = line
                .split_once(':')
                .ok_or(Error::BadRequest("header line without a colon"))?;
            if name.is_empty() {
                return Err(Error::BadRequest("empty header name"));
            }
            let value = value.trim_start_matches(' ');

            if name.eq_ignore_ascii_case("content-length") {
                content_length = value
                    .parse()
                    .map_err(|_| Error::BadRequest("invalid content-length"))?;
            } else if name.eq_ignore_ascii_case("connection") {
                if value.eq_ignore_ascii_case("close") {
                    keep_alive = false;
                } else if value.eq_ignore_ascii_case("keep-alive") {
                    keep_alive = true;
                }
            }

            headers.push((name.to_owned(), value.to_owned()));
        }

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
            None => (target.to_owned(), None),
        };

        Ok(Self {
            method,
            path,
            query,
            headers,
            content_length,
            keep_alive,
        })
    }
}

/// A [`Read`] adapter over a request body, for handlers that consume the
/// body as a stream. Produced by [`Ctx::body_reader`](crate::Ctx::body_reader).
pub type BodyReader<'a> = Cursor<&'a [u8]>;

/// A reader that fails once more than `limit` bytes have been read.
///
/// The per-request analogue of [`Limits::body_limit`]: wrap any reader in
/// it to enforce a tighter ceiling inside a single handler. Exceeding the
/// limit aborts the read with an [`io::ErrorKind::InvalidData`] error, not
/// the connection.
///
/// # Examples
///
/// ```
/// use rapid_web::MaxBytesReader;
/// use std::io::Read;
///
/// let mut reader = MaxBytesReader::new(&b"0123456789"[..], 4);
/// let mut buf = Vec::new();
/// assert!(reader.read_to_end(&mut buf).is_err());
/// ```
#[derive(Debug)]
pub struct MaxBytesReader<R> {
    inner: R,
    remaining: usize,
}

impl<R: Read> MaxBytesReader<R> {
    /// Wraps `inner`, allowing at most `limit` bytes to be read.
    pub fn new(inner: R, limit: usize) -> Self {
        Self {
            inner,
            remaining: limit,
        }
    }
}

impl<R: Read> Read for MaxBytesReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        if self.remaining == 0 {
            // Probe for one more byte: EOF exactly at the limit is fine.
            let mut probe = [0u8; 1];
            return match self.inner.read(&mut probe)? {
                0 => Ok(0),
                _ => Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    Error::PayloadTooLarge.to_string(),
                )),
            };
        }

        let cap = buf.len().min(self.remaining);
        let read = self.inner.read(&mut buf[..cap])?;
        self.remaining -= read;
        Ok(read)
    }
}


#[cfg(test)]
mod request_tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let req = Request::new(Method::Get, "/")
            .with_header("Content-Type", "text/plain")
            .with_header("X-Tag", "a")
            .with_header("x-tag", "b");

        assert_eq!(req.header("content-type"), Some("text/plain"));
        assert_eq!(req.header("X-TAG"), Some("a"));
        assert_eq!(req.header("missing"), None);
    }

    #[test]
    fn target_query_split() {
        let req = Request::new(Method::Get, "/users/42?fields=name");

        assert_eq!(req.path(), "/users/42");
        assert_eq!(req.query(), Some("fields=name"));
    }
}

#[cfg(test)]
mod max_bytes_tests {
    use super::*;

    #[test]
    fn under_the_limit_reads_everything() {
        let mut reader = MaxBytesReader::new(&b"hello"[..], 16);
        let mut buf = Vec::new();

        assert_eq!(reader.read_to_end(&mut buf).unwrap(), 5);
        assert_eq!(buf, b"hello");
    }

    #[test]
    fn exactly_the_limit_is_allowed() {
        let mut reader = MaxBytesReader::new(&b"hello"[..], 5);
        let mut buf = Vec::new();

        assert_eq!(reader.read_to_end(&mut buf).unwrap(), 5);
    }

    #[test]
    fn over_the_limit_fails() {
        let body = vec![b'A'; 2048];
        let mut reader = MaxBytesReader::new(&body[..], 1024);
        let mut buf = Vec::new();

        let err = reader.read_to_end(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
