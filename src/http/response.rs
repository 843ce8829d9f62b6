//! Staged HTTP response state.
//!
//! A [`Response`] accumulates status, headers and body while the handler
//! chain runs, and is serialized to wire bytes only when the transport
//! flushes it. The first successful body write *commits* the response;
//! every later body write fails with
//! [`Error::ResponseAlreadySent`](crate::Error::ResponseAlreadySent).

use crate::{
    errors::Error,
    http::types::{reason_phrase, StatusCode},
};

/// Response state staged by a [`Ctx`](crate::Ctx) during dispatch.
#[derive(Debug, Clone)]
pub struct Response {
    status: Option<u16>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    committed: bool,
}

impl Response {
    pub(crate) fn new() -> Self {
        Self {
            status: None,
            headers: Vec::new(),
            body: Vec::new(),
            committed: false,
        }
    }

    /// Builds a finalized error response in one step; used by the
    /// dispatcher and the transport adapter for 4xx/5xx fallbacks so both
    /// produce byte-identical output.
    pub(crate) fn error(status: StatusCode) -> Self {
        Self::error_code(status.as_u16())
    }

    /// Same as [`Response::error`], for statuses staged as bare numbers.
    pub(crate) fn error_code(status: u16) -> Self {
        Self::error_body(status, reason_phrase(status))
    }

    /// The error response for `err`, with the body text the framework
    /// guarantees for that error.
    pub(crate) fn from_error(err: &Error) -> Self {
        match err {
            Error::PayloadTooLarge => {
                Self::error_body(StatusCode::PayloadTooLarge.as_u16(), "Request body too large")
            }
            _ => Self::error(err.response_status()),
        }
    }

    fn error_body(status: u16, body: &str) -> Self {
        let mut resp = Self::new();
        resp.set_status(status);
        resp.set_header("content-type", "text/plain; charset=utf-8");
        resp.body = body.into();
        resp.committed = true;
        resp
    }

    /// Stages the status. Last call wins.
    pub(crate) fn set_status(&mut self, code: u16) {
        self.status = Some(code);
    }

    /// Stages a header; name comparison is case-insensitive and the last
    /// write for a given name wins.
    pub(crate) fn set_header(&mut self, name: &str, value: &str) {
        match self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some((_, v)) => *v = value.to_owned(),
            None => self.headers.push((name.to_owned(), value.to_owned())),
        }
    }

    /// Writes the body and commits the response.
    pub(crate) fn commit(&mut self, body: &[u8]) -> Result<(), Error> {
        if self.committed {
            return Err(Error::ResponseAlreadySent);
        }

        self.body.clear();
        self.body.extend_from_slice(body);
        self.committed = true;
        Ok(())
    }

    /// Whether a body write has already committed this response.
    pub(crate) fn is_committed(&self) -> bool {
        self.committed
    }

    /// The staged status, if any handler set one.
    pub(crate) fn staged_status(&self) -> Option<u16> {
        self.status
    }

    /// The effective status: staged value, or `200` once committed.
    pub fn status(&self) -> u16 {
        self.status.unwrap_or(200)
    }

    /// Staged header value, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All staged headers in staging order.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// The response body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Serializes the response to HTTP/1.1 wire bytes.
    ///
    /// `content-length` and `connection` are always computed here;
    /// identically named staged headers are dropped rather than duplicated.
    pub(crate) fn to_bytes(&self, keep_alive: bool) -> Vec<u8> {
        let status = self.status();
        let mut buffer = Vec::with_capacity(128 + self.body.len());

        buffer.extend_from_slice(b"HTTP/1.1 ");
        buffer.extend_from_slice(status.to_string().as_bytes());
        buffer.push(b' ');
        buffer.extend_from_slice(reason_phrase(status).as_bytes());
        buffer.extend_from_slice(b"\r\n");

        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case("content-length")
                || name.eq_ignore_ascii_case("connection")
            {
                continue;
            }
            buffer.extend_from_slice(name.as_bytes());
            buffer.extend_from_slice(b": ");
            buffer.extend_from_slice(value.as_bytes());
            buffer.extend_from_slice(b"\r\n");
        }

        if !keep_alive {
            buffer.extend_from_slice(b"connection: close\r\n");
        }
        buffer.extend_from_slice(b"content-length: ");
        buffer.extend_from_slice(self.body.len().to_string().as_bytes());
        buffer.extend_from_slice(b"\r\n\r\n");

        buffer.extend_from_slice(&self.body);
        buffer
    }
}

#[cfg(test)]
mod staging_tests {
    use super::*;

    #[test]
    fn last_status_wins() {
        let mut resp = Response::new();
        assert_eq!(resp.status(), 200);

        resp.set_status(404);
        resp.set_status(201);
        assert_eq!(resp.status(), 201);
    }

    #[test]
    fn header_last_write_wins_case_insensitive() {
        let mut resp = Response::new();

        resp.set_header("Content-Type", "text/plain");
        resp.set_header("content-type", "application/json");
        resp.set_header("X-Other", "1");

        assert_eq!(resp.header("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(resp.headers().len(), 2);
    }

    #[test]
    fn second_commit_fails() {
        let mut resp = Response::new();

        resp.commit(b"first").unwrap();
        assert!(matches!(
            resp.commit(b"second"),
            Err(Error::ResponseAlreadySent)
        ));
        assert_eq!(resp.body(), b"first");
    }
}
