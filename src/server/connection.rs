//! The transport adapter: one TCP connection in, wire responses out.
//!
//! Reads requests off the socket, funnels each through
//! [`Inner::dispatch`], and writes the serialized response back. Parse
//! and limit violations are answered with the same error responses the
//! dispatcher produces, then the connection closes. Everything here is
//! plumbing; no routing or handler logic lives in this module.

use std::io;

use memchr::memmem;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};

use crate::{
    app::Inner,
    errors::Error,
    http::{
        request::{Head, Request},
        response::Response,
        types::StatusCode,
    },
    limits::Limits,
};

const READ_CHUNK: usize = 4096;
const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Serves one connection until it closes, expires or fails.
pub(crate) async fn serve(inner: &Inner, stream: &mut TcpStream) -> io::Result<()> {
    let limits = &inner.limits;
    let mut buffer: Vec<u8> = Vec::with_capacity(READ_CHUNK);
    let mut served = 0usize;

    loop {
        let head_end = match read_head(stream, &mut buffer, limits).await {
            Ok(Some(end)) => end,
            // Clean EOF between requests.
            Ok(None) => return Ok(()),
            Err(Error::Io(err)) => return Err(err),
            Err(err) => return write_error(stream, &err, limits).await,
        };

        let head = match Head::parse(&buffer[..head_end], limits) {
            Ok(head) => head,
            Err(err) => return write_error(stream, &err, limits).await,
        };

        // Reject by declared length before reading a single body byte.
        if head.content_length > limits.body_limit {
            return write_error(stream, &Error::PayloadTooLarge, limits).await;
        }

        buffer.drain(..head_end + HEAD_TERMINATOR.len());
        let body = match read_body(stream, &mut buffer, head.content_length, limits).await {
            Ok(body) => body,
            Err(Error::Io(err)) => return Err(err),
            Err(err) => return write_error(stream, &err, limits).await,
        };

        served += 1;
        let keep_alive = head.keep_alive
            && served < limits.max_requests_per_connection
            && !inner.lifecycle.is_shutting_down();

        let resp = inner.dispatch(Request::from_head(head, body));
        write_all(stream, &resp.to_bytes(keep_alive), limits).await?;

        if !keep_alive {
            return Ok(());
        }
    }
}

/// Writes a finalized error response and closes the exchange.
pub(crate) async fn send_error(
    stream: &mut TcpStream,
    status: StatusCode,
    limits: &Limits,
) -> io::Result<()> {
    write_all(stream, &Response::error(status).to_bytes(false), limits).await
}

async fn write_error(stream: &mut TcpStream, err: &Error, limits: &Limits) -> io::Result<()> {
    write_all(stream, &Response::from_error(err).to_bytes(false), limits).await
}

/// Reads until the head terminator is buffered; returns the terminator's
/// offset. `None` means the peer closed before sending anything.
async fn read_head(
    stream: &mut TcpStream,
    buffer: &mut Vec<u8>,
    limits: &Limits,
) -> Result<Option<usize>, Error> {
    loop {
        if let Some(end) = memmem::find(buffer, HEAD_TERMINATOR) {
            return Ok(Some(end));
        }
        if buffer.len() > limits.max_header_bytes {
            return Err(Error::HeadersTooLarge);
        }

        if read_chunk(stream, buffer, limits).await? == 0 {
            return match buffer.is_empty() {
                true => Ok(None),
                false => Err(Error::BadRequest("truncated request head")),
            };
        }
    }
}

/// Reads `content_length` body bytes; pipelined bytes past the body stay
/// in `buffer` for the next request.
async fn read_body(
    stream: &mut TcpStream,
    buffer: &mut Vec<u8>,
    content_length: usize,
    limits: &Limits,
) -> Result<Vec<u8>, Error> {
    while buffer.len() < content_length {
        if read_chunk(stream, buffer, limits).await? == 0 {
            return Err(Error::BadRequest("truncated request body"));
        }
    }

    Ok(buffer.drain(..content_length).collect())
}

async fn read_chunk(
    stream: &mut TcpStream,
    buffer: &mut Vec<u8>,
    limits: &Limits,
) -> Result<usize, Error> {
    let mut chunk = [0u8; READ_CHUNK];
    let read = timeout(limits.socket_read_timeout, stream.read(&mut chunk))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "socket read timed out"))??;

    buffer.extend_from_slice(&chunk[..read]);
    Ok(read)
}

async fn write_all(stream: &mut TcpStream, bytes: &[u8], limits: &Limits) -> io::Result<()> {
    timeout(limits.socket_write_timeout, stream.write_all(bytes))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "socket write timed out"))?
}
