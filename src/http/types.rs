//! Core HTTP protocol types.

use crate::errors::Error;
use std::{fmt, str::FromStr};

// METHOD

/// HTTP request methods.
///
/// # References
///
/// - [RFC 7231, Section 4](https://datatracker.ietf.org/doc/html/rfc7231#section-4)
/// - [RFC 5789](https://datatracker.ietf.org/doc/html/rfc5789) (PATCH method)
///
/// # Disabled methods
///
/// * `TRACE` - disabled for security reasons
/// * `CONNECT` - disabled because it is no longer needed
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
    /// GET method - transfer a current representation of the target resource
    Get,
    /// PUT method - replace all current representations of the target resource
    Put,
    /// POST method - perform resource-specific processing on the request payload
    Post,
    /// HEAD method - same as GET but without response body
    Head,
    /// PATCH method - apply partial modifications to a resource
    Patch,
    /// DELETE method - remove all current representations of the target resource
    Delete,
    /// OPTIONS method - describe the communication options for the target resource
    Options,
}

impl Method {
    /// Canonical upper-case token, as it appears on the wire.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Head => "HEAD",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
        }
    }

    #[inline]
    pub(crate) fn from_bytes(src: &[u8]) -> Result<Self, Error> {
        match src {
            b"GET" => Ok(Method::Get),
            b"PUT" => Ok(Method::Put),
            b"POST" => Ok(Method::Post),
            b"HEAD" => Ok(Method::Head),
            b"PATCH" => Ok(Method::Patch),
            b"DELETE" => Ok(Method::Delete),
            b"OPTIONS" => Ok(Method::Options),
            _ => Err(Error::BadRequest("invalid HTTP method")),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::from_bytes(s.as_bytes())
    }
}

// STATUS_CODE

macro_rules! set_status_codes {
    ($(
        $(#[$docs:meta])*
        $name:ident = ($num:expr, $str:expr);
    )+) => {
        /// HTTP status codes observed at the framework boundary.
        ///
        /// Represents valid HTTP status codes as defined in
        /// [RFC 9110](https://datatracker.ietf.org/doc/html/rfc9110#section-15)
        /// and related standards.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StatusCode { $(
            #[doc = concat!($num, " ", $str)]
            $(#[$docs])*
            $name = $num,
        )+ }

        impl StatusCode {
            /// Numeric form of the status code.
            #[inline]
            pub const fn as_u16(&self) -> u16 {
                *self as u16
            }

            /// Canonical reason phrase (`"OK"`, `"Not Found"`, ...).
            #[inline]
            pub const fn reason(&self) -> &'static str {
                match self { $(
                    StatusCode::$name => $str,
                )+ }
            }

            /// Looks up a known status code by its numeric form.
            #[inline]
            pub const fn from_u16(num: u16) -> Option<Self> {
                match num { $(
                    $num => Some(StatusCode::$name),
                )+
                    _ => None,
                }
            }
        }
    }
}

set_status_codes! {
    Continue = (100, "Continue");
    SwitchingProtocols = (101, "Switching Protocols");

    Ok = (200, "OK");
    Created = (201, "Created");
    Accepted = (202, "Accepted");
    NoContent = (204, "No Content");
    PartialContent = (206, "Partial Content");

    MovedPermanently = (301, "Moved Permanently");
    Found = (302, "Found");
    SeeOther = (303, "See Other");
    NotModified = (304, "Not Modified");
    TemporaryRedirect = (307, "Temporary Redirect");
    PermanentRedirect = (308, "Permanent Redirect");

    BadRequest = (400, "Bad Request");
    Unauthorized = (401, "Unauthorized");
    Forbidden = (403, "Forbidden");
    NotFound = (404, "Not Found");
    MethodNotAllowed = (405, "Method Not Allowed");
    NotAcceptable = (406, "Not Acceptable");
    RequestTimeout = (408, "Request Timeout");
    Conflict = (409, "Conflict");
    Gone = (410, "Gone");
    LengthRequired = (411, "Length Required");
    PayloadTooLarge = (413, "Payload Too Large");
    UriTooLong = (414, "URI Too Long");
    UnsupportedMediaType = (415, "Unsupported Media Type");
    UnprocessableEntity = (422, "Unprocessable Entity");
    TooManyRequests = (429, "Too Many Requests");
    RequestHeaderFieldsTooLarge = (431, "Request Header Fields Too Large");

    InternalServerError = (500, "Internal Server Error");
    NotImplemented = (501, "Not Implemented");
    BadGateway = (502, "Bad Gateway");
    ServiceUnavailable = (503, "Service Unavailable");
    GatewayTimeout = (504, "Gateway Timeout");
    HttpVersionNotSupported = (505, "HTTP Version Not Supported");
}

/// Reason phrase for an arbitrary numeric status, for statuses staged by
/// handlers that are not in the known set.
#[inline]
pub(crate) fn reason_phrase(num: u16) -> &'static str {
    match StatusCode::from_u16(num) {
        Some(code) => code.reason(),
        None => "Unknown",
    }
}

#[cfg(test)]
mod method_tests {
    use super::*;

    #[test]
    fn wire_tokens_round_trip() {
        let all = [
            Method::Get,
            Method::Put,
            Method::Post,
            Method::Head,
            Method::Patch,
            Method::Delete,
            Method::Options,
        ];

        for method in all {
            assert_eq!(method.as_str().parse::<Method>().unwrap(), method);
        }
    }

    #[test]
    fn rejects_lowercase_and_unknown() {
        assert!("get".parse::<Method>().is_err());
        assert!("TRACE".parse::<Method>().is_err());
        assert!("".parse::<Method>().is_err());
    }
}
