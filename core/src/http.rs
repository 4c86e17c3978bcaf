//! HTTP transport types handed between the pipeline and the transport.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. The
//! builder produces an `HttpRequest`, a `Transport` turns it into an
//! `HttpResponse`, and the normalizer never sees anything transport-specific.
//! Stub transports in tests only have to deal with these two structs.
//!
//! All fields use owned types (`String`, `Vec`) so a prepared request can be
//! moved onto a blocking worker without lifetime concerns.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FittingError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Upper-case token as it goes on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Whether the builder serializes the descriptor's parameters into a
    /// request body for this method. Only POST and PUT do; PATCH is sent
    /// without a body.
    pub fn carries_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = FittingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "" => Err(FittingError::MissingField("method")),
            _ => Err(FittingError::UnsupportedMethod(s.to_string())),
        }
    }
}

/// An HTTP request described as plain data.
///
/// Built by `Fitting::prepare`. `content_type` is kept apart from `headers`
/// so transports can route it through their own content-type handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub content_type: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// First header value whose name matches `name` case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response described as plain data.
///
/// Returned by a `Transport` after the whole body has been read. The body is
/// kept as raw bytes; text decoding happens together with JSON parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
