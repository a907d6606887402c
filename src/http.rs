//! Minimal request/response values exchanged with the serving collaborators.
//!
//! No network I/O happens here; sites are plain handlers so the browser
//! model can drive them deterministically in tests.

use std::fmt;

use serde::Serialize;

use crate::origin::Origin;

/// `Content-Security-Policy` header name.
pub const CONTENT_SECURITY_POLICY: &str = "content-security-policy";
/// `Access-Control-Allow-Origin` header name.
pub const ACCESS_CONTROL_ALLOW_ORIGIN: &str = "access-control-allow-origin";
/// `Content-Type` header name.
pub const CONTENT_TYPE: &str = "content-type";
/// `Origin` request header name.
pub const ORIGIN: &str = "origin";
/// `Vary` header name.
pub const VARY: &str = "vary";

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// HTTP GET method
    Get,
    /// HTTP POST method
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
        }
    }
}

/// A request as a site handler sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// HTTP method used
    pub method: HttpMethod,
    /// Path including any query string
    pub path: String,
    /// `Origin` header, present on cross-origin fetches
    pub origin: Option<Origin>,
}

impl Request {
    /// A GET for `path` with no `Origin` header (navigation).
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            origin: None,
        }
    }

    /// Sets the `Origin` header.
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Path without query or fragment, used for routing.
    pub fn route(&self) -> &str {
        self.path
            .split(['?', '#'])
            .next()
            .unwrap_or(&self.path)
    }
}

/// A response from a site handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code
    pub status: u16,
    headers: Vec<(String, String)>,
    /// Response body
    pub body: String,
}

impl Response {
    /// A response with a status and body and no headers.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// 200 with an HTML body.
    pub fn html(body: impl Into<String>) -> Self {
        Self::new(200, body).with_header(CONTENT_TYPE, "text/html; charset=utf-8")
    }

    /// 200 with a JavaScript body.
    pub fn javascript(body: impl Into<String>) -> Self {
        Self::new(200, body).with_header(CONTENT_TYPE, "application/javascript; charset=utf-8")
    }

    /// 200 with a JSON body.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(200, serde_json::to_string(value)?)
            .with_header(CONTENT_TYPE, "application/json; charset=utf-8"))
    }

    /// 404.
    pub fn not_found() -> Self {
        Self::new(404, "Not Found")
    }

    /// Sets a header, replacing any previous value. Names are case-insensitive.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        let name = name.to_ascii_lowercase();
        self.headers.retain(|(n, _)| *n != name);
        self.headers.push((name, value.into()));
        self
    }

    /// Looks up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// All headers, lowercased names, in insertion order.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
