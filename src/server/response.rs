//! HTTP response types and utilities.

use std::collections::HashMap;
use std::time::SystemTime;
use serde::Serialize;

use crate::parser::HttpVersion;
use crate::server::error::Error;

/// Content type of plain-text bodies.
pub const TYPE_PLAIN: &str = "text/plain; charset=UTF-8";
/// Content type of JSON bodies.
pub const TYPE_JSON: &str = "application/json; charset=UTF-8";
/// Value of the `Server` header on every response.
pub const SERVER_NAME: &str = "webserver-rs";

/// HTTP status codes with their standard reason phrases.
///
/// The dispatcher itself only answers with `Ok`, `NotFound` and
/// `InternalServerError`; the other codes are there for fallback handlers,
/// which choose the status of their own responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok = 200,
    Created = 201,
    Accepted = 202,
    NoContent = 204,
    BadRequest = 400,
    Unauthorized = 401,
    Forbidden = 403,
    NotFound = 404,
    MethodNotAllowed = 405,
    InternalServerError = 500,
    NotImplemented = 501,
    BadGateway = 502,
    ServiceUnavailable = 503,
}

impl StatusCode {
    /// Get the reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Created => "Created",
            StatusCode::Accepted => "Accepted",
            StatusCode::NoContent => "No Content",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Unauthorized => "Unauthorized",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::NotImplemented => "Not Implemented",
            StatusCode::BadGateway => "Bad Gateway",
            StatusCode::ServiceUnavailable => "Service Unavailable",
        }
    }

    /// The numeric status code.
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }
}

/// Represents an HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// The HTTP status code
    pub status: StatusCode,
    /// The HTTP headers
    pub headers: HashMap<String, String>,
    /// The response body
    pub body: Vec<u8>,
    /// Whether the connection stays open after this response is written
    pub keep_alive: bool,
}

impl HttpResponse {
    /// Create a new HTTP response with the given status code.
    pub fn new(status: StatusCode) -> Self {
        let mut headers = HashMap::new();
        headers.insert("Server".to_string(), SERVER_NAME.to_string());

        Self {
            status,
            headers,
            body: Vec::new(),
            keep_alive: true,
        }
    }

    /// A response with a plain-text body.
    pub fn plain(status: StatusCode, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_content_type(TYPE_PLAIN)
            .with_body_string(body)
    }

    /// Set the response body with a string.
    pub fn with_body_string(mut self, body: impl Into<String>) -> Self {
        let body_string = body.into();
        self.body = body_string.into_bytes();
        let content_length = self.body.len().to_string();
        self.with_header("Content-Length", content_length)
    }

    /// Set the response body with bytes.
    pub fn with_body_bytes(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        let content_length = self.body.len().to_string();
        self.with_header("Content-Length", content_length)
    }

    /// Add or replace a header. Names are compared case-insensitively.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|k, _| !k.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
        self
    }

    /// Set the content type.
    pub fn with_content_type(self, content_type: impl Into<String>) -> Self {
        self.with_header("Content-Type", content_type)
    }

    /// Set the response body with a JSON value.
    ///
    /// This method serializes the provided value to JSON and sets it as the response body.
    pub fn with_json<T: Serialize>(self, value: &T) -> Result<Self, Error> {
        let json = serde_json::to_vec(value).map_err(Error::JsonError)?;
        Ok(self
            .with_header("Content-Type", TYPE_JSON)
            .with_body_bytes(json))
    }

    /// Get a header value, matching the name case-insensitively.
    pub fn get_header(&self, name: &str) -> Option<&String> {
        self.headers
            .iter()
            .find_map(|(k, v)| k.eq_ignore_ascii_case(name).then_some(v))
    }

    /// Stamp the headers every response carries and record the connection
    /// decision.
    ///
    /// `Content-Length` is recomputed from the body, `Date` is the current
    /// time in IMF-fixdate form, and a missing `Content-Type` defaults to
    /// plain text. `Connection: close` is added when the connection will be
    /// closed; an HTTP/1.0 client asking for keep-alive gets
    /// `Connection: keep-alive` back.
    pub fn finalize(mut self, version: HttpVersion, keep_alive: bool) -> Self {
        if self.get_header("Content-Type").is_none() {
            self = self.with_content_type(TYPE_PLAIN);
        }
        let content_length = self.body.len().to_string();
        self = self
            .with_header("Content-Length", content_length)
            .with_header("Server", SERVER_NAME)
            .with_header("Date", httpdate::fmt_http_date(SystemTime::now()));

        self = match (keep_alive, version) {
            (false, _) => self.with_header("Connection", "close"),
            (true, HttpVersion::Http10) => self.with_header("Connection", "keep-alive"),
            (true, HttpVersion::Http11) => self,
        };
        self.keep_alive = keep_alive;
        self
    }

    /// The status line and headers, up to and including the blank line.
    ///
    /// This is all that is written in answer to a HEAD request; the headers,
    /// `Content-Length` included, stay those of the full response.
    pub fn head_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(128);

        let status_line = format!("HTTP/1.1 {} {}\r\n", self.status.as_u16(), self.status.reason_phrase());
        bytes.extend_from_slice(status_line.as_bytes());

        for (name, value) in &self.headers {
            let header_line = format!("{name}: {value}\r\n");
            bytes.extend_from_slice(header_line.as_bytes());
        }

        // Add the empty line that separates headers from body
        bytes.extend_from_slice(b"\r\n");
        bytes
    }

    /// Convert the response to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.head_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}
