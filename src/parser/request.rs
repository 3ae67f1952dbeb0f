//! HTTP request parsing and representation.

use std::collections::HashMap;
use std::str::FromStr;
use serde::de::DeserializeOwned;

use crate::parser::error::Error;
use crate::parser::method::Method;
use crate::parser::version::HttpVersion;

/// Represents an HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The request target exactly as sent, query string included
    pub path: String,
    /// The HTTP version
    pub version: HttpVersion,
    /// The HTTP headers
    pub headers: HashMap<String, String>,
    /// The request body
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Create a new HTTP request.
    ///
    /// # Arguments
    ///
    /// * `method` - The HTTP method
    /// * `path` - The request path
    /// * `version` - The HTTP version
    /// * `headers` - The HTTP headers
    ///
    /// # Returns
    ///
    /// A new HTTP request with an empty body
    pub fn new(method: Method, path: String, version: HttpVersion, headers: HashMap<String, String>) -> Self {
        Self {
            method,
            path,
            version,
            headers,
            body: Vec::new(),
        }
    }

    /// Create a new HTTP request with a body.
    pub fn with_body(method: Method, path: String, version: HttpVersion, headers: HashMap<String, String>, body: Vec<u8>) -> Self {
        let mut request = Self::new(method, path, version, headers);
        request.body = body;
        request
    }

    /// Get a header value.
    ///
    /// Header names are matched case-insensitively.
    pub fn get_header(&self, name: &str) -> Option<&String> {
        self.headers.iter().find_map(|(k, v)| {
            if k.eq_ignore_ascii_case(name) {
                Some(v)
            } else {
                None
            }
        })
    }

    /// Check if a header exists.
    pub fn has_header(&self, name: &str) -> bool {
        self.get_header(name).is_some()
    }

    /// Check whether a comma-separated header contains `token`, ignoring case.
    pub fn header_contains_token(&self, name: &str, token: &str) -> bool {
        self.get_header(name)
            .map(|value| value.split(',').any(|t| t.trim().eq_ignore_ascii_case(token)))
            .unwrap_or(false)
    }

    /// Decide whether the connection stays open after this request.
    ///
    /// A `close` token always wins. Otherwise HTTP/1.1 keeps the connection
    /// open, and HTTP/1.0 only does so when the client sent `keep-alive`.
    pub fn is_keep_alive(&self) -> bool {
        if self.header_contains_token("Connection", "close") {
            return false;
        }
        self.version.keeps_alive_by_default() || self.header_contains_token("Connection", "keep-alive")
    }

    /// The declared Content-Length, if any.
    ///
    /// Only ASCII digits are accepted, and every `Content-Length` entry,
    /// whatever its case, must carry the same value.
    pub fn content_length(&self) -> Result<Option<usize>, Error> {
        let mut length = None;
        for (_, value) in self.headers.iter().filter(|(k, _)| k.eq_ignore_ascii_case("Content-Length")) {
            let parsed = parse_content_length(value)?;
            if length.is_some_and(|seen| seen != parsed) {
                return Err(Error::InvalidContentLength(value.clone()));
            }
            length = Some(parsed);
        }
        Ok(length)
    }

    /// Check if the body uses chunked transfer coding.
    pub fn is_chunked(&self) -> Result<bool, Error> {
        let Some(value) = self.get_header("Transfer-Encoding") else {
            return Ok(false);
        };
        let codings: Vec<&str> = value.split(',').map(str::trim).filter(|c| !c.is_empty()).collect();
        match codings.as_slice() {
            [] => Ok(false),
            [only] if only.eq_ignore_ascii_case("chunked") => Ok(true),
            [only] if only.eq_ignore_ascii_case("identity") => Ok(false),
            _ => Err(Error::UnsupportedTransferEncoding(value.clone())),
        }
    }

    /// The request body decoded as UTF-8, with invalid sequences replaced.
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse the request body as JSON.
    ///
    /// # Returns
    ///
    /// The parsed JSON value, or an error if the body is not valid JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        if !self.is_json() {
            return Err(Error::MissingHeader("Content-Type: application/json".to_string()));
        }

        let json = serde_json::from_slice(&self.body)?;
        Ok(json)
    }

    /// Check if the request has a JSON body.
    pub fn is_json(&self) -> bool {
        if let Some(content_type) = self.get_header("Content-Type") {
            content_type.starts_with("application/json")
        } else {
            false
        }
    }
}

/// Parse an HTTP request head from a byte slice.
///
/// The input is the request line followed by the header lines; anything after
/// the first empty line is ignored. The returned request has an empty body,
/// see [`RequestDecoder`](crate::parser::RequestDecoder) for body framing.
///
/// # Arguments
///
/// * `input` - A byte slice containing the HTTP request to parse
///
/// # Returns
///
/// The parsed HTTP request, or an error if the request is invalid
pub fn parse_request(input: &[u8]) -> Result<HttpRequest, Error> {
    let input_str = match std::str::from_utf8(input) {
        Ok(s) => s,
        Err(_) => return Err(Error::MalformedRequestLine("Invalid UTF-8".to_string())),
    };

    // `lines` accepts both CRLF and bare LF
    let mut lines = input_str.lines();

    let request_line = match lines.next() {
        Some(line) if !line.trim().is_empty() => line,
        _ => return Err(Error::EmptyRequest),
    };

    // Split the request line into method, path, and version
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(Error::MalformedRequestLine(request_line.to_string()));
    }

    let method = Method::from_str(parts[0])?;

    let path = parts[1].to_string();
    if path.is_empty() {
        return Err(Error::InvalidPath);
    }

    let version = HttpVersion::from_str(parts[2])?;

    let mut headers: HashMap<String, String> = HashMap::new();
    for line in lines {
        // Empty line indicates the end of headers
        if line.is_empty() {
            break;
        }

        let Some((name, value)) = line.split_once(':') else {
            return Err(Error::InvalidHeaderFormat);
        };

        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidHeaderFormat);
        }

        let value = value.trim();
        if name.eq_ignore_ascii_case("Content-Length") {
            // Repeats must agree, otherwise the body boundary is ambiguous
            let length = parse_content_length(value)?;
            let conflicting = headers
                .iter()
                .filter(|(k, _)| k.eq_ignore_ascii_case(name))
                .any(|(_, v)| parse_content_length(v).map_or(true, |seen| seen != length));
            if conflicting {
                return Err(Error::InvalidContentLength(value.to_string()));
            }
        }

        headers.insert(name.to_string(), value.to_string());
    }

    Ok(HttpRequest::new(method, path, version, headers))
}

/// Parse a Content-Length value made of ASCII digits only.
fn parse_content_length(value: &str) -> Result<usize, Error> {
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidContentLength(value.to_string()));
    }
    value
        .parse::<usize>()
        .map_err(|_| Error::InvalidContentLength(value.to_string()))
}
