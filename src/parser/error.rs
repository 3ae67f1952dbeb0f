//! Error types for the HTTP request decoder.

use thiserror::Error;

/// Errors that can occur while decoding an HTTP request.
///
/// Any of these ends the connection: the server closes the socket without
/// writing a response.
#[derive(Debug, Error)]
pub enum Error {
    /// The HTTP method in the request is not supported.
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// The request path is invalid or missing.
    #[error("Invalid HTTP path")]
    InvalidPath,

    /// The request line is malformed (wrong format or missing components).
    #[error("Malformed request line: {0}")]
    MalformedRequestLine(String),

    /// The HTTP version in the request is not supported.
    #[error("Invalid HTTP version: {0}")]
    InvalidVersion(String),

    /// A required header is missing from the request.
    #[error("Required header is missing: {0}")]
    MissingHeader(String),

    /// A header in the request has an invalid format.
    #[error("Invalid header format")]
    InvalidHeaderFormat,

    /// The request is empty.
    #[error("Empty request")]
    EmptyRequest,

    /// The request line is longer than the configured limit.
    #[error("Request line exceeds {0} bytes")]
    InitialLineTooLong(usize),

    /// The header section is longer than the configured limit.
    #[error("Header section exceeds {0} bytes")]
    HeaderTooLarge(usize),

    /// The Content-Length header is not a valid length.
    #[error("Invalid Content-Length: {0}")]
    InvalidContentLength(String),

    /// A chunk-size line in a chunked body could not be parsed.
    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(String),

    /// The request body is larger than the configured limit.
    #[error("Request body exceeds {0} bytes")]
    BodyTooLarge(usize),

    /// A transfer coding other than chunked was requested.
    #[error("Unsupported Transfer-Encoding: {0}")]
    UnsupportedTransferEncoding(String),

    /// Error parsing JSON.
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}
