//! HTTP/1.x request parsing.
//!
//! [`parse_request`] turns a complete request head into an [`HttpRequest`];
//! [`RequestDecoder`] frames whole requests (head and body) out of a byte
//! stream so that a connection can serve pipelined requests in order.

mod request;
mod method;
mod version;
mod error;
mod decoder;

// Re-export public items
pub use request::HttpRequest;
pub use method::Method;
pub use version::HttpVersion;
pub use error::Error;
pub use decoder::{DecoderLimits, RequestDecoder};

// Re-export the parse_request function
pub use request::parse_request;
