//! HTTP server for webserver-rs.
//!
//! One tokio task serves each connection: it decodes requests with the
//! parser, hands them to the [`Dispatcher`] and writes the responses back in
//! order, honoring keep-alive.

mod response;
mod config;
mod error;
mod handler;
mod dispatcher;
mod http_server;
mod tests;

// Re-export public items
pub use response::{HttpResponse, StatusCode, SERVER_NAME, TYPE_JSON, TYPE_PLAIN};
pub use config::{ServerConfig, DEFAULT_PORT};
pub use error::Error;
pub use handler::{fallback_fn, handler_fn, FallbackFn, FallbackFuture, HandlerFn, HandlerFuture, Route, RouteTable};
pub use dispatcher::{Dispatcher, ERROR_BODY, NOT_FOUND_BODY};
pub use http_server::HttpServer;
