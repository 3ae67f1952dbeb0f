//! A small routed HTTP/1.1 server.
//!
//! Handlers are async closures registered against an HTTP method and an exact
//! path. Each returns a plain-text body or an error; the server answers with
//! `200`, `500` (`Error`) or `404` (`Not Found`), always stamping
//! `Content-Type`, `Content-Length`, `Server` and `Date`, and keeps
//! connections alive following HTTP/1.1 rules.
//!
//! # Features
//!
//! - Incremental HTTP/1.x request decoding with size limits, `Content-Length`
//!   and chunked bodies, and pipelining
//! - Exact-match routing on method and path, last registration wins
//! - Failing or panicking handlers are turned into `500` responses
//! - JSON request and response bodies through serde
//! - Graceful shutdown on Ctrl+C
//!
//! # Examples
//!
//! ## Routing
//!
//! ```no_run
//! use webserver_rs::{HttpServer, ServerConfig, ServerError};
//!
//! # async fn run() -> Result<(), ServerError> {
//! HttpServer::new(ServerConfig::default())
//!     .get("/hello", |_req| async { Ok("Hello world".to_string()) })
//!     .post("/hello", |req| async move { Ok(format!("Hello world: {}", req.body_string())) })
//!     .get("/boom", |_req| async { Err(ServerError::InternalError("boom".to_string())) })
//!     .start()
//!     .await
//! # }
//! ```
//!
//! ## Decoding
//!
//! ```
//! use webserver_rs::{DecoderLimits, Method, RequestDecoder};
//!
//! let mut decoder = RequestDecoder::new(DecoderLimits::default());
//! let mut buf = b"POST /hello HTTP/1.1\r\nContent-Length: 1\r\n\r\nx".to_vec();
//!
//! let request = decoder.decode(&mut buf).unwrap().unwrap();
//! assert_eq!(request.method, Method::POST);
//! assert_eq!(request.body_string(), "x");
//! assert!(request.is_keep_alive());
//! ```
//!
//! ## Error handling
//!
//! ```
//! use webserver_rs::{parse_request, ParserError};
//!
//! let invalid_request = b"INVALID /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n";
//!
//! match parse_request(invalid_request) {
//!     Ok(_) => println!("Request parsed successfully"),
//!     Err(ParserError::InvalidMethod(method)) => println!("Invalid method: {}", method),
//!     Err(err) => println!("Other error: {}", err),
//! }
//! ```
//!
//! See the `demos` directory for complete servers.

pub mod parser;

pub mod server;

// Re-export commonly used items for convenience
pub use parser::{parse_request, DecoderLimits, Error as ParserError, HttpRequest, HttpVersion, Method, RequestDecoder};
pub use server::{Dispatcher, Error as ServerError, HttpResponse, HttpServer, Route, RouteTable, ServerConfig, StatusCode};
