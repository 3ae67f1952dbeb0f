//! Tests for the HTTP server implementation.

#[cfg(test)]
mod server_tests {
    use std::collections::HashMap;
    use std::io::{self, Cursor};
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};
    use std::time::Duration;
    use serde::Serialize;
    use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, ReadBuf};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    use crate::parser::{DecoderLimits, HttpRequest, HttpVersion, Method};
    use crate::server::http_server::ACCEPT_RETRY_DELAY;
    use crate::server::{
        handler_fn, Dispatcher, Error, HttpResponse, HttpServer, Route, RouteTable, ServerConfig, StatusCode,
        DEFAULT_PORT, SERVER_NAME, TYPE_JSON, TYPE_PLAIN,
    };

    // Mock TcpStream for testing
    struct MockTcpStream {
        read_data: Cursor<Vec<u8>>,
        write_data: Vec<u8>,
        shut_down: bool,
    }

    impl MockTcpStream {
        fn new(read_data: &[u8]) -> Self {
            Self {
                read_data: Cursor::new(read_data.to_vec()),
                write_data: Vec::new(),
                shut_down: false,
            }
        }

        fn written_data(&self) -> &[u8] {
            &self.write_data
        }
    }

    impl AsyncRead for MockTcpStream {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let this = self.get_mut();
            let n = std::io::Read::read(&mut this.read_data, buf.initialize_unfilled())?;
            buf.advance(n);
            Poll::Ready(Ok(()))
        }
    }

    impl AsyncWrite for MockTcpStream {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let this = self.get_mut();
            this.write_data.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            self.get_mut().shut_down = true;
            Poll::Ready(Ok(()))
        }
    }

    struct ParsedResponse {
        status: u16,
        headers: HashMap<String, String>,
        body: String,
    }

    impl ParsedResponse {
        fn header(&self, name: &str) -> Option<&str> {
            self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
        }
    }

    async fn read_response<R: AsyncBufRead + Unpin>(reader: &mut R) -> ParsedResponse {
        let mut status_line = String::new();
        reader.read_line(&mut status_line).await.unwrap();
        assert!(status_line.starts_with("HTTP/1.1 "), "unexpected status line: {status_line:?}");
        let status = status_line.split_whitespace().nth(1).unwrap().parse().unwrap();

        let mut headers = HashMap::new();
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            let (name, value) = line.split_once(':').unwrap();
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        let length: usize = headers["content-length"].parse().unwrap();
        let mut body = vec![0; length];
        reader.read_exact(&mut body).await.unwrap();

        ParsedResponse {
            status,
            headers,
            body: String::from_utf8(body).unwrap(),
        }
    }

    fn demo_server(config: ServerConfig) -> HttpServer {
        HttpServer::new(config)
            .get("/hello", |_req| async { Ok("Hello world".to_string()) })
            .post("/hello", |req| async move { Ok(format!("Hello world: {}", req.body_string())) })
            .get("/boom", |_req| async { Err(Error::InternalError("asdf".to_string())) })
            .get("/getbody", |req| async move { Ok(req.body_string()) })
            .get("/panic", |req| async move { Ok(req.get_header("X-Absent").cloned().expect("handler panicked")) })
            .get("/unicode", |_req| async { Ok("h\u{e9}llo \u{1F600}".to_string()) })
            .get("/whois", |_req| async { Ok("Cody Ebberson".to_string()) })
    }

    fn demo_dispatcher() -> Arc<Dispatcher> {
        Arc::new(demo_server(ServerConfig::default()).dispatcher)
    }

    fn request(method: Method, path: &str, body: &[u8]) -> HttpRequest {
        HttpRequest::with_body(method, path.to_string(), HttpVersion::Http11, HashMap::new(), body.to_vec())
    }

    async fn serve_mock(input: &[u8]) -> (Result<(), Error>, MockTcpStream) {
        let mut stream = MockTcpStream::new(input);
        let result = HttpServer::handle_connection(&mut stream, demo_dispatcher(), DecoderLimits::default()).await;
        (result, stream)
    }

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.addr.port(), DEFAULT_PORT);
        assert_eq!(DEFAULT_PORT, 4567);
        assert_eq!(config.backlog, 1024);
        assert_eq!(config.limits, DecoderLimits::default());

        let config = ServerConfig::default().with_port(8081);
        assert_eq!(config.addr.port(), 8081);
        assert!(config.addr.ip().is_unspecified());
    }

    #[test]
    fn test_route_table_exact_lookup() {
        let mut table = RouteTable::new();
        let pairs = [(Method::GET, "/hello"), (Method::POST, "/hello"), (Method::GET, "/boom")];
        for (method, path) in pairs {
            table.add_route(Route {
                method,
                path: path.to_string(),
                handler: handler_fn(|_req| async { Ok(String::new()) }),
            });
        }

        assert_eq!(table.len(), 3);
        for (method, path) in pairs {
            let route = table.find_route(method, path).unwrap();
            assert_eq!(route.method, method);
            assert_eq!(route.path, path);
        }

        assert!(table.find_route(Method::POST, "/boom").is_none());
        assert!(table.find_route(Method::GET, "/Hello").is_none());
        assert!(table.find_route(Method::GET, "/hello/").is_none());
        assert!(table.find_route(Method::GET, "/hello?name=x").is_none());
        assert!(table.find_route(Method::PUT, "/hello").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_registration_last_wins() {
        let server = HttpServer::new(ServerConfig::default())
            .get("/dup", |_req| async { Ok("first".to_string()) })
            .get("/other", |_req| async { Ok("other".to_string()) })
            .get("/dup", |_req| async { Ok("second".to_string()) });

        let routes = server.dispatcher.routes();
        assert_eq!(routes.len(), 2);
        // Replacement keeps the original position
        assert_eq!(routes.iter().map(|r| r.path.as_str()).collect::<Vec<_>>(), vec!["/dup", "/other"]);

        let response = server.dispatcher.dispatch(request(Method::GET, "/dup", b"")).await;
        assert_eq!(response.body, b"second");
    }

    #[tokio::test]
    async fn test_dispatch_hello() {
        let response = demo_dispatcher().dispatch(request(Method::GET, "/hello", b"")).await;
        assert_eq!(response.status, StatusCode::Ok);
        assert_eq!(response.body, b"Hello world");
        assert_eq!(response.get_header("Content-Type").unwrap(), TYPE_PLAIN);
        assert_eq!(response.get_header("Content-Length").unwrap(), "11");
        assert_eq!(response.get_header("Server").unwrap(), SERVER_NAME);
        assert!(response.keep_alive);
        assert!(response.get_header("Connection").is_none());
    }

    #[tokio::test]
    async fn test_dispatch_post_hello_echoes_body() {
        let response = demo_dispatcher().dispatch(request(Method::POST, "/hello", b"x")).await;
        assert_eq!(response.status, StatusCode::Ok);
        assert_eq!(response.body, b"Hello world: x");
    }

    #[tokio::test]
    async fn test_dispatch_get_with_body() {
        let response = demo_dispatcher().dispatch(request(Method::GET, "/getbody", b"payload")).await;
        assert_eq!(response.status, StatusCode::Ok);
        assert_eq!(response.body, b"payload");
    }

    #[tokio::test]
    async fn test_dispatch_handler_error_is_500() {
        let response = demo_dispatcher().dispatch(request(Method::GET, "/boom", b"")).await;
        assert_eq!(response.status, StatusCode::InternalServerError);
        assert_eq!(response.body, b"Error");
        assert_eq!(response.get_header("Content-Type").unwrap(), TYPE_PLAIN);
        // A failed handler does not tear the connection down
        assert!(response.keep_alive);
    }

    #[tokio::test]
    async fn test_dispatch_handler_panic_is_500() {
        let response = demo_dispatcher().dispatch(request(Method::GET, "/panic", b"")).await;
        assert_eq!(response.status, StatusCode::InternalServerError);
        assert_eq!(response.body, b"Error");
    }

    #[tokio::test]
    async fn test_dispatch_unknown_path_is_404() {
        let dispatcher = demo_dispatcher();
        for (method, path) in [(Method::GET, "/unknown-path"), (Method::DELETE, "/hello"), (Method::GET, "/hello?x=1")] {
            let response = dispatcher.dispatch(request(method, path, b"")).await;
            assert_eq!(response.status, StatusCode::NotFound);
            assert_eq!(response.body, b"Not Found");
            assert_eq!(response.get_header("Content-Length").unwrap(), "9");
        }
    }

    #[tokio::test]
    async fn test_content_length_counts_utf8_bytes() {
        let response = demo_dispatcher().dispatch(request(Method::GET, "/unicode", b"")).await;
        let body = "h\u{e9}llo \u{1F600}";
        assert_eq!(response.body, body.as_bytes());
        assert_eq!(response.get_header("Content-Length").unwrap(), &body.len().to_string());
        assert_ne!(body.len(), body.chars().count());
    }

    #[tokio::test]
    async fn test_date_header_is_http_date() {
        let response = demo_dispatcher().dispatch(request(Method::GET, "/hello", b"")).await;
        let date = response.get_header("Date").unwrap();
        assert!(date.ends_with(" GMT"));
        assert!(httpdate::parse_http_date(date).is_ok(), "invalid date: {date}");
    }

    #[tokio::test]
    async fn test_fallback_replaces_404() {
        let server = HttpServer::new(ServerConfig::default())
            .get("/routed", |_req| async { Ok("routed".to_string()) })
            .fallback(|req| async move {
                if req.path == "/fail" {
                    return Err(Error::InternalError("fallback failed".to_string()));
                }
                Ok(HttpResponse::new(StatusCode::Accepted).with_body_string(format!("You requested: {}", req.path)))
            });

        let routed = server.dispatcher.dispatch(request(Method::GET, "/routed", b"")).await;
        assert_eq!(routed.body, b"routed");

        let fallback = server.dispatcher.dispatch(request(Method::GET, "/anything", b"")).await;
        assert_eq!(fallback.status, StatusCode::Accepted);
        assert_eq!(fallback.body, b"You requested: /anything");
        // Stamped even though the fallback did not set them
        assert_eq!(fallback.get_header("Content-Type").unwrap(), TYPE_PLAIN);
        assert!(fallback.get_header("Date").is_some());

        let failed = server.dispatcher.dispatch(request(Method::GET, "/fail", b"")).await;
        assert_eq!(failed.status, StatusCode::InternalServerError);
        assert_eq!(failed.body, b"Error");
    }

    #[tokio::test]
    async fn test_dispatch_whois() {
        let response = demo_dispatcher().dispatch(request(Method::GET, "/whois", b"")).await;
        assert_eq!(response.status, StatusCode::Ok);
        assert_eq!(response.body, b"Cody Ebberson");
    }

    #[tokio::test]
    async fn test_fallback_chooses_its_own_status() {
        let server = HttpServer::new(ServerConfig::default()).fallback(|req| async move {
            let status = match req.method {
                Method::DELETE => StatusCode::MethodNotAllowed,
                _ => StatusCode::ServiceUnavailable,
            };
            Ok(HttpResponse::plain(status, status.reason_phrase()))
        });

        let unavailable = server.dispatcher.dispatch(request(Method::GET, "/down", b"")).await;
        let text = String::from_utf8(unavailable.to_bytes()).unwrap();
        assert!(text.starts_with("HTTP/1.1 503 Service Unavailable\r\n"));
        assert!(text.ends_with("\r\n\r\nService Unavailable"));

        let not_allowed = server.dispatcher.dispatch(request(Method::DELETE, "/down", b"")).await;
        assert_eq!(not_allowed.status.as_u16(), 405);
        assert_eq!(not_allowed.body, b"Method Not Allowed");
    }

    #[derive(Serialize)]
    struct Status {
        ok: bool,
    }

    #[test]
    fn test_response_builders() {
        let response = HttpResponse::new(StatusCode::Ok)
            .with_header("content-type", "text/html")
            .with_content_type("text/css")
            .with_json(&Status { ok: true })
            .unwrap();
        assert_eq!(response.headers.keys().filter(|k| k.eq_ignore_ascii_case("content-type")).count(), 1);
        assert_eq!(response.get_header("Content-Type").unwrap(), TYPE_JSON);
        assert_eq!(response.body, br#"{"ok":true}"#);

        let bytes = HttpResponse::plain(StatusCode::NotFound, "gone").to_bytes();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.contains("Content-Length: 4\r\n"));
        assert!(text.ends_with("\r\n\r\ngone"));
    }

    #[test]
    fn test_finalize_connection_header() {
        let closing = HttpResponse::plain(StatusCode::Ok, "x").finalize(HttpVersion::Http11, false);
        assert!(!closing.keep_alive);
        assert_eq!(closing.get_header("Connection").unwrap(), "close");

        let http10 = HttpResponse::plain(StatusCode::Ok, "x").finalize(HttpVersion::Http10, true);
        assert!(http10.keep_alive);
        assert_eq!(http10.get_header("Connection").unwrap(), "keep-alive");

        let mut stale = HttpResponse::plain(StatusCode::Ok, "abc");
        stale.body = b"abcdef".to_vec();
        let fixed = stale.finalize(HttpVersion::Http11, true);
        assert_eq!(fixed.get_header("Content-Length").unwrap(), "6");
    }

    #[tokio::test]
    async fn test_handle_connection_keep_alive_pipelined() {
        let input = b"GET /hello HTTP/1.1\r\nHost: localhost\r\n\r\n\
            POST /hello HTTP/1.1\r\nHost: localhost\r\nContent-Length: 1\r\n\r\nx\
            GET /missing HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let (result, stream) = serve_mock(input).await;
        assert!(result.is_ok());
        // Connection was left open; the mock simply ran out of input
        assert!(!stream.shut_down);

        let mut written = stream.written_data();
        let first = read_response(&mut written).await;
        let second = read_response(&mut written).await;
        let third = read_response(&mut written).await;
        assert!(written.is_empty());

        assert_eq!((first.status, first.body.as_str()), (200, "Hello world"));
        assert_eq!((second.status, second.body.as_str()), (200, "Hello world: x"));
        assert_eq!((third.status, third.body.as_str()), (404, "Not Found"));
        assert!(first.header("Connection").is_none());
    }

    #[tokio::test]
    async fn test_handle_connection_close_stops_after_response() {
        let input = b"GET /hello HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n\
            GET /hello HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let (result, stream) = serve_mock(input).await;
        assert!(result.is_ok());
        assert!(stream.shut_down);

        let mut written = stream.written_data();
        let response = read_response(&mut written).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.header("Connection"), Some("close"));
        // The second request is never answered
        assert!(written.is_empty());
    }

    #[tokio::test]
    async fn test_handle_connection_http10_closes_by_default() {
        let (result, stream) = serve_mock(b"GET /hello HTTP/1.0\r\n\r\n").await;
        assert!(result.is_ok());
        assert!(stream.shut_down);
    }

    #[tokio::test]
    async fn test_handle_connection_error_keeps_connection() {
        let input = b"GET /boom HTTP/1.1\r\nHost: localhost\r\n\r\nGET /hello HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let (result, stream) = serve_mock(input).await;
        assert!(result.is_ok());

        let mut written = stream.written_data();
        let boom = read_response(&mut written).await;
        let hello = read_response(&mut written).await;
        assert_eq!((boom.status, boom.body.as_str()), (500, "Error"));
        assert_eq!((hello.status, hello.body.as_str()), (200, "Hello world"));
    }

    #[tokio::test]
    async fn test_handle_connection_head_omits_body() {
        let input = b"HEAD /hello HTTP/1.1\r\nHost: localhost\r\n\r\nGET /hello HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let (result, stream) = serve_mock(input).await;
        assert!(result.is_ok());

        let text = String::from_utf8(stream.written_data().to_vec()).unwrap();
        let (head, rest) = text.split_once("\r\n\r\n").unwrap();
        // HEAD has no route, so this is the 404 without its "Not Found" body
        assert!(head.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(head.contains("Content-Length: 9"));
        assert!(rest.starts_with("HTTP/1.1 200 OK\r\n"), "body leaked after HEAD: {rest:?}");

        let mut rest = rest.as_bytes();
        let hello = read_response(&mut rest).await;
        assert_eq!(hello.body, "Hello world");
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_accept_error_backs_off_and_continues() {
        let started = std::time::Instant::now();
        HttpServer::handle_connection_error(io::Error::new(io::ErrorKind::BrokenPipe, "accept failed")).await;
        assert!(started.elapsed() >= ACCEPT_RETRY_DELAY);
    }

    #[tokio::test]
    async fn test_handle_connection_with_invalid_request() {
        let (result, stream) = serve_mock(b"INVALID REQUEST\r\n\r\n").await;
        assert!(matches!(result, Err(Error::ParseError(_))));
        assert!(stream.written_data().is_empty());
    }

    #[tokio::test]
    async fn test_handle_connection_with_oversized_request_line() {
        let input = format!("GET /{} HTTP/1.1\r\n\r\n", "a".repeat(5000));
        let (result, stream) = serve_mock(input.as_bytes()).await;
        assert!(matches!(result, Err(Error::ParseError(_))));
        assert!(stream.written_data().is_empty());
    }

    #[tokio::test]
    async fn test_handle_connection_incomplete_request() {
        let (result, stream) = serve_mock(b"POST /hello HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc").await;
        assert!(result.is_ok());
        assert!(stream.written_data().is_empty());
    }

    async fn spawn_server() -> (std::net::SocketAddr, oneshot::Sender<()>, tokio::task::JoinHandle<Result<(), Error>>) {
        let config = ServerConfig {
            addr: "127.0.0.1:0".parse().unwrap(),
            shutdown_timeout: Duration::from_secs(2),
            ..ServerConfig::default()
        };
        let server = demo_server(config);
        let listener = server.bind().unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve(listener, async move {
            let _ = shutdown_rx.await;
        }));
        (addr, shutdown_tx, handle)
    }

    #[tokio::test]
    async fn test_keep_alive_over_tcp() {
        let (addr, shutdown_tx, handle) = spawn_server().await;

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut reader = BufReader::new(stream);

        reader.get_mut().write_all(b"GET /hello HTTP/1.1\r\nHost: localhost\r\n\r\n").await.unwrap();
        let first = read_response(&mut reader).await;
        assert_eq!(first.status, 200);
        assert_eq!(first.body, "Hello world");
        assert_eq!(first.header("Content-Type"), Some(TYPE_PLAIN));
        assert!(httpdate::parse_http_date(first.header("Date").unwrap()).is_ok());

        // Same connection, second request asks to close
        reader
            .get_mut()
            .write_all(b"POST /hello HTTP/1.1\r\nHost: localhost\r\nContent-Length: 1\r\nConnection: close\r\n\r\nx")
            .await
            .unwrap();
        let second = read_response(&mut reader).await;
        assert_eq!(second.body, "Hello world: x");
        assert_eq!(second.header("Connection"), Some("close"));

        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty(), "server should have closed the connection");

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_malformed_request_over_tcp_closes_without_response() {
        let (addr, shutdown_tx, handle) = spawn_server().await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"NOT HTTP AT ALL\r\n\r\n").await.unwrap();

        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_aborts_idle_connections_after_timeout() {
        let (addr, shutdown_tx, handle) = spawn_server().await;

        // An idle keep-alive connection holds its task open
        let mut idle = TcpStream::connect(addr).await.unwrap();
        idle.write_all(b"GET /hello HTTP/1.1\r\nHost: localhost\r\n\r\n").await.unwrap();
        let mut reader = BufReader::new(&mut idle);
        assert_eq!(read_response(&mut reader).await.status, 200);

        shutdown_tx.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(10), handle).await;
        assert!(result.is_ok(), "server did not finish shutting down");
    }
}
