//! HTTP server implementation.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::signal;
use tokio::task::JoinSet;
use log::{debug, error, info, warn};

use crate::parser::{DecoderLimits, HttpRequest, Method, RequestDecoder};
use crate::server::config::ServerConfig;
use crate::server::dispatcher::Dispatcher;
use crate::server::error::Error;
use crate::server::handler::{fallback_fn, handler_fn, Route};
use crate::server::response::HttpResponse;

/// Pause after a failed `accept` before trying again.
pub(crate) const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// An HTTP server.
///
/// Routes are registered with the builder methods before [`start`](Self::start)
/// or [`serve`](Self::serve) is called; from then on they are shared
/// read-only between connections.
pub struct HttpServer {
    /// The server configuration.
    pub config: ServerConfig,
    /// The route table and fallback consulted for every request.
    pub dispatcher: Dispatcher,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            dispatcher: Dispatcher::default(),
        }
    }

    /// Register a handler for `method` and an exact `path`.
    pub fn add_route<F, Fut>(&mut self, method: Method, path: impl Into<String>, handler: F)
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, Error>> + Send + 'static,
    {
        let route = Route {
            method,
            path: path.into(),
            handler: handler_fn(handler),
        };
        self.dispatcher.routes_mut().add_route(route);
    }

    /// Builder form of [`add_route`](Self::add_route).
    pub fn route<F, Fut>(mut self, method: Method, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, Error>> + Send + 'static,
    {
        self.add_route(method, path, handler);
        self
    }

    /// Register a GET handler.
    pub fn get<F, Fut>(self, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, Error>> + Send + 'static,
    {
        self.route(Method::GET, path, handler)
    }

    /// Register a POST handler.
    pub fn post<F, Fut>(self, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, Error>> + Send + 'static,
    {
        self.route(Method::POST, path, handler)
    }

    /// Answer requests that match no route with `handler` instead of a 404.
    pub fn fallback<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.dispatcher.set_fallback(fallback_fn(handler));
        self
    }

    /// Display the server banner and registered endpoints.
    fn display_server_info(&self) {
        let banner = include_str!("../banner.txt");
        info!("\n{banner}");

        info!("Registered endpoints:");
        for route in self.dispatcher.routes().iter() {
            info!("  {} {}", route.method, route.path);
        }
        if self.dispatcher.has_fallback() {
            info!("  * (fallback)");
        }
    }

    /// Bind the configured address with `SO_REUSEADDR` and the configured backlog.
    pub fn bind(&self) -> Result<TcpListener, Error> {
        let socket = match self.config.addr {
            SocketAddr::V4(_) => TcpSocket::new_v4()?,
            SocketAddr::V6(_) => TcpSocket::new_v6()?,
        };
        socket.set_reuseaddr(true)?;
        socket.bind(self.config.addr)?;
        let listener = socket.listen(self.config.backlog)?;
        info!("Server listening on http://{addr}", addr = listener.local_addr()?);
        Ok(listener)
    }

    /// Resolve once Ctrl+C is received.
    async fn ctrl_c() {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown"),
            Err(e) => {
                error!("Error setting up Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    }

    /// Spawn the task serving one accepted connection.
    fn handle_new_connection(
        socket: TcpStream,
        addr: SocketAddr,
        dispatcher: Arc<Dispatcher>,
        limits: DecoderLimits,
        tasks: &mut JoinSet<()>,
    ) {
        debug!("Accepted connection from {addr}");
        if let Err(e) = socket.set_nodelay(true) {
            debug!("Could not set TCP_NODELAY for {addr}: {e}");
        }

        tasks.spawn(async move {
            // The socket is dropped, and so closed, when this task ends
            let mut socket = socket;
            match Self::handle_connection(&mut socket, dispatcher, limits).await {
                Ok(()) => debug!("Connection from {addr} closed"),
                Err(Error::ParseError(e)) => warn!("Closing connection from {addr}: {e}"),
                Err(e) => error!("Error handling connection from {addr}: {e}"),
            }
        });
    }

    /// Handle errors from `accept`: log, then back off before accepting again.
    ///
    /// Accept errors such as `EMFILE` are transient, so the loop never stops on them.
    pub(crate) async fn handle_connection_error(e: std::io::Error) {
        error!("Error accepting connection: {e}");
        tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
    }

    /// Wait for open connections to finish, aborting them after `timeout`.
    async fn perform_shutdown(tasks: &mut JoinSet<()>, timeout: Duration) {
        info!("Waiting for {len} active connections to complete...", len = tasks.len());
        let drained = tokio::time::timeout(timeout, async {
            while let Some(res) = tasks.join_next().await {
                if let Err(e) = res {
                    error!("Task failed during shutdown: {e}");
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!("Shutdown timeout elapsed, aborting {len} connections", len = tasks.len());
            tasks.shutdown().await;
        }

        info!("Server shutdown complete");
    }

    /// Start the server and serve until Ctrl+C.
    pub async fn start(self) -> Result<(), Error> {
        self.display_server_info();
        let listener = self.bind()?;
        self.serve(listener, Self::ctrl_c()).await
    }

    /// Serve connections from `listener` until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), Error>
    where
        F: Future<Output = ()>,
    {
        let limits = self.config.limits;
        let shutdown_timeout = self.config.shutdown_timeout;
        let dispatcher = Arc::new(self.dispatcher);

        let mut tasks = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down server...");
                    break;
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((socket, addr)) => {
                            Self::handle_new_connection(socket, addr, dispatcher.clone(), limits, &mut tasks);
                        }
                        Err(e) => Self::handle_connection_error(e).await,
                    }
                }

                // Reap finished connection tasks
                Some(res) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = res {
                        error!("Connection task failed: {e}");
                    }
                }
            }
        }

        // Stop accepting before draining
        drop(listener);
        Self::perform_shutdown(&mut tasks, shutdown_timeout).await;

        Ok(())
    }

    /// Serve requests on a single connection.
    ///
    /// Requests are decoded and answered strictly in order. After a response
    /// whose connection is not kept alive the write side is shut down and the
    /// function returns. A decode error returns `Err` without writing
    /// anything; dropping the socket then closes the connection. Responses to
    /// HEAD requests are written without their body.
    pub async fn handle_connection(
        socket: &mut (impl AsyncRead + AsyncWrite + Unpin),
        dispatcher: Arc<Dispatcher>,
        limits: DecoderLimits,
    ) -> Result<(), Error> {
        let mut decoder = RequestDecoder::new(limits);
        let mut buf = Vec::with_capacity(limits.max_chunk_size);
        let mut chunk = vec![0; limits.max_chunk_size];

        loop {
            while let Some(request) = decoder.decode(&mut buf)? {
                let is_head = request.method == Method::HEAD;
                let response = dispatcher.dispatch(request).await;
                let bytes = if is_head { response.head_bytes() } else { response.to_bytes() };
                socket.write_all(&bytes).await?;
                socket.flush().await?;

                if !response.keep_alive {
                    socket.shutdown().await?;
                    return Ok(());
                }
            }

            let n = socket.read(&mut chunk).await?;
            if n == 0 {
                if !decoder.is_idle() || !buf.is_empty() {
                    debug!("Client closed the connection in the middle of a request");
                }
                return Ok(());
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    }
}
