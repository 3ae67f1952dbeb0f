//! Request handlers and the route table.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use log::warn;

use crate::parser::{HttpRequest, Method};
use crate::server::{Error, HttpResponse};

/// Type alias for a boxed future that resolves to a handler's response body.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<String, Error>> + Send>>;

/// Type alias for a route handler: takes the request, yields a plain-text body or an error.
pub type HandlerFn = Arc<dyn Fn(HttpRequest) -> HandlerFuture + Send + Sync>;

/// Boxed future of a fallback handler.
pub type FallbackFuture = Pin<Box<dyn Future<Output = Result<HttpResponse, Error>> + Send>>;

/// A handler consulted when no route matches; it builds the whole response.
pub type FallbackFn = Arc<dyn Fn(HttpRequest) -> FallbackFuture + Send + Sync>;

/// Box a closure returning a future into a [`HandlerFn`].
pub fn handler_fn<F, Fut>(handler: F) -> HandlerFn
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, Error>> + Send + 'static,
{
    Arc::new(move |req: HttpRequest| -> HandlerFuture { Box::pin(handler(req)) })
}

/// Box a closure returning a future into a [`FallbackFn`].
pub fn fallback_fn<F, Fut>(handler: F) -> FallbackFn
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
{
    Arc::new(move |req: HttpRequest| -> FallbackFuture { Box::pin(handler(req)) })
}

/// Represents a route in the HTTP server.
#[derive(Clone)]
pub struct Route {
    /// The HTTP method to match.
    pub method: Method,
    /// The exact path to match, query string included.
    pub path: String,
    /// The handler function.
    pub handler: HandlerFn,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Ordered collection of routes with exact-match lookup.
///
/// The table is filled before the server starts and only read afterwards.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Create an empty route table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route.
    ///
    /// Registering the same method and path twice replaces the earlier
    /// handler in place, so the last registration wins.
    pub fn add_route(&mut self, route: Route) {
        match self
            .routes
            .iter_mut()
            .find(|existing| existing.method == route.method && existing.path == route.path)
        {
            Some(existing) => {
                warn!("Replacing handler for {} {}", route.method, route.path);
                existing.handler = route.handler;
            }
            None => self.routes.push(route),
        }
    }

    /// Find the route registered for exactly this method and path.
    pub fn find_route(&self, method: Method, path: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|route| route.method == method && route.path == path)
    }

    /// Iterate over routes in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// True when no route is registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
