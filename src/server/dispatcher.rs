//! Request dispatch.
//!
//! Looks up the route for a decoded request, runs its handler and turns the
//! outcome into a response:
//!
//! - handler returned `Ok(body)`: 200 with a plain-text body
//! - handler returned `Err` or panicked: 500 with the body `Error`
//! - no route: the fallback handler if one is installed, otherwise 404 with
//!   the body `Not Found`
//!
//! Every response is finalized with `Content-Type`, `Content-Length`,
//! `Server` and `Date`, plus the keep-alive decision taken from the request.

use std::future::Future;
use log::{debug, error, warn};

use crate::parser::{HttpRequest, Method};
use crate::server::error::Error;
use crate::server::handler::{FallbackFn, RouteTable};
use crate::server::response::{HttpResponse, StatusCode};

/// Body of the 404 response.
pub const NOT_FOUND_BODY: &str = "Not Found";
/// Body of the 500 response sent when a handler fails.
pub const ERROR_BODY: &str = "Error";

/// Maps decoded requests to responses using a route table.
#[derive(Default)]
pub struct Dispatcher {
    routes: RouteTable,
    fallback: Option<FallbackFn>,
}

impl Dispatcher {
    /// Create a dispatcher over the given routes.
    pub fn new(routes: RouteTable) -> Self {
        Self {
            routes,
            fallback: None,
        }
    }

    /// The routes this dispatcher consults.
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Mutable access to the routes, for registration before serving.
    pub fn routes_mut(&mut self) -> &mut RouteTable {
        &mut self.routes
    }

    /// Install the handler used when no route matches.
    pub fn set_fallback(&mut self, fallback: FallbackFn) {
        self.fallback = Some(fallback);
    }

    /// True when a fallback handler is installed.
    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Produce the response for one request.
    pub async fn dispatch(&self, request: HttpRequest) -> HttpResponse {
        let version = request.version;
        let keep_alive = request.is_keep_alive();
        let method = request.method;
        let path = request.path.clone();

        let response = match self.routes.find_route(method, &path) {
            Some(route) => match run_guarded(method, &path, (route.handler)(request)).await {
                Some(body) => HttpResponse::plain(StatusCode::Ok, body),
                None => HttpResponse::plain(StatusCode::InternalServerError, ERROR_BODY),
            },
            None => match &self.fallback {
                Some(fallback) => run_guarded(method, &path, fallback(request))
                    .await
                    .unwrap_or_else(|| HttpResponse::plain(StatusCode::InternalServerError, ERROR_BODY)),
                None => {
                    debug!("No route for {method} {path}");
                    HttpResponse::plain(StatusCode::NotFound, NOT_FOUND_BODY)
                }
            },
        };

        debug!("{method} {path} -> {}", response.status.as_u16());
        response.finalize(version, keep_alive)
    }
}

/// Run a handler future on its own task so that a panic is contained.
///
/// Returns `None` when the handler failed or panicked.
async fn run_guarded<T, F>(method: Method, path: &str, handler: F) -> Option<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T, Error>> + Send + 'static,
{
    match tokio::spawn(handler).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            warn!("Handler for {method} {path} failed: {e}");
            None
        }
        Err(e) => {
            error!("Handler for {method} {path} panicked: {e}");
            None
        }
    }
}
