//! Dynamic route table + hyper serving loop.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Boxed response future produced by a route handler.
pub type BoxResponseFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = Response<Full<Bytes>>> + Send>>;

/// A route handler. Infallible by construction: dispatchers fold every
/// failure into an HTTP response themselves.
pub type RouteHandler = Arc<dyn Fn(Request<Incoming>) -> BoxResponseFuture + Send + Sync>;

/// The host's HTTP router.
///
/// Routes are upserted and removed while the server runs. Lookup is an
/// exact match on `"METHOD:path"`; paths are matched verbatim, the way
/// they were registered.
#[derive(Default)]
pub struct HostRouter {
    routes: RwLock<HashMap<String, RouteHandler>>,
}

impl HostRouter {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(method: &str, path: &str) -> String {
        format!("{}:{}", method.to_uppercase(), path)
    }

    /// Register (or replace) a route. Last writer wins.
    pub fn route(&self, method: &str, path: &str, handler: RouteHandler) {
        let key = Self::key(method, path);
        debug!(%key, "route registered");
        self.routes.write().expect("routes lock").insert(key, handler);
    }

    /// Remove a route. Returns true if it existed.
    pub fn remove_route(&self, method: &str, path: &str) -> bool {
        let key = Self::key(method, path);
        let removed = self
            .routes
            .write()
            .expect("routes lock")
            .remove(&key)
            .is_some();
        if removed {
            debug!(%key, "route removed");
        }
        removed
    }

    /// Look up the handler for a method + path pair.
    pub fn lookup(&self, method: &str, path: &str) -> Option<RouteHandler> {
        self.routes
            .read()
            .expect("routes lock")
            .get(&Self::key(method, path))
            .cloned()
    }

    /// Number of registered routes.
    pub fn route_count(&self) -> usize {
        self.routes.read().expect("routes lock").len()
    }

    /// Serve connections from `listener` until the shutdown signal.
    ///
    /// Spawns a tokio task per connection using HTTP/1.1.
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        info!(%addr, "host router listening");

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    let (stream, peer_addr) = accept_result?;
                    let router = self.clone();

                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let svc = service_fn(move |req: Request<Incoming>| {
                            let router = router.clone();
                            async move { Ok::<_, hyper::Error>(router.dispatch(req).await) }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, svc).await {
                            error!(%peer_addr, error = %e, "connection error");
                        }
                    });
                }
                _ = shutdown.changed() => {
                    info!("host router shutting down");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Resolve and invoke the handler for one request.
    pub async fn dispatch(&self, req: Request<Incoming>) -> Response<Full<Bytes>> {
        let method = req.method().as_str().to_string();
        let path = req.uri().path().to_string();

        match self.lookup(&method, &path) {
            Some(handler) => handler(req).await,
            None => {
                debug!(%method, %path, "no route");
                Response::builder()
                    .status(StatusCode::NOT_FOUND)
                    .header("content-type", "text/plain")
                    .body(Full::new(Bytes::from("not found")))
                    .unwrap()
            }
        }
    }
}
