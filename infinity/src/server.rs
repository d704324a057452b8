//! HTTP endpoint the pytest workers publish their results to.

use std::io;
use std::net::SocketAddr;
use std::thread::{self, JoinHandle};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::tui::events::DashboardHandle;
use crate::types::{DashboardConfig, ResultEvent};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to start server runtime: {0}")]
    Runtime(#[source] io::Error),
}

/// Router with the single result route mounted at `route_path`.
pub fn router(route_path: &str, handle: DashboardHandle) -> Router {
    Router::new()
        .route(route_path, post(test_update))
        .with_state(handle)
}

/// Decode one result and hand it to the dashboard.
///
/// Bodies that do not decode are dropped; the worker still gets an empty 200.
async fn test_update(State(handle): State<DashboardHandle>, body: Bytes) -> StatusCode {
    match serde_json::from_slice::<ResultEvent>(&body) {
        Ok(event) => {
            debug!(
                name = %event.name,
                scope = %event.xdist_scope,
                result = %event.result,
                "received result"
            );
            handle.record_result(event).await;
        }
        Err(err) => {
            debug!(%err, bytes = body.len(), "dropping malformed result");
            handle.log(format!("dropped malformed result: {err}"));
        }
    }
    StatusCode::OK
}

/// Serve `app` on `listener` until `shutdown` fires or its sender is dropped.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: oneshot::Receiver<()>,
) -> io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown.await;
        })
        .await
}

/// A result endpoint running on its own runtime thread.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting requests, let in-flight ones finish and join the thread.
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("result endpoint thread panicked");
            }
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}

/// Bind the configured address and serve results on a background thread.
///
/// Binding happens before this returns so an address conflict is reported
/// to the caller instead of from inside the thread.
pub fn spawn_server(
    config: &DashboardConfig,
    handle: DashboardHandle,
) -> Result<ServerHandle, ServerError> {
    let addr = format!("{}:{}", config.host, config.port);
    let bind_error = |source| ServerError::Bind {
        addr: addr.clone(),
        source,
    };

    let listener = std::net::TcpListener::bind(&addr).map_err(bind_error)?;
    listener.set_nonblocking(true).map_err(bind_error)?;
    let local_addr = listener.local_addr().map_err(bind_error)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("infinity-http")
        .enable_all()
        .build()
        .map_err(ServerError::Runtime)?;

    let route = config.route_path();
    let app = router(&route, handle);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let thread = thread::Builder::new()
        .name("result-endpoint".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                let listener = match TcpListener::from_std(listener) {
                    Ok(listener) => listener,
                    Err(err) => {
                        warn!(%err, "cannot register listener");
                        return;
                    }
                };
                if let Err(err) = serve(listener, app, shutdown_rx).await {
                    warn!(%err, "result endpoint failed");
                }
            });
        })
        .map_err(ServerError::Runtime)?;

    info!(%local_addr, %route, "listening for results");

    Ok(ServerHandle {
        local_addr,
        shutdown: Some(shutdown_tx),
        thread: Some(thread),
    })
}
