//! # ambit-server
//!
//! The CORE plugins every Ambit host needs and the HTTP listener:
//!
//! - [`CoreRouter`]: method + path routing on top of `axum::Router`
//! - [`HtmlEngine`]: the template engine, with the shared page layout
//! - [`CookieSessions`]: signed-cookie sessions persisted through secure storage
//! - [`start_server`]: binds the listener and serves the composed handler

pub mod router;
pub mod sessions;
pub mod templates;

pub use router::CoreRouter;
pub use sessions::CookieSessions;
pub use templates::HtmlEngine;

use ambit_core::{AmbitError, Result};
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

/// Bind `listen` and serve `handler` until Ctrl-C or SIGTERM.
pub async fn start_server(listen: &str, handler: axum::Router) -> Result<()> {
    let listener = TcpListener::bind(listen)
        .await
        .map_err(|e| AmbitError::Server(format!("failed to bind {listen}: {e}")))?;
    serve(listener, handler, shutdown_signal()).await
}

/// Serve on an already-bound listener until `shutdown` resolves. Each request
/// carries the peer address as `ConnectInfo<SocketAddr>`.
pub async fn serve<F>(listener: TcpListener, handler: axum::Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener
        .local_addr()
        .map_err(|e| AmbitError::Server(e.to_string()))?;
    info!(listen = %addr, "starting HTTP server");

    axum::serve(listener, handler.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| AmbitError::Server(format!("server error: {e}")))?;

    info!("HTTP server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
