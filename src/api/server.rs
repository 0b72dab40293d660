//! Portal server lifecycle: binds the HTTP listener and serves
//! `api_router()` until shutdown.
//!
//! bind → spawn background task → return handle with shutdown channel.

use std::net::SocketAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::api::router::api_router;
use crate::core_state::CoreState;

// ═══════════════════════════════════════════════════════════
// Public types
// ═══════════════════════════════════════════════════════════

/// Session metadata for a running portal server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSession {
    pub session_id: String,
    pub server_addr: String,
    pub port: u16,
    pub started_at: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind portal server on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("Failed to get server address: {0}")]
    LocalAddr(std::io::Error),
    #[error("Server error: {0}")]
    Serve(std::io::Error),
}

/// Handle to a running portal server.
pub struct PortalServer {
    pub session: ServerSession,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl PortalServer {
    /// Signal a graceful shutdown. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("Portal server shutdown signal sent");
        }
    }

    /// Wait for the server task to finish after `shutdown`.
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Portal server task panicked");
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Server lifecycle
// ═══════════════════════════════════════════════════════════

/// Start the portal server on `addr` in a background task.
///
/// Port 0 binds an ephemeral port; the chosen one is reported in the
/// returned session.
pub async fn start_server(core: Arc<CoreState>, addr: SocketAddr) -> Result<PortalServer, ServerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    let addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

    let app = api_router(core);

    let session = ServerSession {
        session_id: Uuid::new_v4().to_string(),
        server_addr: addr.to_string(),
        port: addr.port(),
        started_at: chrono::Utc::now().to_rfc3339(),
    };

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("Portal server received shutdown signal");
        };

        tracing::info!(%addr, "Portal server started");

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!(error = %e, "Portal server error");
        }

        tracing::info!("Portal server stopped");
    });

    Ok(PortalServer {
        session,
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    })
}

/// Serve in the foreground until Ctrl-C.
pub async fn serve_until_ctrl_c(core: Arc<CoreState>, addr: SocketAddr) -> Result<(), ServerError> {
    let mut server = start_server(core, addr).await?;
    tracing::info!(addr = %server.session.server_addr, "Listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        server.shutdown();
        server.join().await;
        return Err(ServerError::Serve(e));
    }

    server.shutdown();
    server.join().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use crate::core_state::test_support::state;

    fn loopback() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    /// Minimal HTTP/1.1 GET; returns the raw response text.
    async fn http_get(port: u16, path: &str) -> String {
        let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        String::from_utf8_lossy(&response).into_owned()
    }

    #[tokio::test]
    async fn start_and_stop_server() {
        let mut server = start_server(Arc::new(state()), loopback())
            .await
            .expect("server should start");

        assert!(!server.session.session_id.is_empty());
        assert!(server.session.port > 0);

        let response = http_get(server.session.port, "/api/health").await;
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.contains("\"status\":\"ok\""));

        server.shutdown();
        server.join().await;
    }

    #[tokio::test]
    async fn serves_protected_and_unknown_routes() {
        let mut server = start_server(Arc::new(state()), loopback()).await.unwrap();
        let port = server.session.port;

        let response = http_get(port, "/api/policies").await;
        assert!(response.starts_with("HTTP/1.1 401"), "{response}");

        let response = http_get(port, "/nonexistent").await;
        assert!(response.starts_with("HTTP/1.1 404"), "{response}");

        server.shutdown();
        server.join().await;
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let mut first = start_server(Arc::new(state()), loopback()).await.unwrap();
        let taken = SocketAddr::from(([127, 0, 0, 1], first.session.port));

        let err = start_server(Arc::new(state()), taken).await.err().unwrap();
        assert!(matches!(err, ServerError::Bind { .. }));

        first.shutdown();
        first.join().await;
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let mut server = start_server(Arc::new(state()), loopback()).await.unwrap();
        server.shutdown();
        server.shutdown();
        server.join().await;
        server.join().await;
    }
}
