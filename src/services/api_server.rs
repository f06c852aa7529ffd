//! HTTP server lifecycle.
//!
//! Binds the listener, serves the API router on a background task and stops
//! gracefully when the handle's cancellation token fires.

use crate::error::AppError;
use crate::services::api::{router, AppState};
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct ApiServer;

/// Handle to control the running server.
pub struct ApiServerHandle {
    cancel_token: CancellationToken,
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl ApiServer {
    /// Bind `addr` and start serving in the background.
    ///
    /// Port 0 picks a free port; see [`ApiServerHandle::local_addr`].
    pub async fn start(addr: SocketAddr, state: AppState) -> Result<ApiServerHandle, AppError> {
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            AppError::internal(format!("Failed to bind to {}: {}", addr, e))
        })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| AppError::internal(format!("Failed to read local address: {}", e)))?;

        let cancel_token = CancellationToken::new();
        let cancel_clone = cancel_token.clone();
        let app = router(state);

        log::info!("[server] Listening on http://{}", local_addr);

        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                cancel_clone.cancelled().await;
            });

            if let Err(e) = server.await {
                log::error!("[server] Server error: {}", e);
            }

            log::info!("[server] Server stopped");
        });

        Ok(ApiServerHandle {
            cancel_token,
            local_addr,
            task,
        })
    }
}

impl ApiServerHandle {
    /// Address the server is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for in-flight requests to finish.
    pub async fn shutdown(self) {
        log::info!("[server] Stopping server on {}", self.local_addr);
        self.cancel_token.cancel();

        if let Err(e) = self.task.await {
            log::error!("[server] Server task failed: {}", e);
        }
    }
}
