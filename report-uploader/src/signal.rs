//! Interrupt handling for SIGTERM and SIGINT.
//!
//! The first signal cancels a [`CancellationToken`]. The executor watches that
//! token: it stops waiting for uploads, writes the manifest, and returns
//! [`UploaderError::Interrupted`](crate::UploaderError::Interrupted).

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Bridges process signals to a cancellation token
#[derive(Debug, Clone, Default)]
pub struct InterruptSignal {
    token: CancellationToken,
}

impl InterruptSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token cancelled when a signal arrives
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel the token without a signal
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Wait for SIGINT or SIGTERM, then cancel the token.
    ///
    /// If no handler can be installed the token is never cancelled by a signal.
    pub async fn wait_for_signal(&self) {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), interrupting upload...");
            }
            _ = terminate => {
                info!("Received SIGTERM, interrupting upload...");
            }
            _ = self.token.cancelled() => return,
        }

        self.token.cancel();
    }
}
