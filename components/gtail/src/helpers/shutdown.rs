// External crates
use tokio::{signal, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Process-wide shutdown handle, built on-top of a `CancellationToken`.
///
/// - The tail loop awaits `.cancelled()` alongside every fetch and sleep.
/// - The Ctrl+C listener calls `.trigger()`.
/// - Clones share the same token.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    #[instrument(name = "gtail_shutdown::new", target = "helpers::shutdown", level = "trace")]
    pub fn new() -> Self {
        tracing::trace!("Creating shutdown handle");
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Trigger shutdown, waking everything waiting on `.cancelled()`.
    #[instrument(name = "gtail_shutdown::trigger", target = "helpers::shutdown", level = "trace", skip(self))]
    pub fn trigger(&self) {
        tracing::trace!("Shutdown triggered");
        self.token.cancel();
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once `.trigger()` has been called.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Spawn a background task that triggers shutdown on Ctrl+C.
    pub fn listen_for_ctrl_c(&self) -> JoinHandle<()> {
        let shutdown = self.clone();
        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    tracing::debug!("Ctrl+C signal detected, shutting down");
                    shutdown.trigger();
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
                }
            }
        })
    }
}
