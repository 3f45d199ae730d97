use crate::services::secure_link_service::SecureLinkService;
use tokio::sync::watch;
use tokio::time::{Duration, sleep};

/// Periodically purges secure links that are past their retention window.
pub struct BackgroundWorker {
    links: SecureLinkService,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl BackgroundWorker {
    pub fn new(
        links: SecureLinkService,
        interval_secs: u64,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            links,
            interval: Duration::from_secs(interval_secs.max(1)),
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            "🚀 Background worker started (sweep every {}s)",
            self.interval.as_secs()
        );

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Background worker shutting down");
                    break;
                }
                _ = sleep(self.interval) => {
                    self.perform_cleanup().await;
                }
            }
        }
    }

    pub async fn perform_cleanup(&self) {
        tracing::debug!("🧹 Sweeping stale secure links...");
        match self.links.sweep().await {
            Ok(0) => {}
            Ok(n) => tracing::info!("✅ Sweep removed {} secure links", n),
            Err(e) => tracing::error!("Secure link sweep failed: {}", e),
        }
    }
}
