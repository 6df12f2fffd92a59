use crate::application_port::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Periodically deletes expired refresh records.
pub struct Sweeper {
    token_service: Arc<dyn TokenService>,
    interval: Duration,
    cancellation_token: CancellationToken,
}

impl Sweeper {
    pub fn new(
        token_service: Arc<dyn TokenService>,
        interval: Duration,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            token_service,
            interval,
            cancellation_token,
        }
    }

    async fn tick_once(&self) -> Result<u64, TokenError> {
        self.token_service.cleanup_expired().await
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    tracing::info!("Sweeper shutting down...");
                    break;
                }
                _ = ticker.tick() => {
                    match self.tick_once().await {
                        Ok(0) => {}
                        Ok(removed) => tracing::info!(removed, "expired refresh tokens removed"),
                        Err(e) => tracing::error!("Sweeper error: {}", e),
                    }
                }
            }
        }
        Ok(())
    }

    /// Runs the loop on its own task. A loop failure is logged, never dropped.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.run().await {
                tracing::error!("Sweeper stopped: {:#}", e);
            }
        })
    }
}
