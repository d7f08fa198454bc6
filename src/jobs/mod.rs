use std::sync::Arc;
use tokio::time::{interval, Duration, Instant};
use tracing::{error, info};

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<crate::context::AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<crate::context::AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        // Spawn cleanup tasks
        tokio::spawn(Self::expired_session_cleanup_job(Arc::clone(&self)));
        tokio::spawn(Self::reset_token_cleanup_job(Arc::clone(&self)));

        // Spawn monitoring tasks
        tokio::spawn(Self::health_check_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Cleanup expired sessions (runs every hour)
    async fn expired_session_cleanup_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(3600)); // Every hour

        loop {
            interval.tick().await;
            info!("Running expired session cleanup");
            let started = Instant::now();

            match tasks::cleanup_expired_sessions(&scheduler.context).await {
                Ok(count) => {
                    crate::metrics::record_background_job("session_cleanup", "success", started.elapsed().as_secs_f64());
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    crate::metrics::record_background_job("session_cleanup", "failure", started.elapsed().as_secs_f64());
                    error!("Failed to cleanup expired sessions: {}", e);
                }
            }
        }
    }

    /// Cleanup used and expired password reset tokens (runs every hour)
    async fn reset_token_cleanup_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(3600)); // Every hour

        loop {
            interval.tick().await;
            let started = Instant::now();

            match tasks::cleanup_reset_tokens(&scheduler.context).await {
                Ok(count) => {
                    crate::metrics::record_background_job("reset_token_cleanup", "success", started.elapsed().as_secs_f64());
                    if count > 0 {
                        info!("Cleaned up {} password reset tokens", count);
                    }
                }
                Err(e) => {
                    crate::metrics::record_background_job("reset_token_cleanup", "failure", started.elapsed().as_secs_f64());
                    error!("Failed to cleanup password reset tokens: {}", e);
                }
            }
        }
    }

    /// Health check job (runs every 5 minutes)
    async fn health_check_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300)); // Every 5 minutes

        loop {
            interval.tick().await;
            let started = Instant::now();

            match tasks::health_check(&scheduler.context).await {
                Ok(_) => {
                    // Silent success - health is good
                    crate::metrics::record_background_job("health_check", "success", started.elapsed().as_secs_f64());
                }
                Err(e) => {
                    crate::metrics::record_background_job("health_check", "failure", started.elapsed().as_secs_f64());
                    error!("Health check failed: {}", e);
                }
            }
        }
    }
}
