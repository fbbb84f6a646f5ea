use crate::metrics;
use std::{sync::Arc, time::Instant};
use tokio::time::{interval, Duration};
use tracing::{error, info};

pub mod tasks;

const HEALTH_CHECK_INTERVAL_SECS: u64 = 300;

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

        tokio::spawn(Self::pending_registration_reaper_job(Arc::clone(&self)));
        tokio::spawn(Self::health_check_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Purge expired pending registrations
    async fn pending_registration_reaper_job(scheduler: Arc<Self>) {
        let period = scheduler.context.config.registration.reaper_interval_seconds.max(1);
        let mut interval = interval(Duration::from_secs(period));

        loop {
            interval.tick().await;
            let start = Instant::now();

            match tasks::reap_expired_registrations(&scheduler.context).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Purged {} expired pending registrations", count);
                    }
                    metrics::record_background_job("otp_reaper", "success", start.elapsed().as_secs_f64());
                }
                Err(e) => {
                    error!("Failed to purge expired pending registrations: {}", e);
                    metrics::record_background_job("otp_reaper", "failure", start.elapsed().as_secs_f64());
                }
            }
        }
    }

    /// Health check job (runs every 5 minutes)
    async fn health_check_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(HEALTH_CHECK_INTERVAL_SECS));

        loop {
            interval.tick().await;
            let start = Instant::now();

            match tasks::health_check(&scheduler.context).await {
                Ok(_) => {
                    metrics::record_background_job("health_check", "success", start.elapsed().as_secs_f64());
                }
                Err(e) => {
                    error!("Health check failed: {}", e);
                    metrics::record_background_job("health_check", "failure", start.elapsed().as_secs_f64());
                }
            }
        }
    }
}
