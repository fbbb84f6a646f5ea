/// Application context and dependency injection
use crate::{
    account::AccountManager,
    config::ServerConfig,
    db,
    error::PulseResult,
    features::FeatureManager,
    feedback::FeedbackManager,
    mailer::Mailer,
    otp::OtpManager,
    rate_limit::CredentialRateLimiter,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub account_manager: Arc<AccountManager>,
    pub otp_manager: Arc<OtpManager>,
    pub feature_manager: Arc<FeatureManager>,
    pub feedback_manager: Arc<FeedbackManager>,
    pub mailer: Mailer,
    // None when throttling is switched off
    pub rate_limiter: Option<Arc<CredentialRateLimiter>>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> PulseResult<Self> {
        config.validate()?;

        let pool = db::create_pool(&config.storage.database_path, db::DatabaseOptions::default()).await?;
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        let mailer = Mailer::new(config.email.clone())?;
        if !mailer.is_configured() {
            tracing::warn!("SMTP not configured; verification emails will be logged and skipped");
        }

        Ok(Self::with_pool_and_mailer(config, pool, mailer))
    }

    /// Assemble the context around an existing pool and mailer
    pub fn with_pool_and_mailer(config: ServerConfig, pool: SqlitePool, mailer: Mailer) -> Self {
        let config = Arc::new(config);

        let rate_limiter = if config.rate_limit.enabled {
            Some(Arc::new(CredentialRateLimiter::new(
                config.rate_limit.credential_requests_per_minute,
            )))
        } else {
            None
        };

        Self {
            account_manager: Arc::new(AccountManager::new(pool.clone(), Arc::clone(&config))),
            otp_manager: Arc::new(OtpManager::new(pool.clone(), Arc::clone(&config), mailer.clone())),
            feature_manager: Arc::new(FeatureManager::new(pool.clone())),
            feedback_manager: Arc::new(FeedbackManager::new(pool.clone())),
            config,
            db: pool,
            mailer,
            rate_limiter,
        }
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!("http://{}:{}", self.config.service.hostname, self.config.service.port)
    }
}
