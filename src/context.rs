/// Application context and dependency injection
use crate::{
    account::{AccountManager, SessionStore},
    config::ServerConfig,
    db,
    error::{AppError, AppResult},
    events::EventManager,
    fees::FeeManager,
    ledger::LedgerManager,
    mailer::{Mailer, Notifier},
    members::MemberManager,
    rate_limit::RateLimiter,
    verification::CardVerifier,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub accounts: Arc<AccountManager>,
    pub sessions: Arc<SessionStore>,
    pub members: Arc<MemberManager>,
    pub fees: Arc<FeeManager>,
    pub events: Arc<EventManager>,
    pub ledger: Arc<LedgerManager>,
    pub verifier: Arc<CardVerifier>,
    // Rate limiter
    pub rate_limiter: Arc<RateLimiter>,
    // Email
    pub notifier: Arc<dyn Notifier>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> AppResult<Self> {
        // Validate configuration
        config.validate()?;

        // Create data directories if they don't exist
        Self::ensure_directories(&config).await?;

        let db = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;

        // Run migrations
        db::run_migrations(&db).await?;

        // Test connection
        db::test_connection(&db).await?;

        let mailer = Mailer::new(config.email.clone(), &config.service.association_name)?;
        if !mailer.is_configured() {
            tracing::warn!("Email is not configured; reset links and confirmations will not be mailed");
        }

        Ok(Self::with_services(config, db, Arc::new(mailer)))
    }

    /// Wire the managers around an existing pool and notifier
    pub fn with_services(config: ServerConfig, db: SqlitePool, notifier: Arc<dyn Notifier>) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));
        let sessions = Arc::new(SessionStore::new(db.clone(), config.session.ttl_hours));

        Self {
            accounts: Arc::new(AccountManager::new(db.clone())),
            sessions,
            members: Arc::new(MemberManager::new(db.clone())),
            fees: Arc::new(FeeManager::new(db.clone())),
            events: Arc::new(EventManager::new(db.clone())),
            ledger: Arc::new(LedgerManager::new(db.clone())),
            verifier: Arc::new(CardVerifier::new(db.clone())),
            rate_limiter,
            notifier,
            config: Arc::new(config),
            db,
        }
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> AppResult<()> {
        let mut dirs = vec![config.storage.data_directory.clone()];
        if let Some(parent) = config.storage.database.parent() {
            dirs.push(parent.to_path_buf());
        }

        for dir in dirs {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                tokio::fs::create_dir_all(&dir).await.map_err(|e| {
                    AppError::Internal(format!("Failed to create directory {:?}: {}", dir, e))
                })?;
            }
        }

        Ok(())
    }

    /// Base URL for links that leave the site (emails, QR codes)
    pub fn public_url(&self) -> &str {
        self.config.service.public_url.trim_end_matches('/')
    }

    pub fn association_name(&self) -> &str {
        &self.config.service.association_name
    }

    /// Context over an in-memory database, with mail captured in memory
    #[cfg(test)]
    pub async fn for_tests() -> (Self, Arc<crate::mailer::tests::RecordingNotifier>) {
        let notifier = Arc::new(crate::mailer::tests::RecordingNotifier::default());
        let ctx = Self::with_services(ServerConfig::for_tests(), db::test_pool().await, notifier.clone());
        (ctx, notifier)
    }
}
