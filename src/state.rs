use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::{
    auth::{
        jwt::SessionKeys,
        policy::PasswordPolicy,
        repo::{IdentityStore, PgIdentityStore},
    },
    config::AppConfig,
    notify::{LogNotifier, Notifier},
    rate_limit::RateLimiter,
};

/// Process-wide dependencies, fixed after startup and shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn IdentityStore>,
    pub notifier: Arc<dyn Notifier>,
    pub keys: SessionKeys,
    pub policy: PasswordPolicy,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        // Run migrations if present
        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            tracing::warn!(error = %e, "migrations failed; continuing");
        }

        let notifier = Arc::new(LogNotifier::new(&config.app_base_url));
        Ok(Self::from_parts(
            config,
            Arc::new(PgIdentityStore::new(db)),
            notifier,
        ))
    }

    pub fn from_parts(
        config: AppConfig,
        store: Arc<dyn IdentityStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            keys: SessionKeys::new(&config.session),
            limiter: Arc::new(RateLimiter::new(&config.rate_limit)),
            policy: PasswordPolicy::default(),
            config: Arc::new(config),
            store,
            notifier,
        }
    }
}
