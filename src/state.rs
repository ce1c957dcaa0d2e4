use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::{PasswordHasher, TokenService};
use crate::config::{AppConfig, ErrorMode};
use crate::database::{PgTourRepository, PgUserRepository, TourRepository, UserRepository};
use crate::services::Mailer;

/// Shared, read-only after startup; cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tours: Arc<dyn TourRepository>,
    pub users: Arc<dyn UserRepository>,
    pub mailer: Arc<dyn Mailer>,
    pub tokens: TokenService,
    pub passwords: PasswordHasher,
}

impl AppState {
    /// Postgres-backed state
    pub fn new(config: AppConfig, pool: PgPool, mailer: Arc<dyn Mailer>) -> Self {
        Self::with_repositories(
            config,
            Arc::new(PgTourRepository::new(pool.clone())),
            Arc::new(PgUserRepository::new(pool)),
            mailer,
        )
    }

    pub fn with_repositories(
        config: AppConfig,
        tours: Arc<dyn TourRepository>,
        users: Arc<dyn UserRepository>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let tokens = TokenService::from_config(&config.security);
        let passwords = PasswordHasher::new(config.security.bcrypt_cost);
        Self {
            config: Arc::new(config),
            tours,
            users,
            mailer,
            tokens,
            passwords,
        }
    }

    pub fn error_mode(&self) -> ErrorMode {
        self.config.error_mode()
    }
}
