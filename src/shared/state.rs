use crate::config::AppConfig;
use crate::core::rate_limit::RateLimitState;
use crate::email::Mailer;
use crate::shared::utils::DbPool;
use crate::store::LegalStore;
use std::sync::Arc;

pub struct AppState {
    pub config: AppConfig,
    pub conn: DbPool,
    pub store: Arc<dyn LegalStore>,
    pub mailer: Arc<dyn Mailer>,
    pub rate_limit: Arc<RateLimitState>,
}

impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            conn: self.conn.clone(),
            store: Arc::clone(&self.store),
            mailer: Arc::clone(&self.mailer),
            rate_limit: Arc::clone(&self.rate_limit),
        }
    }
}
