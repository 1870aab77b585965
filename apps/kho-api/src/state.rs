//! Shared application state.

use std::sync::Arc;

use kho_core::settlement::ShortfallPolicy;
use kho_db::Database;

use crate::auth::JwtManager;
use crate::config::KhoConfig;

/// Cloned into every handler; all fields are cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<KhoConfig>,
    pub jwt: Arc<JwtManager>,
}

impl AppState {
    pub fn new(db: Database, config: KhoConfig) -> Self {
        let jwt = JwtManager::new(config.auth.jwt_secret.clone(), config.auth.token_lifetime_secs);
        AppState {
            db,
            config: Arc::new(config),
            jwt: Arc::new(jwt),
        }
    }

    pub fn shortfall_policy(&self) -> ShortfallPolicy {
        self.config.settlement.shortfall_policy
    }

    pub fn utc_offset_minutes(&self) -> i32 {
        self.config.reporting.utc_offset_minutes
    }
}
