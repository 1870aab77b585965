//! Server configuration.
//!
//! Layered with the `config` crate:
//!
//! ```text
//!   built-in defaults  →  kho.toml (optional)  →  KHO_* environment
//!
//!   KHO_SERVER__PORT=9000
//!   KHO_DATABASE__PATH=/var/lib/kho/kho.db
//!   KHO_SETTLEMENT__SHORTFALL_POLICY=reject
//!   KHO_AUTH__JWT_SECRET=...
//! ```

use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use kho_core::settlement::ShortfallPolicy;
use kho_db::DbConfig;

/// Vietnam (UTC+7); report buckets follow the shop's wall clock.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 420;

#[derive(Debug, Clone, Deserialize)]
pub struct KhoConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub settlement: SettlementConfig,
    pub reporting: ReportingConfig,
    /// Shown in 500 responses so staff know whom to call.
    pub support_contact: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Access token lifetime in seconds.
    pub token_lifetime_secs: i64,
    /// Require a bearer token on every `/api` route except login.
    pub enforce: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettlementConfig {
    pub shortfall_policy: ShortfallPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportingConfig {
    pub utc_offset_minutes: i32,
}

impl KhoConfig {
    /// Loads `kho.toml` from the working directory plus the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("kho")
    }

    /// `file` is a path without extension; a missing file is not an error.
    pub fn load_from(file: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.path", "kho.db")?
            .set_default("database.max_connections", 5)?
            .set_default("database.min_connections", 1)?
            .set_default("database.connect_timeout_secs", 30)?
            .set_default("auth.jwt_secret", "kho-dev-secret-change-in-production")?
            .set_default("auth.token_lifetime_secs", 8 * 3600)?
            .set_default("auth.enforce", false)?
            .set_default("settlement.shortfall_policy", "allow")?
            .set_default("reporting.utc_offset_minutes", DEFAULT_UTC_OFFSET_MINUTES)?
            .set_default("support_contact", "support@kho.vn")?
            .add_source(File::with_name(file).required(false))
            .add_source(Environment::with_prefix("KHO").separator("__"))
            .build()?;

        let config: KhoConfig = settings.try_deserialize()?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.auth.token_lifetime_secs <= 0 {
            return Err(ConfigError::InvalidValue("auth.token_lifetime_secs".to_string()));
        }
        if self.reporting.utc_offset_minutes.abs() > 14 * 60 {
            return Err(ConfigError::InvalidValue("reporting.utc_offset_minutes".to_string()));
        }
        Ok(())
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .connect_timeout(Duration::from_secs(self.database.connect_timeout_secs))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error(transparent)]
    Load(#[from] config::ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = KhoConfig::load_from("does-not-exist").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.settlement.shortfall_policy, ShortfallPolicy::Allow);
        assert_eq!(config.reporting.utc_offset_minutes, 420);
        assert!(!config.auth.enforce);
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }
}
