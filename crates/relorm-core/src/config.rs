//! Engine configuration.
//!
//! An [`EngineConfig`] names the driver and the data source. The driver
//! identifier picks the [`Dialect`](crate::dialect::Dialect); the DSN is
//! passed through untouched to whatever connection the caller opens.

use crate::Result;
use crate::dialect::{Dialect, DialectKind, dialect_for};
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::env;

/// Environment variable holding the driver identifier.
pub const DRIVER_ENV: &str = "RELORM_DRIVER";
/// Environment variable holding the data source name.
pub const DSN_ENV: &str = "RELORM_DSN";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub driver: DialectKind,
    pub dsn: String,
}

impl EngineConfig {
    pub fn new(driver: DialectKind, dsn: impl Into<String>) -> Self {
        Self {
            driver,
            dsn: dsn.into(),
        }
    }

    /// Read `RELORM_DRIVER` and `RELORM_DSN` from the process environment.
    #[allow(clippy::result_large_err)]
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup, e.g. a parsed `.env` map.
    #[allow(clippy::result_large_err)]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let driver = lookup(DRIVER_ENV)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::config(format!("{} is not set", DRIVER_ENV)))?;
        let dsn = lookup(DSN_ENV)
            .ok_or_else(|| Error::config(format!("{} is not set", DSN_ENV)))?;
        let config = Self {
            driver: driver.trim().parse()?,
            dsn,
        };
        tracing::debug!(driver = %config.driver, "engine config loaded from environment");
        Ok(config)
    }

    /// Dialect selected by the driver identifier.
    pub fn dialect(&self) -> Box<dyn Dialect> {
        dialect_for(self.driver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn lookup_selects_dialect() {
        let env = vars(&[(DRIVER_ENV, "pgx"), (DSN_ENV, "postgres://localhost/app")]);
        let config = EngineConfig::from_lookup(|k| env.get(k).cloned()).unwrap();
        assert_eq!(config.driver, DialectKind::Postgres);
        assert_eq!(config.dialect().placeholder(2), "$2");
    }

    #[test]
    fn unknown_driver_is_config_error() {
        let env = vars(&[(DRIVER_ENV, "oracle"), (DSN_ENV, "x")]);
        let err = EngineConfig::from_lookup(|k| env.get(k).cloned()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = EngineConfig::from_lookup(|_| None).unwrap_err();
        assert!(err.to_string().contains(DRIVER_ENV));
    }

    #[test]
    fn deserializes_driver_identifier() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"driver":"sqlite3","dsn":"file::memory:"}"#).unwrap();
        assert_eq!(config, EngineConfig::new(DialectKind::Sqlite, "file::memory:"));
        assert!(serde_json::from_str::<EngineConfig>(r#"{"driver":"db2","dsn":""}"#).is_err());
    }
}
