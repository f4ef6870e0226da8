use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct ClubConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub roster_cache: RosterCacheConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RosterCacheConfig {
    pub ttl_seconds: u64,
}

impl RosterCacheConfig {
    pub fn ttl(&self) -> chrono::Duration {
        let max_seconds = (i64::MAX / 1000) as u64;
        chrono::Duration::seconds(self.ttl_seconds.min(max_seconds) as i64)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// OTLP collector; traces stay local when unset.
    pub otlp_endpoint: Option<String>,
}

const DEFAULT_ROSTER_TTL_SECONDS: u64 = 300;
/// Batches run in transactions, which MongoDB only allows on a replica set.
const DEFAULT_MONGODB_URI: &str = "mongodb://localhost:27017/?replicaSet=rs0";

impl ClubConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| common_config.log_level.clone());

        Ok(ClubConfig {
            common: common_config,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", Some(DEFAULT_MONGODB_URI), is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("club_db"), is_prod)?,
            },
            roster_cache: RosterCacheConfig {
                ttl_seconds: env::var("ROSTER_CACHE_TTL_SECONDS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_ROSTER_TTL_SECONDS),
            },
            observability: ObservabilityConfig {
                log_level,
                otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|v| !v.is_empty()),
            },
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_falls_back_outside_prod() {
        let value = get_env("CLUB_TEST_SURELY_UNSET_KEY", Some("fallback"), false).unwrap();
        assert_eq!(value, "fallback");
    }

    #[test]
    fn test_get_env_requires_value_in_prod() {
        let result = get_env("CLUB_TEST_SURELY_UNSET_KEY", Some("fallback"), true);
        assert!(matches!(result, Err(AppError::ConfigError(_))));
        let result = get_env("CLUB_TEST_SURELY_UNSET_KEY", None, false);
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_default_mongodb_uri_targets_a_replica_set() {
        assert!(DEFAULT_MONGODB_URI.contains("replicaSet="));
    }

    #[test]
    fn test_roster_ttl_converts_to_duration() {
        let config = RosterCacheConfig { ttl_seconds: 90 };
        assert_eq!(config.ttl(), chrono::Duration::seconds(90));
    }
}
