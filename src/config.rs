use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::autonumber::allocator::AllocationStrategy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub allocation: AllocationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationConfig {
    pub strategy: AllocationStrategy,
    pub query_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:data/autonumber.db".to_string(),
            max_connections: 5,
            acquire_timeout_secs: 5,
        }
    }
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            strategy: AllocationStrategy::MaxPlusOne,
            query_timeout_ms: 5000,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let strategy = match env::var("AUTONUMBER_ALLOCATION_STRATEGY") {
            Ok(name) => name.parse::<AllocationStrategy>()?,
            Err(_) => AllocationStrategy::MaxPlusOne,
        };

        Ok(Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite:data/autonumber.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
                acquire_timeout_secs: env::var("DATABASE_ACQUIRE_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            allocation: AllocationConfig {
                strategy,
                query_timeout_ms: env::var("AUTONUMBER_QUERY_TIMEOUT_MS")
                    .unwrap_or_else(|_| "5000".to_string())
                    .parse()
                    .unwrap_or(5000),
            },
        })
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

impl AllocationConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let db = DatabaseConfig::default();
        assert_eq!(db.url, "sqlite:data/autonumber.db");
        assert_eq!(db.acquire_timeout(), Duration::from_secs(5));

        let allocation = AllocationConfig::default();
        assert_eq!(allocation.strategy, AllocationStrategy::MaxPlusOne);
        assert_eq!(allocation.query_timeout(), Duration::from_millis(5000));
    }

    #[test]
    fn test_config_serializes() {
        let config = Config {
            database: DatabaseConfig::default(),
            allocation: AllocationConfig {
                strategy: AllocationStrategy::Counter,
                query_timeout_ms: 250,
            },
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["allocation"]["strategy"], "counter");
        assert_eq!(json["allocation"]["query_timeout_ms"], 250);
    }
}
