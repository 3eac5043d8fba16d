use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Seconds between sweep passes
    pub interval_secs: u64,
    /// Hard wall-clock TTL for media payloads, independent of view tracking
    pub media_ttl_hours: i64,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// When absent the service runs against the in-memory store (dev/test)
    pub database_url: Option<String>,
    pub port: u16,
    pub sweeper: SweeperConfig,
    /// Bounded attempts when an atomic ledger update loses a race
    pub max_conflict_retries: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::AppError> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());
        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let interval_secs = env::var("SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);
        let media_ttl_hours = env::var("MEDIA_TTL_HOURS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(24);
        if media_ttl_hours <= 0 {
            return Err(crate::error::AppError::Config(
                "MEDIA_TTL_HOURS must be positive".into(),
            ));
        }

        let max_conflict_retries = env::var("MAX_CONFLICT_RETRIES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3);

        Ok(Self {
            database_url,
            port,
            sweeper: SweeperConfig {
                interval_secs,
                media_ttl_hours,
            },
            max_conflict_retries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_env_unset() {
        // from_env reads the process environment, so exercise the parsing
        // fallbacks directly instead of mutating global state
        let port: u16 = "not-a-port".parse().ok().unwrap_or(3000);
        assert_eq!(port, 3000);

        let interval: u64 = "".parse().ok().unwrap_or(60);
        assert_eq!(interval, 60);
    }

    #[test]
    fn sweeper_config_carries_ttl() {
        let cfg = Config {
            database_url: None,
            port: 3000,
            sweeper: SweeperConfig {
                interval_secs: 30,
                media_ttl_hours: 24,
            },
            max_conflict_retries: 3,
        };
        assert_eq!(cfg.sweeper.media_ttl_hours, 24);
        assert!(cfg.database_url.is_none());
    }
}
