/// Configuration for the worker
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 2)
/// - `RECONCILE_INTERVAL_SECS`: seconds between passes (default: 300)
/// - `RUST_LOG`: Log level (default: teamsync_worker=debug)

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Default seconds between reconciliation passes
pub const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 300;

/// Worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// PostgreSQL connection URL
    pub database_url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,

    /// Seconds between reconciliation passes
    pub reconcile_interval_secs: u64,
}

impl WorkerConfig {
    /// Loads configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "2".to_string())
            .parse::<u32>()?;

        let reconcile_interval_secs = parse_interval(env::var("RECONCILE_INTERVAL_SECS").ok())?;

        Ok(Self {
            database_url,
            max_connections,
            reconcile_interval_secs,
        })
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }
}

fn parse_interval(raw: Option<String>) -> anyhow::Result<u64> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_RECONCILE_INTERVAL_SECS);
    };
    let secs = raw
        .trim()
        .parse::<u64>()
        .map_err(|e| anyhow::anyhow!("RECONCILE_INTERVAL_SECS: {}", e))?;
    if secs == 0 {
        anyhow::bail!("RECONCILE_INTERVAL_SECS must be at least 1");
    }
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval(None).unwrap(), 300);
        assert_eq!(parse_interval(Some(" 60 ".to_string())).unwrap(), 60);
        assert!(parse_interval(Some("0".to_string())).is_err());
        assert!(parse_interval(Some("soon".to_string())).is_err());
    }
}
