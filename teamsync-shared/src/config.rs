/// Policy knobs for the core services
///
/// # Environment Variables
///
/// - `LEADER_SUCCESSION`: `lowest-id` (default) or `join-order`
/// - `NOTIFICATION_PAGE_SIZE`: inbox page size (default: 20)
/// - `STORE_MAX_ATTEMPTS`: attempts per operation on serialization
///   failure (default: 3)
///
/// # Example
///
/// ```
/// use teamsync_shared::config::{CoreConfig, LeaderSuccession};
///
/// let config = CoreConfig::default();
/// assert_eq!(config.leader_succession, LeaderSuccession::LowestId);
/// assert_eq!(config.notification_page_size, 20);
/// ```

use serde::{Deserialize, Serialize};
use std::env;
use std::num::ParseIntError;
use std::str::FromStr;
use thiserror::Error;

use crate::models::{Team, UserId};

/// Errors raised while reading the policy from the environment
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown leader succession policy '{0}', expected lowest-id or join-order")]
    UnknownSuccession(String),

    #[error("{var}: {source}")]
    InvalidNumber {
        var: &'static str,
        #[source]
        source: ParseIntError,
    },

    #[error("STORE_MAX_ATTEMPTS must be at least 1")]
    ZeroAttempts,
}

/// Who takes over when a team's leader is removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeaderSuccession {
    /// Remaining member with the smallest id
    #[default]
    LowestId,

    /// Remaining member who joined first
    JoinOrder,
}

impl LeaderSuccession {
    /// Picks the successor among the team's current members
    ///
    /// Call after the outgoing leader has been removed. Returns `None` for an
    /// empty team.
    pub fn pick(&self, team: &Team) -> Option<UserId> {
        match self {
            LeaderSuccession::LowestId => team.members.iter().min().copied(),
            LeaderSuccession::JoinOrder => team.members.first().copied(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LeaderSuccession::LowestId => "lowest-id",
            LeaderSuccession::JoinOrder => "join-order",
        }
    }
}

impl FromStr for LeaderSuccession {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lowest-id" => Ok(LeaderSuccession::LowestId),
            "join-order" => Ok(LeaderSuccession::JoinOrder),
            other => Err(ConfigError::UnknownSuccession(other.to_string())),
        }
    }
}

/// Policy object injected into every core service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Successor choice on leader removal
    pub leader_succession: LeaderSuccession,

    /// Maximum notifications returned by one inbox listing
    pub notification_page_size: usize,

    /// Attempts per operation before a serialization failure surfaces
    pub max_attempts: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            leader_succession: LeaderSuccession::LowestId,
            notification_page_size: 20,
            max_attempts: 3,
        }
    }
}

impl CoreConfig {
    /// Reads the policy from the environment, falling back to defaults
    ///
    /// # Errors
    ///
    /// Returns the first variable that is set but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let leader_succession = match lookup("LEADER_SUCCESSION") {
            Some(value) => value.parse()?,
            None => defaults.leader_succession,
        };

        let notification_page_size = match lookup("NOTIFICATION_PAGE_SIZE") {
            Some(value) => value
                .trim()
                .parse::<usize>()
                .map_err(|source| ConfigError::InvalidNumber {
                    var: "NOTIFICATION_PAGE_SIZE",
                    source,
                })?,
            None => defaults.notification_page_size,
        };

        let max_attempts = match lookup("STORE_MAX_ATTEMPTS") {
            Some(value) => value
                .trim()
                .parse::<u32>()
                .map_err(|source| ConfigError::InvalidNumber {
                    var: "STORE_MAX_ATTEMPTS",
                    source,
                })?,
            None => defaults.max_attempts,
        };

        if max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }

        Ok(Self {
            leader_succession,
            notification_page_size,
            max_attempts,
        })
    }
}
