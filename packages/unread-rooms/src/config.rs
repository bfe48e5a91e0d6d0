use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use std::env;

/// Default number of load/reduce/save attempts per publish.
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

/// Default tracing filter when neither `RUST_LOG` nor `UNREAD_LOG` is set.
pub const DEFAULT_LOG_FILTER: &str = "info,unread_rooms=debug";

/// Derivation host configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationConfig {
    /// Attempts to commit a reduced register before giving up on a room.
    pub max_conflict_retries: u32,
    pub log_filter: String,
}

impl Default for DerivationConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl DerivationConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let max_conflict_retries = match lookup("UNREAD_MAX_CONFLICT_RETRIES") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .context("UNREAD_MAX_CONFLICT_RETRIES must be a valid number")?,
            None => DEFAULT_MAX_CONFLICT_RETRIES,
        };
        if max_conflict_retries == 0 {
            bail!("UNREAD_MAX_CONFLICT_RETRIES must be at least 1");
        }

        Ok(Self {
            max_conflict_retries,
            log_filter: lookup("UNREAD_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        })
    }
}
