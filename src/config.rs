//! Repository configuration
//!
//! Only batch deletion is tunable. The batch size may be overridden through
//! `EQUIPGRAPH_DELETE_BATCH_SIZE`; every other setting comes from code.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Environment variable overriding [`DeletionConfig::batch_size`]
pub const DELETE_BATCH_SIZE_ENV: &str = "EQUIPGRAPH_DELETE_BATCH_SIZE";

/// Batch deletion settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionConfig {
    /// Instances soft-deleted per transaction (default: 25000)
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,

    /// Overall deadline in seconds, checked between batches (default: 300)
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,

    /// Retries of a conflicting batch before it is abandoned (default: 2)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Pause before each retry in milliseconds (default: 1000)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_batch_size() -> u64 {
    25_000
}

fn default_deadline_secs() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

impl Default for DeletionConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            deadline_secs: default_deadline_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl DeletionConfig {
    /// Defaults with the batch size taken from the environment when set
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with an injectable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup(DELETE_BATCH_SIZE_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(size) if size > 0 => config.batch_size = size,
                _ => warn!(
                    variable = DELETE_BATCH_SIZE_ENV,
                    value = %raw,
                    default = config.batch_size,
                    "ignoring invalid batch size"
                ),
            }
        }
        config
    }

    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline_secs = deadline.as_secs();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff_ms = backoff.as_millis() as u64;
        self
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}
