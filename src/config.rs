//! Operator runtime configuration
//!
//! Collected from CLI flags and environment in `main.rs`, validated once at
//! startup, then handed to the controller context.

use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryConfig;
use crate::telemetry::LogFormat;
use crate::{Error, FIELD_MANAGER};

/// Default attempts for conflicting writes
pub const DEFAULT_CONFLICT_RETRIES: u32 = 3;

/// Default delay before the first conflict retry
pub const DEFAULT_RETRY_INITIAL_DELAY: Duration = Duration::from_millis(100);

/// Default bound on a single API request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default interval between periodic reconciliations of a converged profile
pub const DEFAULT_REQUEUE_INTERVAL: Duration = Duration::from_secs(300);

/// Settings for one operator process
#[derive(Clone, Debug, PartialEq)]
pub struct OperatorConfig {
    /// Explicit kubeconfig; in-cluster config or the default kubeconfig otherwise
    pub kubeconfig: Option<PathBuf>,
    /// Field manager recorded on every write
    pub field_manager: String,
    /// Attempts for a conflicting write, including the first
    pub conflict_retries: u32,
    /// Delay before the first conflict retry
    pub retry_initial_delay: Duration,
    /// Bound on a single API request
    pub request_timeout: Duration,
    /// Interval between periodic reconciliations of a converged profile
    pub requeue_interval: Duration,
    /// Log output format
    pub log_format: LogFormat,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            field_manager: FIELD_MANAGER.to_string(),
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
            retry_initial_delay: DEFAULT_RETRY_INITIAL_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            requeue_interval: DEFAULT_REQUEUE_INTERVAL,
            log_format: LogFormat::default(),
        }
    }
}

impl OperatorConfig {
    /// Reject settings that would make the operator spin or hang
    pub fn validate(&self) -> Result<(), Error> {
        if self.field_manager.trim().is_empty() {
            return Err(Error::validation("field manager must not be empty"));
        }
        if self.conflict_retries == 0 {
            return Err(Error::validation(
                "conflict retries must be at least 1 (the first attempt counts)",
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::validation("request timeout must be greater than zero"));
        }
        if self.requeue_interval.is_zero() {
            return Err(Error::validation("requeue interval must be greater than zero"));
        }
        Ok(())
    }

    /// Conflict retry policy for the synchronizer and labeler
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::conflicts(self.conflict_retries).with_initial_delay(self.retry_initial_delay)
    }
}
