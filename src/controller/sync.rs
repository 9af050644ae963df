//! Create-or-patch synchronization of a single policy object
//!
//! [`ObjectSynchronizer::ensure_once`] makes one read-then-write attempt and
//! reports a lost race as [`Error::Conflict`]. [`ObjectSynchronizer::ensure`]
//! runs it under the configured conflict retry policy. Nothing here deletes.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::client::PolicyClient;
use crate::policy::PolicyObject;
use crate::retry::{retry_with_backoff_if, RetryConfig};
use crate::{Error, Result};

/// What a successful synchronization did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The object did not exist and was created
    Created,
    /// The object existed and was patched toward the desired body
    Applied,
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Applied => write!(f, "applied"),
        }
    }
}

/// Idempotent "make this object match its body" primitive
#[derive(Clone)]
pub struct ObjectSynchronizer {
    client: Arc<dyn PolicyClient>,
    retry: RetryConfig,
}

impl ObjectSynchronizer {
    /// Create a synchronizer with the given conflict retry policy
    pub fn new(client: Arc<dyn PolicyClient>, retry: RetryConfig) -> Self {
        Self { client, retry }
    }

    /// Single attempt: read, then create or patch.
    ///
    /// The patch carries the resourceVersion that was read, so a concurrent
    /// writer between the two calls surfaces as a conflict. An object deleted
    /// between the two calls is created instead.
    pub async fn ensure_once(&self, object: &PolicyObject) -> Result<SyncOutcome> {
        let live = self
            .client
            .get(object.kind, &object.namespace, &object.name)
            .await?;

        let Some(live) = live else {
            self.client.create(object).await?;
            return Ok(SyncOutcome::Created);
        };

        match self.client.patch(object, live.resource_version).await {
            Ok(()) => Ok(SyncOutcome::Applied),
            Err(e) if e.is_not_found() => {
                debug!(key = %object.key(), "object deleted before patch, creating");
                self.client.create(object).await?;
                Ok(SyncOutcome::Created)
            }
            Err(e) => Err(e),
        }
    }

    /// Synchronize `object`, retrying conflicts per the retry policy.
    ///
    /// Non-conflict errors are returned on first occurrence.
    #[instrument(
        skip(self, object),
        fields(kind = %object.kind, namespace = %object.namespace, name = %object.name)
    )]
    pub async fn ensure(&self, object: &PolicyObject) -> Result<SyncOutcome> {
        let operation = format!("ensure {}", object.key());
        let outcome = retry_with_backoff_if(&self.retry, &operation, Error::is_conflict, || {
            self.ensure_once(object)
        })
        .await?;

        match outcome {
            SyncOutcome::Created => info!(outcome = %outcome, "policy object synchronized"),
            SyncOutcome::Applied => debug!(outcome = %outcome, "policy object synchronized"),
        }
        Ok(outcome)
    }
}
