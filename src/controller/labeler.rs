//! Namespace label enforcement
//!
//! Ensures a single label on an existing namespace without disturbing its
//! other labels. Namespaces are never created here.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::client::NamespaceClient;
use crate::retry::{retry_with_backoff_if, RetryConfig};
use crate::{Error, Result};

/// A label that must be present on a namespace
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamespaceLabelSpec {
    /// Target namespace
    pub namespace: String,
    /// Label key
    pub key: String,
    /// Required label value
    pub value: String,
}

impl NamespaceLabelSpec {
    /// Sidecar injection label for `namespace`
    pub fn injection(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            key: crate::mesh::INJECTION_LABEL.to_string(),
            value: crate::mesh::INJECTION_ENABLED.to_string(),
        }
    }
}

/// What a successful label ensure did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelOutcome {
    /// The label already had the required value; nothing was written
    Unchanged,
    /// The label was added or its value replaced
    Updated,
}

impl fmt::Display for LabelOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unchanged => write!(f, "unchanged"),
            Self::Updated => write!(f, "updated"),
        }
    }
}

/// Idempotent label-ensure on namespaces
#[derive(Clone)]
pub struct NamespaceLabeler {
    client: Arc<dyn NamespaceClient>,
    retry: RetryConfig,
}

impl NamespaceLabeler {
    /// Create a labeler with the given conflict retry policy
    pub fn new(client: Arc<dyn NamespaceClient>, retry: RetryConfig) -> Self {
        Self { client, retry }
    }

    /// Single attempt: read the labels, write back only if the value differs
    pub async fn ensure_label_once(&self, spec: &NamespaceLabelSpec) -> Result<LabelOutcome> {
        let current = self.client.get_labels(&spec.namespace).await?;

        if current.labels.get(&spec.key) == Some(&spec.value) {
            return Ok(LabelOutcome::Unchanged);
        }

        let mut labels = current.labels;
        labels.insert(spec.key.clone(), spec.value.clone());
        self.client
            .patch_labels(&spec.namespace, &labels, current.resource_version)
            .await?;
        Ok(LabelOutcome::Updated)
    }

    /// Ensure the label, retrying conflicts per the retry policy
    #[instrument(
        skip(self, spec),
        fields(namespace = %spec.namespace, label = %spec.key)
    )]
    pub async fn ensure_label(&self, spec: &NamespaceLabelSpec) -> Result<LabelOutcome> {
        let operation = format!("label namespace {}", spec.namespace);
        let outcome = retry_with_backoff_if(&self.retry, &operation, Error::is_conflict, || {
            self.ensure_label_once(spec)
        })
        .await?;

        match outcome {
            LabelOutcome::Updated => info!(value = %spec.value, "namespace label set"),
            LabelOutcome::Unchanged => debug!("namespace label already present"),
        }
        Ok(outcome)
    }
}
