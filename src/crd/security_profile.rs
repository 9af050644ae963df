//! SecurityProfile Custom Resource Definition
//!
//! A SecurityProfile declares the security posture of one target namespace:
//! strict mTLS between workloads and a Cilium ingress/egress restriction for
//! the protected workload. Every field is optional and defaults to the fully
//! locked-down posture for `hello-nginx`.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{validate_dns_label, Condition, ProfilePhase};
use crate::DEFAULT_NAMESPACE;

/// Specification for a SecurityProfile
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "security.demo.cypher",
    version = "v1alpha1",
    kind = "SecurityProfile",
    plural = "securityprofiles",
    shortname = "secprof",
    status = "SecurityProfileStatus",
    namespaced,
    printcolumn = r#"{"name":"Target","type":"string","jsonPath":".spec.namespace"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SecurityProfileSpec {
    /// Namespace the policies are applied to
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Enforce STRICT mTLS and ingress-gateway-only access
    #[serde(default = "default_true")]
    pub istio_strict_mtls: bool,

    /// Restrict workload ingress to the gateway and egress to cluster DNS
    #[serde(default = "default_true")]
    pub cilium_restrict_ingress: bool,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for SecurityProfileSpec {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            istio_strict_mtls: true,
            cilium_restrict_ingress: true,
        }
    }
}

impl SecurityProfileSpec {
    /// Validate the profile before any cluster write
    pub fn validate(&self, profile: &str) -> Result<(), crate::Error> {
        validate_dns_label(&self.namespace).map_err(|reason| {
            crate::Error::validation_for(
                profile,
                format!("namespace '{}' {}", self.namespace, reason),
            )
        })
    }
}

/// Status for a SecurityProfile
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityProfileStatus {
    /// Current phase
    #[serde(default)]
    pub phase: ProfilePhase,

    /// Namespace the last reconciliation targeted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Policy kinds written by the last reconciliation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applied_kinds: Vec<String>,

    /// Human-readable message about current state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Generation of the spec the status describes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Conditions representing the profile state
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl SecurityProfileStatus {
    /// Set the phase and return self for chaining
    pub fn phase(mut self, phase: ProfilePhase) -> Self {
        self.phase = phase;
        self
    }

    /// Set the target namespace and return self for chaining
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the applied kinds and return self for chaining
    pub fn applied_kinds<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.applied_kinds = kinds.into_iter().map(Into::into).collect();
        self
    }

    /// Set the message and return self for chaining
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Set the observed generation and return self for chaining
    pub fn observed_generation(mut self, generation: Option<i64>) -> Self {
        self.observed_generation = generation;
        self
    }

    /// Add a condition and return self for chaining
    pub fn condition(mut self, condition: Condition) -> Self {
        // Remove existing condition of the same type
        self.conditions.retain(|c| c.type_ != condition.type_);
        self.conditions.push(condition);
        self
    }
}
