//! SecurityProfile operator - converges namespace security posture from a CRD
//!
//! A `SecurityProfile` names a target namespace and two switches. The operator
//! makes the cluster match:
//! - the namespace is enrolled in Istio sidecar injection
//! - strict mTLS: a PeerAuthentication plus an ingress-only AuthorizationPolicy
//! - ingress restriction: a CiliumNetworkPolicy limiting the workload to
//!   gateway ingress and DNS egress
//!
//! Every write is create-or-patch and repeatable; nothing is ever deleted.
//!
//! # Modules
//!
//! - [`crd`] - SecurityProfile Custom Resource Definition and status types
//! - [`policy`] - Istio and Cilium policy types and the managed kind table
//! - [`compiler`] - Pure policy builders
//! - [`controller`] - Synchronizer, labeler, and reconciliation
//! - [`retry`] - Bounded conflict retry with backoff
//! - [`config`] - Operator runtime configuration
//! - [`telemetry`] - Tracing subscriber setup
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod compiler;
pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod kube_utils;
pub mod mesh;
pub mod policy;
pub mod retry;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Default Configuration Constants
// =============================================================================

/// Field manager recorded on every write
pub const FIELD_MANAGER: &str = "security-profile-operator";

/// Namespace targeted when a SecurityProfile does not name one
pub const DEFAULT_NAMESPACE: &str = "hello-nginx";

/// Label key identifying the managing component on generated objects
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Value of [`LABEL_MANAGED_BY`] on objects written by this operator
pub const LABEL_MANAGED_BY_OPERATOR: &str = "security-profile-operator";
