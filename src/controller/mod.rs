//! Kubernetes controller for SecurityProfile resources
//!
//! - [`client`]: traits over the API server plus the kube-rs implementation
//! - [`sync`]: create-or-patch synchronizer for policy objects
//! - [`labeler`]: namespace label enforcement
//! - [`profile`]: convergence orchestration and the controller callbacks

pub mod client;
pub mod labeler;
pub mod profile;
pub mod sync;

pub use client::{
    KubeClientImpl, LiveObject, NamespaceClient, NamespaceLabels, PolicyClient, StatusWriter,
};
pub use labeler::{LabelOutcome, NamespaceLabelSpec, NamespaceLabeler};
pub use profile::{
    error_policy, reconcile, reconcile_desired, Context, DesiredState, ReconcileResult,
    ReconcileStatus,
};
pub use sync::{ObjectSynchronizer, SyncOutcome};
