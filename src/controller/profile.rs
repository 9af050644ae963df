//! SecurityProfile reconciliation
//!
//! [`reconcile_desired`] is the convergence core: label the namespace, then
//! synchronize each enabled policy in a fixed order, stopping at the first
//! error. [`reconcile`] adapts it to `kube::runtime::Controller` and writes
//! the outcome to the profile's status.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tracing::{error, info, instrument, warn};

use super::client::{KubeClientImpl, NamespaceClient, PolicyClient, StatusWriter};
use super::labeler::{LabelOutcome, NamespaceLabelSpec, NamespaceLabeler};
use super::sync::{ObjectSynchronizer, SyncOutcome};
use crate::compiler::CompiledPolicies;
use crate::config::OperatorConfig;
use crate::crd::{
    Condition, ConditionStatus, ProfilePhase, SecurityProfile, SecurityProfileSpec,
    SecurityProfileStatus,
};
use crate::policy::PolicyKind;
use crate::retry::RetryConfig;
use crate::Error;

/// Requeue delay after an error worth retrying soon
pub const RETRYABLE_ERROR_REQUEUE: Duration = Duration::from_secs(5);

/// Requeue delay after an error that needs an operator or spec fix
pub const FATAL_ERROR_REQUEUE: Duration = Duration::from_secs(300);

/// Condition type reported on every status write
pub const READY_CONDITION: &str = "Ready";

/// What the cluster should look like for one profile
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DesiredState {
    /// Target namespace
    pub namespace: String,
    /// Apply PeerAuthentication and AuthorizationPolicy
    pub enable_strict_mtls: bool,
    /// Apply CiliumNetworkPolicy
    pub enable_ingress_restriction: bool,
}

impl From<&SecurityProfileSpec> for DesiredState {
    fn from(spec: &SecurityProfileSpec) -> Self {
        Self {
            namespace: spec.namespace.clone(),
            enable_strict_mtls: spec.istio_strict_mtls,
            enable_ingress_restriction: spec.cilium_restrict_ingress,
        }
    }
}

impl Default for DesiredState {
    fn default() -> Self {
        Self::from(&SecurityProfileSpec::default())
    }
}

/// Terminal state of one reconciliation pass
#[derive(Debug)]
pub enum ReconcileStatus {
    /// Every enabled object was synchronized
    Converged,
    /// Stopped at this error; later objects were not attempted
    PartiallyApplied(Error),
}

/// Everything one pass did, in order
#[derive(Debug)]
pub struct ReconcileResult {
    /// Target namespace
    pub namespace: String,
    /// Label step outcome (None if it failed)
    pub label: Option<LabelOutcome>,
    /// Per-object outcomes in application order
    pub outcomes: Vec<(PolicyKind, SyncOutcome)>,
    /// Kinds written successfully
    pub applied_kinds: BTreeSet<PolicyKind>,
    /// Converged or where it stopped
    pub status: ReconcileStatus,
}

impl ReconcileResult {
    fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            label: None,
            outcomes: Vec::new(),
            applied_kinds: BTreeSet::new(),
            status: ReconcileStatus::Converged,
        }
    }

    fn stop(mut self, error: Error) -> Self {
        self.status = ReconcileStatus::PartiallyApplied(error);
        self
    }

    /// True when every enabled object was synchronized
    pub fn is_converged(&self) -> bool {
        matches!(self.status, ReconcileStatus::Converged)
    }

    /// The error the pass stopped at, if any
    pub fn error(&self) -> Option<&Error> {
        match &self.status {
            ReconcileStatus::Converged => None,
            ReconcileStatus::PartiallyApplied(e) => Some(e),
        }
    }

    /// Number of objects that had to be created
    pub fn created_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == SyncOutcome::Created)
            .count()
    }

    /// Status document describing this pass
    ///
    /// Errors that retrying cannot fix put the profile in `Failed`.
    pub fn to_status(&self, observed_generation: Option<i64>) -> SecurityProfileStatus {
        let kinds = self.applied_kinds.iter().map(|k| k.kind_str());
        let base = SecurityProfileStatus::default()
            .namespace(&self.namespace)
            .applied_kinds(kinds)
            .observed_generation(observed_generation);

        match &self.status {
            ReconcileStatus::Converged => {
                let message = format!(
                    "{} policies applied to namespace {}",
                    self.applied_kinds.len(),
                    self.namespace
                );
                base.phase(ProfilePhase::Converged)
                    .message(&message)
                    .condition(Condition::new(
                        READY_CONDITION,
                        ConditionStatus::True,
                        "Converged",
                        message,
                    ))
            }
            ReconcileStatus::PartiallyApplied(err) => {
                let phase = if err.is_retryable() {
                    ProfilePhase::PartiallyApplied
                } else {
                    ProfilePhase::Failed
                };
                base.phase(phase)
                    .message(err.to_string())
                    .condition(Condition::new(
                        READY_CONDITION,
                        ConditionStatus::False,
                        err.reason(),
                        err.to_string(),
                    ))
            }
        }
    }
}

/// Controller context for SecurityProfile reconciliation
pub struct Context {
    /// Policy object access (trait object for testability)
    pub policies: Arc<dyn PolicyClient>,
    /// Namespace label access
    pub namespaces: Arc<dyn NamespaceClient>,
    /// SecurityProfile status writes
    pub status: Arc<dyn StatusWriter>,
    /// Conflict retry policy for every write
    pub retry: RetryConfig,
    /// Requeue interval for converged profiles
    pub requeue_interval: Duration,
}

impl Context {
    /// Create a context backed by the given Kubernetes client
    pub fn new(client: Client, config: &OperatorConfig) -> Self {
        let kube = Arc::new(KubeClientImpl::new(
            client,
            &config.field_manager,
            config.request_timeout,
        ));
        Self {
            policies: kube.clone(),
            namespaces: kube.clone(),
            status: kube,
            retry: config.retry_config(),
            requeue_interval: config.requeue_interval,
        }
    }

    /// Create a context from explicit client handles
    pub fn with_clients(
        policies: Arc<dyn PolicyClient>,
        namespaces: Arc<dyn NamespaceClient>,
        status: Arc<dyn StatusWriter>,
        retry: RetryConfig,
        requeue_interval: Duration,
    ) -> Self {
        Self {
            policies,
            namespaces,
            status,
            retry,
            requeue_interval,
        }
    }

    /// Synchronizer over this context's policy client
    pub fn synchronizer(&self) -> ObjectSynchronizer {
        ObjectSynchronizer::new(self.policies.clone(), self.retry.clone())
    }

    /// Labeler over this context's namespace client
    pub fn labeler(&self) -> NamespaceLabeler {
        NamespaceLabeler::new(self.namespaces.clone(), self.retry.clone())
    }
}

/// Converge the cluster toward `desired`.
///
/// Order: namespace label, PeerAuthentication, AuthorizationPolicy,
/// CiliumNetworkPolicy. The first error ends the pass; objects after it are
/// left for the next pass. Disabled policies are skipped, never deleted.
pub async fn reconcile_desired(desired: &DesiredState, ctx: &Context) -> ReconcileResult {
    let namespace = desired.namespace.as_str();
    let mut result = ReconcileResult::new(namespace);

    match ctx
        .labeler()
        .ensure_label(&NamespaceLabelSpec::injection(namespace))
        .await
    {
        Ok(outcome) => result.label = Some(outcome),
        Err(e) => {
            warn!(namespace = %namespace, error = %e, "namespace labeling failed, skipping policies");
            return result.stop(e);
        }
    }

    if !desired.enable_strict_mtls {
        info!(
            namespace = %namespace,
            "strict mTLS disabled; existing PeerAuthentication and AuthorizationPolicy are left in place"
        );
    }
    if !desired.enable_ingress_restriction {
        info!(
            namespace = %namespace,
            "ingress restriction disabled; existing CiliumNetworkPolicy is left in place"
        );
    }

    let objects = match CompiledPolicies::compile(
        namespace,
        desired.enable_strict_mtls,
        desired.enable_ingress_restriction,
    )
    .into_objects()
    {
        Ok(objects) => objects,
        Err(e) => return result.stop(e),
    };

    let sync = ctx.synchronizer();
    for object in &objects {
        match sync.ensure(object).await {
            Ok(outcome) => {
                result.outcomes.push((object.kind, outcome));
                result.applied_kinds.insert(object.kind);
            }
            Err(e) => {
                warn!(
                    namespace = %namespace,
                    kind = %object.kind,
                    name = %object.name,
                    error = %e,
                    "policy synchronization failed, stopping pass"
                );
                return result.stop(e);
            }
        }
    }

    result
}

/// Reconcile a SecurityProfile
///
/// Invalid specs are marked `Failed` and wait for a spec change. Otherwise
/// the pass result is written to status; a converged profile is requeued for
/// periodic drift repair and a partial pass is returned as an error so the
/// controller's error policy schedules the retry.
#[instrument(
    skip(profile, ctx),
    fields(profile = %profile.name_any(), namespace = %profile.spec.namespace)
)]
pub async fn reconcile(profile: Arc<SecurityProfile>, ctx: Arc<Context>) -> Result<Action, Error> {
    let name = profile.name_any();
    let profile_namespace = profile.namespace().ok_or_else(|| {
        Error::internal_with_context("reconcile", format!("SecurityProfile {name} has no namespace"))
    })?;
    let generation = profile.metadata.generation;

    if let Err(e) = profile.spec.validate(&name) {
        warn!(error = %e, "invalid SecurityProfile spec");
        let status = SecurityProfileStatus::default()
            .phase(ProfilePhase::Failed)
            .message(e.to_string())
            .observed_generation(generation)
            .condition(Condition::new(
                READY_CONDITION,
                ConditionStatus::False,
                e.reason(),
                e.to_string(),
            ));
        patch_status_if_changed(&ctx, &profile, &profile_namespace, &name, status).await?;
        return Ok(Action::await_change());
    }

    let desired = DesiredState::from(&profile.spec);
    let result = reconcile_desired(&desired, &ctx).await;
    let status = result.to_status(generation);
    let status_write =
        patch_status_if_changed(&ctx, &profile, &profile_namespace, &name, status).await;

    match result.status {
        ReconcileStatus::Converged => {
            status_write?;
            info!(
                applied = result.applied_kinds.len(),
                created = result.created_count(),
                "security profile converged"
            );
            Ok(Action::requeue(ctx.requeue_interval))
        }
        ReconcileStatus::PartiallyApplied(e) => {
            // The pass error decides the requeue; a failed status write is only logged
            if let Err(status_err) = status_write {
                warn!(error = %status_err, "failed to record partial pass in status");
            }
            Err(e)
        }
    }
}

/// Error policy: retryable errors come back quickly, fatal ones slowly
pub fn error_policy(profile: Arc<SecurityProfile>, error: &Error, _ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        profile = %profile.name_any(),
        "security profile reconciliation failed"
    );

    if error.is_retryable() {
        Action::requeue(RETRYABLE_ERROR_REQUEUE)
    } else {
        Action::requeue(FATAL_ERROR_REQUEUE)
    }
}

/// Write `status` unless the live status already says the same thing
async fn patch_status_if_changed(
    ctx: &Context,
    profile: &SecurityProfile,
    namespace: &str,
    name: &str,
    status: SecurityProfileStatus,
) -> Result<(), Error> {
    if let Some(current) = &profile.status {
        if is_status_current(current, &status) {
            return Ok(());
        }
    }
    ctx.status.patch_status(namespace, name, &status).await
}

/// Compare everything but condition timestamps
fn is_status_current(current: &SecurityProfileStatus, next: &SecurityProfileStatus) -> bool {
    let conditions_match = current.conditions.len() == next.conditions.len()
        && current.conditions.iter().zip(&next.conditions).all(|(a, b)| {
            a.type_ == b.type_ && a.status == b.status && a.reason == b.reason && a.message == b.message
        });

    conditions_match
        && current.phase == next.phase
        && current.namespace == next.namespace
        && current.applied_kinds == next.applied_kinds
        && current.message == next.message
        && current.observed_generation == next.observed_generation
}
