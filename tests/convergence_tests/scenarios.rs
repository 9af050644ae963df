//! Convergence stories against the in-memory cluster
//!
//! Each test walks the reconciler through a situation an operator of the
//! cluster would recognize: first rollout, steady state, a flag flipped off,
//! a lost write race, a policy deleted by hand.

use std::sync::Arc;

use kube::runtime::controller::Action;

use security_profile_operator::controller::{
    reconcile, reconcile_desired, DesiredState, LabelOutcome, SyncOutcome,
};
use security_profile_operator::crd::{ProfilePhase, SecurityProfile, SecurityProfileSpec};
use security_profile_operator::policy::{ObjectKey, PolicyKind};
use security_profile_operator::Error;

use super::fake_cluster::FakeCluster;

// =============================================================================
// Test Fixtures
// =============================================================================

fn shop(mtls: bool, restrict: bool) -> DesiredState {
    DesiredState {
        namespace: "shop".to_string(),
        enable_strict_mtls: mtls,
        enable_ingress_restriction: restrict,
    }
}

fn all_created() -> Vec<(PolicyKind, SyncOutcome)> {
    vec![
        (PolicyKind::PeerAuthentication, SyncOutcome::Created),
        (PolicyKind::AuthorizationPolicy, SyncOutcome::Created),
        (PolicyKind::CiliumNetworkPolicy, SyncOutcome::Created),
    ]
}

fn all_applied() -> Vec<(PolicyKind, SyncOutcome)> {
    vec![
        (PolicyKind::PeerAuthentication, SyncOutcome::Applied),
        (PolicyKind::AuthorizationPolicy, SyncOutcome::Applied),
        (PolicyKind::CiliumNetworkPolicy, SyncOutcome::Applied),
    ]
}

// =============================================================================
// First rollout
// =============================================================================

/// Story: Full profile on a fresh namespace
///
/// The namespace gets the injection label and all three policies are created
/// with the expected identities.
#[tokio::test]
async fn story_full_profile_on_fresh_namespace() {
    let cluster = FakeCluster::with_namespace("shop", &[]);
    let ctx = cluster.context(3);

    let result = reconcile_desired(&shop(true, true), &ctx).await;

    assert!(result.is_converged());
    assert_eq!(result.label, Some(LabelOutcome::Updated));
    assert_eq!(result.outcomes, all_created());
    assert_eq!(result.applied_kinds.len(), 3);

    let labels = cluster.labels("shop").unwrap();
    assert_eq!(
        labels.get("istio-injection").map(String::as_str),
        Some("enabled")
    );

    let pa = cluster
        .object(PolicyKind::PeerAuthentication, "shop", "default")
        .unwrap();
    assert_eq!(pa["spec"]["mtls"]["mode"], "STRICT");

    let ap = cluster
        .object(PolicyKind::AuthorizationPolicy, "shop", "allow-from-ingress")
        .unwrap();
    assert_eq!(ap["spec"]["action"], "ALLOW");

    let cnp = cluster
        .object(
            PolicyKind::CiliumNetworkPolicy,
            "shop",
            "hello-nginx-restrict",
        )
        .unwrap();
    assert_eq!(cnp["apiVersion"], "cilium.io/v2");
}

/// Story: Strict mTLS switched off only gets the network policy
#[tokio::test]
async fn story_without_mtls_only_network_policy() {
    let cluster = FakeCluster::with_namespace("shop", &[]);
    let ctx = cluster.context(3);

    let result = reconcile_desired(&shop(false, true), &ctx).await;

    assert!(result.is_converged());
    assert_eq!(
        result.outcomes,
        vec![(PolicyKind::CiliumNetworkPolicy, SyncOutcome::Created)]
    );
    assert_eq!(
        cluster.keys(),
        vec![ObjectKey::new(
            PolicyKind::CiliumNetworkPolicy,
            "shop",
            "hello-nginx-restrict"
        )]
    );
}

/// Story: Ingress restriction switched off only gets the mTLS policies
#[tokio::test]
async fn story_without_restriction_only_mtls_policies() {
    let cluster = FakeCluster::with_namespace("shop", &[]);
    let ctx = cluster.context(3);

    let result = reconcile_desired(&shop(true, false), &ctx).await;

    assert!(result.is_converged());
    let kinds: Vec<_> = result.outcomes.iter().map(|(k, _)| *k).collect();
    assert_eq!(
        kinds,
        vec![
            PolicyKind::PeerAuthentication,
            PolicyKind::AuthorizationPolicy
        ]
    );
    assert!(cluster
        .object(
            PolicyKind::CiliumNetworkPolicy,
            "shop",
            "hello-nginx-restrict"
        )
        .is_none());
}

/// Story: Every object lands at the key its spec addresses
#[tokio::test]
async fn story_live_keys_match_desired_keys() {
    let cluster = FakeCluster::with_namespace("shop", &[]);
    let ctx = cluster.context(3);

    reconcile_desired(&shop(true, true), &ctx).await;

    let mut expected = vec![
        ObjectKey::new(PolicyKind::PeerAuthentication, "shop", "default"),
        ObjectKey::new(PolicyKind::AuthorizationPolicy, "shop", "allow-from-ingress"),
        ObjectKey::new(
            PolicyKind::CiliumNetworkPolicy,
            "shop",
            "hello-nginx-restrict",
        ),
    ];
    expected.sort();
    assert_eq!(cluster.keys(), expected);
}

// =============================================================================
// Steady state
// =============================================================================

/// Story: A second pass changes nothing
///
/// Every object is patched in place (never recreated), the label is left
/// alone, and the stored documents are identical to the first pass.
#[tokio::test]
async fn story_second_pass_is_idempotent() {
    let cluster = FakeCluster::with_namespace("shop", &[]);
    let ctx = cluster.context(3);

    reconcile_desired(&shop(true, true), &ctx).await;
    let first = cluster.snapshot();
    let writes_after_first = cluster.writes();

    let result = reconcile_desired(&shop(true, true), &ctx).await;

    assert!(result.is_converged());
    assert_eq!(result.label, Some(LabelOutcome::Unchanged));
    assert_eq!(result.outcomes, all_applied());
    assert_eq!(result.created_count(), 0);
    assert_eq!(cluster.snapshot(), first);

    let writes = cluster.writes();
    assert_eq!(writes.creates, writes_after_first.creates);
    assert_eq!(writes.label_patches, writes_after_first.label_patches);
}

/// Story: A namespace that is already enrolled is never written
///
/// Its other labels stay exactly as they were.
#[tokio::test]
async fn story_enrolled_namespace_is_not_written() {
    let cluster = FakeCluster::with_namespace(
        "shop",
        &[("istio-injection", "enabled"), ("team", "payments")],
    );
    let ctx = cluster.context(3);

    let result = reconcile_desired(&shop(false, false), &ctx).await;

    assert_eq!(result.label, Some(LabelOutcome::Unchanged));
    assert_eq!(cluster.writes().total(), 0);
    assert_eq!(cluster.labels("shop").unwrap().len(), 2);
}

/// Story: Enrolling a namespace keeps its other labels
#[tokio::test]
async fn story_enrollment_preserves_other_labels() {
    let cluster = FakeCluster::with_namespace("shop", &[("team", "payments")]);
    let ctx = cluster.context(3);

    reconcile_desired(&shop(false, false), &ctx).await;

    let labels = cluster.labels("shop").unwrap();
    assert_eq!(labels.get("team").map(String::as_str), Some("payments"));
    assert_eq!(
        labels.get("istio-injection").map(String::as_str),
        Some("enabled")
    );
}

/// Story: Turning a flag off leaves existing policies in place
#[tokio::test]
async fn story_disabling_a_flag_deletes_nothing() {
    let cluster = FakeCluster::with_namespace("shop", &[]);
    let ctx = cluster.context(3);

    reconcile_desired(&shop(true, true), &ctx).await;
    let result = reconcile_desired(&shop(false, false), &ctx).await;

    assert!(result.is_converged());
    assert!(result.outcomes.is_empty());
    assert_eq!(cluster.keys().len(), 3);
}

// =============================================================================
// Drift and failure recovery
// =============================================================================

/// Story: A policy deleted by hand is recreated, and only that one
#[tokio::test]
async fn story_deleted_policy_is_recreated() {
    let cluster = FakeCluster::with_namespace("shop", &[]);
    let ctx = cluster.context(3);

    reconcile_desired(&shop(true, true), &ctx).await;
    assert!(cluster.delete(PolicyKind::AuthorizationPolicy, "shop", "allow-from-ingress"));

    let result = reconcile_desired(&shop(true, true), &ctx).await;

    assert!(result.is_converged());
    assert_eq!(
        result.outcomes,
        vec![
            (PolicyKind::PeerAuthentication, SyncOutcome::Applied),
            (PolicyKind::AuthorizationPolicy, SyncOutcome::Created),
            (PolicyKind::CiliumNetworkPolicy, SyncOutcome::Applied),
        ]
    );
    assert_eq!(cluster.keys().len(), 3);
}

/// Story: A policy deleted between read and patch is recreated in the same pass
///
/// The PeerAuthentication is read, then removed by someone else before the
/// patch lands. The pass creates it again instead of stopping.
#[tokio::test]
async fn story_policy_deleted_mid_write_is_recreated() {
    let cluster = FakeCluster::with_namespace("shop", &[]);
    let ctx = cluster.context(3);
    reconcile_desired(&shop(true, true), &ctx).await;
    let before = cluster.writes();

    cluster.vanish(PolicyKind::PeerAuthentication, 1);
    let result = reconcile_desired(&shop(true, true), &ctx).await;

    assert!(result.is_converged(), "{:?}", result.error());
    assert_eq!(
        result.outcomes,
        vec![
            (PolicyKind::PeerAuthentication, SyncOutcome::Created),
            (PolicyKind::AuthorizationPolicy, SyncOutcome::Applied),
            (PolicyKind::CiliumNetworkPolicy, SyncOutcome::Applied),
        ]
    );
    assert_eq!(cluster.writes().creates, before.creates + 1);
    let pa = cluster
        .object(PolicyKind::PeerAuthentication, "shop", "default")
        .unwrap();
    assert_eq!(pa["spec"]["mtls"]["mode"], "STRICT");
}

/// Story: A lost write race is retried and wins on the fresh read
#[tokio::test]
async fn story_single_conflict_is_absorbed() {
    let cluster = FakeCluster::with_namespace("shop", &[]);
    let ctx = cluster.context(3);
    reconcile_desired(&shop(true, true), &ctx).await;

    cluster.interfere(PolicyKind::PeerAuthentication, 1);
    let result = reconcile_desired(&shop(true, true), &ctx).await;

    assert!(result.is_converged());
    assert_eq!(result.outcomes, all_applied());
}

/// Story: Conflicts past the retry budget stop the pass, the next pass recovers
///
/// Another writer keeps modifying the PeerAuthentication. After the retry
/// budget is spent the pass stops with a conflict and the two later policies
/// are not attempted. Once the other writer goes quiet, the next pass
/// converges.
#[tokio::test]
async fn story_exhausted_conflicts_then_recovery() {
    let cluster = FakeCluster::with_namespace("shop", &[]);
    let ctx = cluster.context(3);

    // PeerAuthentication exists so the synchronizer takes the patch path
    reconcile_desired(&shop(true, false), &ctx).await;
    assert!(cluster.delete(PolicyKind::AuthorizationPolicy, "shop", "allow-from-ingress"));

    cluster.interfere(PolicyKind::PeerAuthentication, 3);
    let result = reconcile_desired(&shop(true, true), &ctx).await;

    assert!(!result.is_converged());
    assert!(result.error().unwrap().is_conflict());
    assert!(result.outcomes.is_empty());
    assert!(cluster
        .object(PolicyKind::AuthorizationPolicy, "shop", "allow-from-ingress")
        .is_none());
    assert!(cluster
        .object(
            PolicyKind::CiliumNetworkPolicy,
            "shop",
            "hello-nginx-restrict"
        )
        .is_none());

    let result = reconcile_desired(&shop(true, true), &ctx).await;

    assert!(result.is_converged());
    assert_eq!(
        result.outcomes,
        vec![
            (PolicyKind::PeerAuthentication, SyncOutcome::Applied),
            (PolicyKind::AuthorizationPolicy, SyncOutcome::Created),
            (PolicyKind::CiliumNetworkPolicy, SyncOutcome::Created),
        ]
    );
}

/// Story: A failure midway keeps what was written and resumes from there
#[tokio::test]
async fn story_midway_failure_resumes() {
    let cluster = FakeCluster::with_namespace("shop", &[]);
    let ctx = cluster.context(3);

    cluster.fail(PolicyKind::CiliumNetworkPolicy, 1, || {
        Error::transport("connection reset by peer")
    });
    let result = reconcile_desired(&shop(true, true), &ctx).await;

    assert!(matches!(result.error(), Some(Error::Transport { .. })));
    assert_eq!(result.applied_kinds.len(), 2);
    assert_eq!(cluster.keys().len(), 2);

    let result = reconcile_desired(&shop(true, true), &ctx).await;
    assert!(result.is_converged());
    assert_eq!(result.outcomes[2].1, SyncOutcome::Created);
}

/// Story: A timeout is surfaced, not retried in place
#[tokio::test]
async fn story_timeout_is_surfaced() {
    let cluster = FakeCluster::with_namespace("shop", &[]);
    let ctx = cluster.context(5);

    cluster.fail(PolicyKind::PeerAuthentication, 1, || {
        Error::timeout("get", "no response within 10s")
    });
    let result = reconcile_desired(&shop(true, true), &ctx).await;

    assert!(matches!(result.error(), Some(Error::Timeout { .. })));
    assert!(cluster.keys().is_empty());
}

/// Story: A missing target namespace is reported, and nothing is written
#[tokio::test]
async fn story_missing_namespace_writes_nothing() {
    let cluster = FakeCluster::new();
    let ctx = cluster.context(3);

    let result = reconcile_desired(&shop(true, true), &ctx).await;

    assert!(result.error().unwrap().is_not_found());
    assert!(result.label.is_none());
    assert_eq!(cluster.writes().total(), 0);
}

// =============================================================================
// Controller callback
// =============================================================================

/// Story: The controller callback converges a profile and records status
#[tokio::test]
async fn story_controller_records_converged_status() {
    let cluster = FakeCluster::with_namespace("shop", &[]);
    let ctx = cluster.context(3);

    let mut profile = SecurityProfile::new(
        "shop-profile",
        SecurityProfileSpec {
            namespace: "shop".to_string(),
            ..Default::default()
        },
    );
    profile.metadata.namespace = Some("default".to_string());
    profile.metadata.generation = Some(2);

    let action = reconcile(Arc::new(profile), ctx).await.unwrap();

    assert_eq!(action, Action::requeue(std::time::Duration::from_secs(300)));
    let status = cluster.last_status().unwrap();
    assert_eq!(status.phase, ProfilePhase::Converged);
    assert_eq!(status.namespace.as_deref(), Some("shop"));
    assert_eq!(status.observed_generation, Some(2));
    assert_eq!(status.applied_kinds.len(), 3);
}

/// Story: A forbidden write marks the profile Failed
#[tokio::test]
async fn story_forbidden_marks_profile_failed() {
    let cluster = FakeCluster::with_namespace("shop", &[]);
    let ctx = cluster.context(3);
    cluster.fail(PolicyKind::PeerAuthentication, 1, || {
        Error::forbidden("peerauthentications.security.istio.io is forbidden")
    });

    let mut profile = SecurityProfile::new(
        "shop-profile",
        SecurityProfileSpec {
            namespace: "shop".to_string(),
            ..Default::default()
        },
    );
    profile.metadata.namespace = Some("default".to_string());

    let err = reconcile(Arc::new(profile), ctx).await.unwrap_err();

    assert!(!err.is_retryable());
    assert_eq!(cluster.last_status().unwrap().phase, ProfilePhase::Failed);
}
