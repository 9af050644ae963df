//! Strict mTLS policies for a namespace
//!
//! Two objects:
//! - PeerAuthentication `default`: STRICT mTLS for every workload in the namespace
//! - AuthorizationPolicy `allow-from-ingress`: only the ingress gateway identity
//!   may call the protected workload, and only with `GET /`

use std::collections::BTreeMap;

use crate::kube_utils::ObjectMeta;
use crate::mesh;
use crate::policy::{
    AuthorizationOperation, AuthorizationPolicy, AuthorizationPolicySpec, AuthorizationRule,
    AuthorizationSource, MtlsConfig, MtlsMode, OperationSpec, PeerAuthentication,
    PeerAuthenticationSpec, PolicyObject, SourceSpec, WorkloadSelector,
};
use crate::Result;

/// Name of the namespace-wide PeerAuthentication
pub const PEER_AUTHENTICATION_NAME: &str = "default";

/// Name of the ingress AuthorizationPolicy
pub const AUTHORIZATION_POLICY_NAME: &str = "allow-from-ingress";

/// Output of the mTLS compiler
#[derive(Clone, Debug, PartialEq)]
pub struct MtlsPolicies {
    /// Namespace-wide strict mTLS
    pub peer_authentication: PeerAuthentication,
    /// Ingress-only access to the protected workload
    pub authorization_policy: AuthorizationPolicy,
}

impl MtlsPolicies {
    /// Erase into synchronizer input, PeerAuthentication first
    pub fn into_objects(self) -> Result<Vec<PolicyObject>> {
        let pa = &self.peer_authentication;
        let ap = &self.authorization_policy;
        Ok(vec![
            PolicyObject::from_typed(&pa.metadata.namespace, &pa.metadata.name, pa)?,
            PolicyObject::from_typed(&ap.metadata.namespace, &ap.metadata.name, ap)?,
        ])
    }
}

/// Build the mTLS policies for `namespace`
pub fn build(namespace: &str) -> MtlsPolicies {
    MtlsPolicies {
        peer_authentication: peer_authentication(namespace),
        authorization_policy: allow_from_ingress(namespace),
    }
}

fn peer_authentication(namespace: &str) -> PeerAuthentication {
    PeerAuthentication::new(
        ObjectMeta::new(PEER_AUTHENTICATION_NAME, namespace),
        PeerAuthenticationSpec {
            mtls: MtlsConfig {
                mode: MtlsMode::Strict,
            },
        },
    )
}

fn allow_from_ingress(namespace: &str) -> AuthorizationPolicy {
    let mut match_labels = BTreeMap::new();
    match_labels.insert(
        mesh::WORKLOAD_NAME_LABEL.to_string(),
        mesh::WORKLOAD_NAME.to_string(),
    );

    AuthorizationPolicy::new(
        ObjectMeta::new(AUTHORIZATION_POLICY_NAME, namespace),
        AuthorizationPolicySpec {
            selector: Some(WorkloadSelector { match_labels }),
            action: "ALLOW".to_string(),
            rules: vec![AuthorizationRule {
                from: vec![AuthorizationSource {
                    source: SourceSpec {
                        principals: vec![mesh::INGRESS_GATEWAY_PRINCIPAL.to_string()],
                    },
                }],
                to: vec![AuthorizationOperation {
                    operation: OperationSpec {
                        methods: vec!["GET".to_string()],
                        paths: vec!["/".to_string()],
                        ports: vec![],
                    },
                }],
            }],
        },
    )
}
