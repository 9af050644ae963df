//! Policy type definitions
//!
//! Types for generating:
//! - Istio PeerAuthentication (namespace mTLS mode)
//! - Istio AuthorizationPolicy (L7 identity-based access control)
//! - Cilium CiliumNetworkPolicy (L4 eBPF-based network enforcement)
//!
//! Each typed policy implements [`HasApiResource`], and is erased into a
//! [`PolicyObject`] before it reaches the synchronizer.

mod cilium;
mod istio;
mod object;

pub use cilium::{
    CiliumEgressRule, CiliumIngressRule, CiliumNetworkPolicy, CiliumNetworkPolicySpec,
    CiliumPort, CiliumPortRule, DnsMatch, DnsRules, EndpointSelector, Protocol,
};
pub use istio::{
    AuthorizationOperation, AuthorizationPolicy, AuthorizationPolicySpec, AuthorizationRule,
    AuthorizationSource, MtlsConfig, MtlsMode, OperationSpec, PeerAuthentication,
    PeerAuthenticationSpec, SourceSpec, WorkloadSelector,
};
pub use object::{HasApiResource, ObjectKey, PolicyKind, PolicyObject, ALL_POLICY_KINDS};
