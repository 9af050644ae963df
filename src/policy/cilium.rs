//! Cilium CiliumNetworkPolicy types
//!
//! L4 eBPF-enforced ingress/egress rules, with DNS-aware egress.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{HasApiResource, PolicyKind};
use crate::kube_utils::ObjectMeta;

/// Cilium Network Policy for L4 eBPF-based network enforcement
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CiliumNetworkPolicy {
    /// API version
    #[serde(default = "CiliumNetworkPolicy::api_version")]
    pub api_version: String,
    /// Kind
    #[serde(default = "CiliumNetworkPolicy::kind")]
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: CiliumNetworkPolicySpec,
}

impl HasApiResource for CiliumNetworkPolicy {
    const KIND: PolicyKind = PolicyKind::CiliumNetworkPolicy;
}

impl CiliumNetworkPolicy {
    fn api_version() -> String {
        <Self as HasApiResource>::KIND.api_version()
    }
    fn kind() -> String {
        <Self as HasApiResource>::KIND.kind_str().to_string()
    }

    /// Create a new CiliumNetworkPolicy
    pub fn new(metadata: ObjectMeta, spec: CiliumNetworkPolicySpec) -> Self {
        Self {
            api_version: Self::api_version(),
            kind: Self::kind(),
            metadata,
            spec,
        }
    }
}

/// CiliumNetworkPolicy spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CiliumNetworkPolicySpec {
    /// Endpoint selector (which pods this applies to)
    pub endpoint_selector: EndpointSelector,
    /// Ingress rules
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingress: Vec<CiliumIngressRule>,
    /// Egress rules
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub egress: Vec<CiliumEgressRule>,
}

/// Endpoint selector for CiliumNetworkPolicy
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSelector {
    /// Match labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
}

impl EndpointSelector {
    /// Selector from `(key, value)` label pairs
    pub fn from_labels<'a>(labels: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            match_labels: labels
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// Cilium ingress rule
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CiliumIngressRule {
    /// From endpoints
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub from_endpoints: Vec<EndpointSelector>,
    /// To ports
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to_ports: Vec<CiliumPortRule>,
}

/// Cilium egress rule
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CiliumEgressRule {
    /// To endpoints
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to_endpoints: Vec<EndpointSelector>,
    /// To ports
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to_ports: Vec<CiliumPortRule>,
}

/// Cilium port rule with optional L7 DNS rules
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CiliumPortRule {
    /// Ports
    pub ports: Vec<CiliumPort>,
    /// DNS rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<DnsRules>,
}

/// Cilium port specification
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CiliumPort {
    /// Port number (Cilium expects a string)
    pub port: String,
    /// Protocol
    pub protocol: Protocol,
}

impl CiliumPort {
    /// TCP port
    pub fn tcp(port: u16) -> Self {
        Self {
            port: port.to_string(),
            protocol: Protocol::Tcp,
        }
    }

    /// UDP port
    pub fn udp(port: u16) -> Self {
        Self {
            port: port.to_string(),
            protocol: Protocol::Udp,
        }
    }
}

/// L4 protocol
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    /// TCP
    Tcp,
    /// UDP
    Udp,
}

/// DNS rules for egress
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DnsRules {
    /// DNS match patterns
    pub dns: Vec<DnsMatch>,
}

/// DNS match pattern
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DnsMatch {
    /// Match pattern (e.g., "*" or "*.example.com")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_pattern: Option<String>,
}
