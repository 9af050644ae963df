//! Ingress/egress restriction for the protected workload
//!
//! Ingress: only the Istio ingress gateway, on the workload port.
//! Egress: only cluster DNS, on port 53 (UDP and TCP), with a DNS rule so
//! Cilium's DNS proxy sees the queries.

use crate::kube_utils::ObjectMeta;
use crate::mesh;
use crate::policy::{
    CiliumEgressRule, CiliumIngressRule, CiliumNetworkPolicy, CiliumNetworkPolicySpec,
    CiliumPort, CiliumPortRule, DnsMatch, DnsRules, EndpointSelector,
};

/// Name of the workload restriction policy
pub const NETWORK_POLICY_NAME: &str = "hello-nginx-restrict";

/// Build the CiliumNetworkPolicy for `namespace`
pub fn build(namespace: &str) -> CiliumNetworkPolicy {
    let workload = EndpointSelector::from_labels([(mesh::WORKLOAD_NAME_LABEL, mesh::WORKLOAD_NAME)]);

    let ingress_gateway = EndpointSelector::from_labels([
        (mesh::CILIUM_POD_NAMESPACE_LABEL, mesh::INGRESS_NAMESPACE),
        (mesh::APP_LABEL, mesh::INGRESS_GATEWAY_APP),
    ]);

    let cluster_dns = EndpointSelector::from_labels([
        (mesh::CILIUM_POD_NAMESPACE_LABEL, mesh::DNS_NAMESPACE),
        (mesh::K8S_APP_LABEL, mesh::DNS_APP),
    ]);

    CiliumNetworkPolicy::new(
        ObjectMeta::new(NETWORK_POLICY_NAME, namespace),
        CiliumNetworkPolicySpec {
            endpoint_selector: workload,
            ingress: vec![CiliumIngressRule {
                from_endpoints: vec![ingress_gateway],
                to_ports: vec![CiliumPortRule {
                    ports: vec![CiliumPort::tcp(mesh::WORKLOAD_PORT)],
                    rules: None,
                }],
            }],
            egress: vec![CiliumEgressRule {
                to_endpoints: vec![cluster_dns],
                to_ports: vec![CiliumPortRule {
                    ports: vec![
                        CiliumPort::udp(mesh::DNS_PORT),
                        CiliumPort::tcp(mesh::DNS_PORT),
                    ],
                    rules: Some(DnsRules {
                        dns: vec![DnsMatch {
                            match_pattern: Some("*".to_string()),
                        }],
                    }),
                }],
            }],
        },
    )
}
