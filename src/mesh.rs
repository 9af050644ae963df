//! Service mesh constants for Istio sidecar mode + Cilium
//!
//! Single source of truth for the selectors, identities and ports that the
//! policy builders bake into generated objects.

// =============================================================================
// Namespace enrollment
// =============================================================================

/// Namespace label that turns on Istio sidecar injection.
pub const INJECTION_LABEL: &str = "istio-injection";

/// Value for INJECTION_LABEL enabling sidecar injection.
pub const INJECTION_ENABLED: &str = "enabled";

// =============================================================================
// Protected workload
// =============================================================================

/// Label key selecting the protected workload.
pub const WORKLOAD_NAME_LABEL: &str = "app.kubernetes.io/name";

/// Label value selecting the protected workload.
pub const WORKLOAD_NAME: &str = "hello-nginx";

/// Container port the workload serves on.
pub const WORKLOAD_PORT: u16 = 8080;

// =============================================================================
// Ingress gateway
// =============================================================================

/// Namespace the Istio ingress gateway runs in.
pub const INGRESS_NAMESPACE: &str = "istio-system";

/// `app` label value of the ingress gateway pods.
pub const INGRESS_GATEWAY_APP: &str = "istio-ingressgateway";

/// SPIFFE principal of the ingress gateway service account.
pub const INGRESS_GATEWAY_PRINCIPAL: &str =
    "cluster.local/ns/istio-system/sa/istio-ingressgateway-service-account";

// =============================================================================
// Cluster DNS
// =============================================================================

/// Namespace the cluster DNS runs in.
pub const DNS_NAMESPACE: &str = "kube-system";

/// `k8s-app` label value of the cluster DNS pods.
pub const DNS_APP: &str = "kube-dns";

/// DNS port (UDP and TCP).
pub const DNS_PORT: u16 = 53;

// =============================================================================
// Cilium label keys
// =============================================================================

/// Cilium's pseudo-label for the pod namespace.
pub const CILIUM_POD_NAMESPACE_LABEL: &str = "k8s:io.kubernetes.pod.namespace";

/// Conventional `app` label key.
pub const APP_LABEL: &str = "app";

/// Label key used by cluster DNS pods.
pub const K8S_APP_LABEL: &str = "k8s-app";
