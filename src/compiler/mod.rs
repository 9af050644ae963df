//! Policy compilers
//!
//! Pure functions from a target namespace to the typed policy objects that
//! enforce it. Nothing here performs I/O or can fail; erasing the typed
//! output into [`PolicyObject`]s is the only fallible step.
//!
//! - [`mtls`]: PeerAuthentication + AuthorizationPolicy
//! - [`network`]: CiliumNetworkPolicy

pub mod mtls;
pub mod network;

use crate::policy::PolicyObject;
use crate::Result;

pub use mtls::MtlsPolicies;

/// Everything compiled for one desired state, in application order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompiledPolicies {
    /// mTLS policies (present when strict mTLS is enabled)
    pub mtls: Option<MtlsPolicies>,
    /// Network restriction (present when ingress restriction is enabled)
    pub network: Option<crate::policy::CiliumNetworkPolicy>,
}

impl CompiledPolicies {
    /// Compile the policy families enabled by the flags
    pub fn compile(namespace: &str, strict_mtls: bool, restrict_ingress: bool) -> Self {
        Self {
            mtls: strict_mtls.then(|| mtls::build(namespace)),
            network: restrict_ingress.then(|| network::build(namespace)),
        }
    }

    /// Total number of compiled objects
    pub fn total_count(&self) -> usize {
        self.mtls.as_ref().map_or(0, |_| 2) + usize::from(self.network.is_some())
    }

    /// Erase into synchronizer input.
    ///
    /// Order is fixed: PeerAuthentication, AuthorizationPolicy, CiliumNetworkPolicy.
    pub fn into_objects(self) -> Result<Vec<PolicyObject>> {
        let mut objects = Vec::with_capacity(self.total_count());
        if let Some(mtls) = self.mtls {
            objects.extend(mtls.into_objects()?);
        }
        if let Some(cnp) = self.network {
            objects.push(PolicyObject::from_typed(
                &cnp.metadata.namespace,
                &cnp.metadata.name,
                &cnp,
            )?);
        }
        Ok(objects)
    }
}
