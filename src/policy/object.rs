//! Managed policy kinds and the generic object record the synchronizer works on
//!
//! [`PolicyKind`] is the closed set of kinds this operator writes. Its
//! group/version/plural mapping is a `match`, so adding a kind without a
//! mapping does not compile. [`PolicyObject`] is the kind-erased form of a
//! typed policy, addressed by its [`ObjectKey`].

use std::fmt;
use std::str::FromStr;

use kube::discovery::ApiResource;
use serde::Serialize;

use crate::kube_utils::build_api_resource;
use crate::Error;

/// Policy kinds managed by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PolicyKind {
    /// PeerAuthentication (security.istio.io)
    PeerAuthentication,
    /// AuthorizationPolicy (security.istio.io)
    AuthorizationPolicy,
    /// CiliumNetworkPolicy (cilium.io)
    CiliumNetworkPolicy,
}

/// All PolicyKind variants for iteration.
pub const ALL_POLICY_KINDS: &[PolicyKind] = &[
    PolicyKind::PeerAuthentication,
    PolicyKind::AuthorizationPolicy,
    PolicyKind::CiliumNetworkPolicy,
];

impl PolicyKind {
    /// API group
    pub fn group(&self) -> &'static str {
        match self {
            Self::PeerAuthentication | Self::AuthorizationPolicy => "security.istio.io",
            Self::CiliumNetworkPolicy => "cilium.io",
        }
    }

    /// API version within the group
    pub fn version(&self) -> &'static str {
        match self {
            Self::PeerAuthentication | Self::AuthorizationPolicy => "v1beta1",
            Self::CiliumNetworkPolicy => "v2",
        }
    }

    /// Kubernetes Kind string
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::PeerAuthentication => "PeerAuthentication",
            Self::AuthorizationPolicy => "AuthorizationPolicy",
            Self::CiliumNetworkPolicy => "CiliumNetworkPolicy",
        }
    }

    /// Plural resource name used in API paths
    pub fn plural(&self) -> &'static str {
        match self {
            Self::PeerAuthentication => "peerauthentications",
            Self::AuthorizationPolicy => "authorizationpolicies",
            Self::CiliumNetworkPolicy => "ciliumnetworkpolicies",
        }
    }

    /// Full apiVersion (`group/version`)
    pub fn api_version(&self) -> String {
        format!("{}/{}", self.group(), self.version())
    }

    /// ApiResource for dynamic API access
    pub fn api_resource(&self) -> ApiResource {
        build_api_resource(self.group(), self.version(), self.kind_str(), self.plural())
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind_str())
    }
}

impl FromStr for PolicyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_POLICY_KINDS
            .iter()
            .copied()
            .find(|kind| kind.kind_str() == s)
            .ok_or_else(|| Error::unmapped_kind(s))
    }
}

/// Types whose Kubernetes kind is fixed at compile time.
pub trait HasApiResource {
    /// The managed kind this type serializes as
    const KIND: PolicyKind;
}

/// Identity of a live object: `(group, version, plural, namespace, name)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    /// API group
    pub group: String,
    /// API version
    pub version: String,
    /// Plural resource name
    pub plural: String,
    /// Namespace
    pub namespace: String,
    /// Object name
    pub name: String,
}

impl ObjectKey {
    /// Key for an object of `kind` named `name` in `namespace`
    pub fn new(kind: PolicyKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: kind.group().to_string(),
            version: kind.version().to_string(),
            plural: kind.plural().to_string(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.group, self.version, self.plural, self.namespace, self.name
        )
    }
}

/// A desired policy object in kind-erased form.
///
/// `body` is the complete document (apiVersion, kind, metadata, spec) that is
/// sent on create and used as the merge patch on update.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyObject {
    /// Managed kind
    pub kind: PolicyKind,
    /// Target namespace
    pub namespace: String,
    /// Object name
    pub name: String,
    /// Full desired document
    pub body: serde_json::Value,
}

impl PolicyObject {
    /// Erase a typed policy into a `PolicyObject`.
    pub fn from_typed<T>(namespace: &str, name: &str, resource: &T) -> Result<Self, Error>
    where
        T: HasApiResource + Serialize,
    {
        let body = serde_json::to_value(resource)
            .map_err(|e| Error::serialization_for_kind(T::KIND.kind_str(), e.to_string()))?;
        Ok(Self {
            kind: T::KIND,
            namespace: namespace.to_string(),
            name: name.to_string(),
            body,
        })
    }

    /// Identity key of this object
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.kind, &self.namespace, &self.name)
    }

    /// Copy of the body pinned to a live resourceVersion.
    ///
    /// A merge patch carrying `metadata.resourceVersion` is rejected with 409
    /// if the object changed after it was read.
    pub fn pinned_body(&self, resource_version: Option<&str>) -> serde_json::Value {
        let mut body = self.body.clone();
        if let (Some(rv), Some(meta)) = (
            resource_version,
            body.get_mut("metadata").and_then(|m| m.as_object_mut()),
        ) {
            meta.insert(
                "resourceVersion".to_string(),
                serde_json::Value::String(rv.to_string()),
            );
        }
        body
    }
}
