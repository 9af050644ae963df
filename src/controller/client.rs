//! Cluster access for the reconciler
//!
//! Three narrow traits cover everything the reconciler does against the API
//! server. The kube-rs implementation lives in [`KubeClientImpl`]; tests use
//! mockall doubles or an in-memory fake.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, DynamicObject, Patch, PatchParams, PostParams};
use kube::Client;

#[cfg(test)]
use mockall::automock;

use crate::crd::{SecurityProfile, SecurityProfileStatus};
use crate::policy::{ObjectKey, PolicyKind, PolicyObject};
use crate::Error;

/// A policy object as read back from the cluster
#[derive(Clone, Debug, PartialEq)]
pub struct LiveObject {
    /// Identity of the object
    pub key: ObjectKey,
    /// Server-assigned version used to pin the next write
    pub resource_version: Option<String>,
}

/// Labels of a namespace together with the version they were read at
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NamespaceLabels {
    /// Current label set
    pub labels: BTreeMap<String, String>,
    /// Server-assigned version used to pin the next write
    pub resource_version: Option<String>,
}

/// Read/create/patch access to managed policy objects
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PolicyClient: Send + Sync {
    /// Read an object by kind and name; `Ok(None)` when it does not exist
    async fn get(
        &self,
        kind: PolicyKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<LiveObject>, Error>;

    /// Create an object from its full body
    ///
    /// An object that already exists is reported as [`Error::Conflict`].
    async fn create(&self, object: &PolicyObject) -> Result<(), Error>;

    /// Merge-patch an object toward its body
    ///
    /// With a `resource_version` the write is rejected with
    /// [`Error::Conflict`] if the object changed since it was read.
    async fn patch(
        &self,
        object: &PolicyObject,
        resource_version: Option<String>,
    ) -> Result<(), Error>;
}

/// Label access on namespaces
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NamespaceClient: Send + Sync {
    /// Read the labels of a namespace
    ///
    /// A missing namespace is [`Error::NotFound`].
    async fn get_labels(&self, namespace: &str) -> Result<NamespaceLabels, Error>;

    /// Write the label set of a namespace, pinned to `resource_version`
    async fn patch_labels(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
        resource_version: Option<String>,
    ) -> Result<(), Error>;
}

/// Status subresource writes for SecurityProfile
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StatusWriter: Send + Sync {
    /// Patch the status of a SecurityProfile
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &SecurityProfileStatus,
    ) -> Result<(), Error>;
}

/// Real Kubernetes client implementation of all reconciler traits
pub struct KubeClientImpl {
    client: Client,
    field_manager: String,
    request_timeout: Duration,
}

impl KubeClientImpl {
    /// Create a new KubeClientImpl wrapping the given client
    pub fn new(client: Client, field_manager: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
            request_timeout,
        }
    }

    fn policy_api(&self, kind: PolicyKind, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &kind.api_resource())
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            dry_run: false,
            field_manager: Some(self.field_manager.clone()),
        }
    }

    fn merge_params(&self) -> PatchParams {
        PatchParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        }
    }

    /// Bound a kube call by the request timeout
    async fn timed<T, F>(&self, operation: &str, fut: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, kube::Error>>,
    {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(Error::timeout(
                operation,
                format!("no response within {:?}", self.request_timeout),
            )),
        }
    }
}

#[async_trait]
impl PolicyClient for KubeClientImpl {
    async fn get(
        &self,
        kind: PolicyKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<LiveObject>, Error> {
        let api = self.policy_api(kind, namespace);
        let live = self.timed("get", api.get_opt(name)).await?;

        Ok(live.map(|obj| LiveObject {
            key: ObjectKey::new(kind, namespace, name),
            resource_version: obj.metadata.resource_version,
        }))
    }

    async fn create(&self, object: &PolicyObject) -> Result<(), Error> {
        let api = self.policy_api(object.kind, &object.namespace);
        let dynamic: DynamicObject = serde_json::from_value(object.body.clone())
            .map_err(|e| Error::serialization_for_kind(object.kind.kind_str(), e.to_string()))?;

        self.timed("create", api.create(&self.post_params(), &dynamic))
            .await?;
        Ok(())
    }

    async fn patch(
        &self,
        object: &PolicyObject,
        resource_version: Option<String>,
    ) -> Result<(), Error> {
        let api = self.policy_api(object.kind, &object.namespace);
        let body = object.pinned_body(resource_version.as_deref());

        self.timed(
            "patch",
            api.patch(&object.name, &self.merge_params(), &Patch::Merge(&body)),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl NamespaceClient for KubeClientImpl {
    async fn get_labels(&self, namespace: &str) -> Result<NamespaceLabels, Error> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let ns = self.timed("get", api.get(namespace)).await?;

        Ok(NamespaceLabels {
            labels: ns.metadata.labels.unwrap_or_default(),
            resource_version: ns.metadata.resource_version,
        })
    }

    async fn patch_labels(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
        resource_version: Option<String>,
    ) -> Result<(), Error> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let mut metadata = serde_json::json!({ "labels": labels });
        if let Some(rv) = resource_version {
            metadata["resourceVersion"] = serde_json::Value::String(rv);
        }
        let patch = serde_json::json!({ "metadata": metadata });

        self.timed(
            "patch",
            api.patch(namespace, &self.merge_params(), &Patch::Merge(&patch)),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl StatusWriter for KubeClientImpl {
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &SecurityProfileStatus,
    ) -> Result<(), Error> {
        let api: Api<SecurityProfile> = Api::namespaced(self.client.clone(), namespace);

        let status_patch = serde_json::json!({
            "status": status
        });

        self.timed(
            "patch_status",
            api.patch_status(name, &self.merge_params(), &Patch::Merge(&status_patch)),
        )
        .await?;
        Ok(())
    }
}
