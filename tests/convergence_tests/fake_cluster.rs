//! In-memory API server for convergence tests
//!
//! Implements the reconciler's client traits over a map of objects with
//! server-assigned resource versions. Writes pinned to a stale version fail
//! with a conflict, exactly like the real API server. Failures and concurrent
//! writers can be injected per kind.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use security_profile_operator::controller::{
    Context, LiveObject, NamespaceClient, NamespaceLabels, PolicyClient, StatusWriter,
};
use security_profile_operator::crd::SecurityProfileStatus;
use security_profile_operator::policy::{ObjectKey, PolicyKind, PolicyObject};
use security_profile_operator::retry::RetryConfig;
use security_profile_operator::Error;

#[derive(Clone, Debug)]
struct StoredObject {
    resource_version: u64,
    body: Value,
}

#[derive(Clone, Debug)]
struct StoredNamespace {
    resource_version: u64,
    labels: BTreeMap<String, String>,
}

/// Write counters, for asserting on minimality
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteCounts {
    pub creates: usize,
    pub patches: usize,
    pub label_patches: usize,
    pub status_patches: usize,
}

impl WriteCounts {
    pub fn total(&self) -> usize {
        self.creates + self.patches + self.label_patches
    }
}

#[derive(Default)]
struct State {
    next_version: u64,
    objects: BTreeMap<ObjectKey, StoredObject>,
    namespaces: BTreeMap<String, StoredNamespace>,
    statuses: Vec<SecurityProfileStatus>,
    writes: WriteCounts,
    /// Reads of a kind that are followed by a competing write
    interference: HashMap<PolicyKind, u32>,
    /// Reads of a kind that are followed by another client deleting the object
    vanishing: HashMap<PolicyKind, u32>,
    /// Calls of a kind that fail outright
    failures: HashMap<PolicyKind, (u32, fn() -> Error)>,
}

impl State {
    fn bump(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }

    fn injected_failure(&mut self, kind: PolicyKind) -> Option<Error> {
        let entry = self.failures.get_mut(&kind)?;
        if entry.0 == 0 {
            return None;
        }
        entry.0 -= 1;
        Some((entry.1)())
    }
}

/// Shared fake cluster; clone the `Arc` into a [`Context`] via [`FakeCluster::context`]
#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<State>,
}

impl FakeCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Cluster with one existing namespace carrying `labels`
    pub fn with_namespace(namespace: &str, labels: &[(&str, &str)]) -> Arc<Self> {
        let cluster = Self::new();
        cluster.add_namespace(namespace, labels);
        cluster
    }

    pub fn add_namespace(&self, namespace: &str, labels: &[(&str, &str)]) {
        let mut state = self.state.lock().unwrap();
        let resource_version = state.bump();
        state.namespaces.insert(
            namespace.to_string(),
            StoredNamespace {
                resource_version,
                labels: labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            },
        );
    }

    /// Context wired to this cluster with a fast conflict retry policy
    pub fn context(self: &Arc<Self>, conflict_attempts: u32) -> Arc<Context> {
        Arc::new(Context::with_clients(
            self.clone(),
            self.clone(),
            self.clone(),
            RetryConfig::conflicts(conflict_attempts).with_initial_delay(Duration::from_millis(1)),
            Duration::from_secs(300),
        ))
    }

    /// The next `reads` reads of `kind` are each followed by another writer
    /// modifying the object, so the pinned patch that follows conflicts.
    pub fn interfere(&self, kind: PolicyKind, reads: u32) {
        self.state.lock().unwrap().interference.insert(kind, reads);
    }

    /// The next `reads` reads of `kind` are each followed by another client
    /// deleting the object, so the patch that follows finds nothing.
    pub fn vanish(&self, kind: PolicyKind, reads: u32) {
        self.state.lock().unwrap().vanishing.insert(kind, reads);
    }

    /// The next `calls` client calls for `kind` fail with `error()`
    pub fn fail(&self, kind: PolicyKind, calls: u32, error: fn() -> Error) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(kind, (calls, error));
    }

    /// Remove an object behind the operator's back
    pub fn delete(&self, kind: PolicyKind, namespace: &str, name: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .objects
            .remove(&ObjectKey::new(kind, namespace, name))
            .is_some()
    }

    pub fn object(&self, kind: PolicyKind, namespace: &str, name: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(&ObjectKey::new(kind, namespace, name))
            .map(|o| o.body.clone())
    }

    pub fn keys(&self) -> Vec<ObjectKey> {
        self.state.lock().unwrap().objects.keys().cloned().collect()
    }

    /// Object bodies without server-managed metadata
    pub fn snapshot(&self) -> BTreeMap<ObjectKey, Value> {
        self.state
            .lock()
            .unwrap()
            .objects
            .iter()
            .map(|(key, stored)| {
                let mut body = stored.body.clone();
                if let Some(meta) = body.get_mut("metadata").and_then(Value::as_object_mut) {
                    meta.remove("resourceVersion");
                }
                (key.clone(), body)
            })
            .collect()
    }

    pub fn labels(&self, namespace: &str) -> Option<BTreeMap<String, String>> {
        self.state
            .lock()
            .unwrap()
            .namespaces
            .get(namespace)
            .map(|ns| ns.labels.clone())
    }

    pub fn writes(&self) -> WriteCounts {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn last_status(&self) -> Option<SecurityProfileStatus> {
        self.state.lock().unwrap().statuses.last().cloned()
    }
}

/// RFC 7386 JSON merge patch
fn merge_patch(target: &mut Value, patch: &Value) {
    match patch {
        Value::Object(patch_map) => {
            if !target.is_object() {
                *target = Value::Object(Default::default());
            }
            if let Value::Object(target_map) = target {
                for (key, value) in patch_map {
                    if value.is_null() {
                        target_map.remove(key);
                    } else {
                        merge_patch(target_map.entry(key.clone()).or_insert(Value::Null), value);
                    }
                }
            }
        }
        other => *target = other.clone(),
    }
}

fn set_resource_version(body: &mut Value, version: u64) {
    if let Some(meta) = body.get_mut("metadata").and_then(Value::as_object_mut) {
        meta.insert(
            "resourceVersion".to_string(),
            Value::String(version.to_string()),
        );
    }
}

#[async_trait]
impl PolicyClient for FakeCluster {
    async fn get(
        &self,
        kind: PolicyKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<LiveObject>, Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.injected_failure(kind) {
            return Err(err);
        }

        let key = ObjectKey::new(kind, namespace, name);
        let live = state.objects.get(&key).map(|stored| LiveObject {
            key: key.clone(),
            resource_version: Some(stored.resource_version.to_string()),
        });

        // A competing writer lands between this read and the caller's write
        let interfere = match state.interference.get_mut(&kind) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        };
        if interfere && state.objects.contains_key(&key) {
            let version = state.bump();
            if let Some(stored) = state.objects.get_mut(&key) {
                stored.resource_version = version;
                set_resource_version(&mut stored.body, version);
            }
        }

        // Another client deletes the object before the caller's write
        let vanish = match state.vanishing.get_mut(&kind) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        };
        if vanish {
            state.objects.remove(&key);
        }

        Ok(live)
    }

    async fn create(&self, object: &PolicyObject) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.injected_failure(object.kind) {
            return Err(err);
        }

        let key = object.key();
        if state.objects.contains_key(&key) {
            return Err(Error::conflict(key.to_string(), "already exists"));
        }
        let version = state.bump();
        let mut body = object.body.clone();
        set_resource_version(&mut body, version);
        state.objects.insert(
            key,
            StoredObject {
                resource_version: version,
                body,
            },
        );
        state.writes.creates += 1;
        Ok(())
    }

    async fn patch(
        &self,
        object: &PolicyObject,
        resource_version: Option<String>,
    ) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.injected_failure(object.kind) {
            return Err(err);
        }

        let key = object.key();
        let current = state
            .objects
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::not_found(key.to_string()))?;

        if let Some(rv) = &resource_version {
            if *rv != current.resource_version.to_string() {
                return Err(Error::conflict(
                    key.to_string(),
                    "the object has been modified; please apply your changes to the latest version",
                ));
            }
        }

        let version = state.bump();
        let mut body = current.body;
        merge_patch(&mut body, &object.pinned_body(resource_version.as_deref()));
        set_resource_version(&mut body, version);
        state.objects.insert(
            key,
            StoredObject {
                resource_version: version,
                body,
            },
        );
        state.writes.patches += 1;
        Ok(())
    }
}

#[async_trait]
impl NamespaceClient for FakeCluster {
    async fn get_labels(&self, namespace: &str) -> Result<NamespaceLabels, Error> {
        let state = self.state.lock().unwrap();
        let ns = state
            .namespaces
            .get(namespace)
            .ok_or_else(|| Error::not_found(format!("namespaces/{namespace}")))?;
        Ok(NamespaceLabels {
            labels: ns.labels.clone(),
            resource_version: Some(ns.resource_version.to_string()),
        })
    }

    async fn patch_labels(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
        resource_version: Option<String>,
    ) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        let current_version = state
            .namespaces
            .get(namespace)
            .map(|ns| ns.resource_version)
            .ok_or_else(|| Error::not_found(format!("namespaces/{namespace}")))?;

        if let Some(rv) = resource_version {
            if rv != current_version.to_string() {
                return Err(Error::conflict(
                    format!("namespaces/{namespace}"),
                    "the object has been modified",
                ));
            }
        }

        let version = state.bump();
        if let Some(ns) = state.namespaces.get_mut(namespace) {
            ns.labels.extend(labels.clone());
            ns.resource_version = version;
        }
        state.writes.label_patches += 1;
        Ok(())
    }
}

#[async_trait]
impl StatusWriter for FakeCluster {
    async fn patch_status(
        &self,
        _namespace: &str,
        _name: &str,
        status: &SecurityProfileStatus,
    ) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.statuses.push(status.clone());
        state.writes.status_patches += 1;
        Ok(())
    }
}
