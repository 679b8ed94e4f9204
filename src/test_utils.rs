// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: an HTTP-level mock for the kube client and an in-memory resource store.

use crate::error::{AuthenticatorError, Result};
use crate::kubernetes::selector;
use crate::kubernetes::{Store, StoreObject};
use crate::types::{AuthenticatorMode, BasicAuthenticator, BasicAuthenticatorSpec};
use async_trait::async_trait;
use http::{Request, Response};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStatus};
use k8s_openapi::api::core::v1::{Container, ContainerPort, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::ObjectMeta;
use kube::client::Body;
use kube::core::SelectorExt;
use kube::{Client, ResourceExt};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Add a response for GET requests matching the exact path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    /// Add a response for POST requests matching the exact path
    pub fn on_post(self, path: &str, status: u16, body: &str) -> Self {
        self.on("POST", path, status, body)
    }

    /// Add a response for PUT requests matching the exact path
    pub fn on_put(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PUT", path, status, body)
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses.lock().unwrap().insert(
            (method.to_string(), path.to_string()),
            (status, body.to_string()),
        );
        self
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let responses = self.responses.lock().unwrap();
        responses
            .get(&(method.to_string(), path.to_string()))
            .cloned()
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        let (status, body) = self
            .find_response(&method, &path)
            .unwrap_or_else(|| (404, status_json(404, "NotFound", "not found")));

        Box::pin(async move {
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

/// Create a `Status` failure body as returned by the API server
pub fn status_json(code: u16, reason: &str, message: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": code
    })
    .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Create,
    Update,
    UpdateStatus,
}

/// One write observed by the [`FakeStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Write {
    pub op: WriteOp,
    pub kind: String,
    pub name: String,
}

#[derive(Default)]
struct FakeState {
    objects: BTreeMap<(String, String, String), Value>,
    writes: Vec<Write>,
    next_version: u64,
    next_uid: u64,
    conflict_on_next_write: Option<String>,
}

impl FakeState {
    fn bump_version(&mut self, value: &mut Value) {
        self.next_version += 1;
        value["metadata"]["resourceVersion"] = Value::String(self.next_version.to_string());
    }

    fn assign_uid(&mut self, value: &mut Value) {
        if value["metadata"].get("uid").is_none() {
            self.next_uid += 1;
            value["metadata"]["uid"] = Value::String(format!("uid-{}", self.next_uid));
        }
    }

    fn take_injected_conflict(&mut self, kind: &str) -> bool {
        if self.conflict_on_next_write.as_deref() == Some(kind) {
            self.conflict_on_next_write = None;
            return true;
        }
        false
    }
}

/// In-memory [`Store`] with resource versions, status subresources and write accounting
#[derive(Clone, Default)]
pub struct FakeStore {
    state: Arc<Mutex<FakeState>>,
}

fn key_of<K: StoreObject>(obj: &K) -> (String, String, String) {
    (
        K::kind(&()).to_string(),
        obj.namespace().unwrap_or_default(),
        obj.name_any(),
    )
}

/// Fill in the defaults the API server would add to a stored Deployment
fn apply_deployment_defaults(value: Value) -> Value {
    let mut deployment: Deployment = serde_json::from_value(value).unwrap();
    if let Some(spec) = deployment.spec.as_mut() {
        spec.revision_history_limit.get_or_insert(10);
        spec.progress_deadline_seconds.get_or_insert(600);
        spec.strategy
            .get_or_insert_with(Default::default)
            .type_
            .get_or_insert_with(|| "RollingUpdate".to_string());
        if let Some(pod) = spec.template.spec.as_mut() {
            pod.restart_policy.get_or_insert_with(|| "Always".to_string());
            pod.dns_policy.get_or_insert_with(|| "ClusterFirst".to_string());
            pod.termination_grace_period_seconds.get_or_insert(30);
            for container in &mut pod.containers {
                container
                    .image_pull_policy
                    .get_or_insert_with(|| "IfNotPresent".to_string());
                container
                    .termination_message_path
                    .get_or_insert_with(|| "/dev/termination-log".to_string());
                for port in container.ports.iter_mut().flatten() {
                    port.protocol.get_or_insert_with(|| "TCP".to_string());
                }
            }
        }
    }
    serde_json::to_value(deployment).unwrap()
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put an object into the store without recording a write
    pub fn seed<K: StoreObject>(&self, obj: K) -> K {
        let mut state = self.state.lock().unwrap();
        let key = key_of(&obj);
        let mut value = serde_json::to_value(&obj).unwrap();
        state.assign_uid(&mut value);
        state.bump_version(&mut value);
        state.objects.insert(key, value.clone());
        serde_json::from_value(value).unwrap()
    }

    /// Read an object back, bypassing the store interface
    pub fn fetch<K: StoreObject>(&self, namespace: &str, name: &str) -> Option<K> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .get(&(K::kind(&()).to_string(), namespace.to_string(), name.to_string()))
            .map(|v| serde_json::from_value(v.clone()).unwrap())
    }

    /// Change an object as another actor would, without recording a write
    pub fn modify<K: StoreObject>(&self, namespace: &str, name: &str, f: impl FnOnce(&mut K)) {
        let mut obj: K = self.fetch(namespace, name).unwrap();
        f(&mut obj);
        let mut state = self.state.lock().unwrap();
        let mut value = serde_json::to_value(&obj).unwrap();
        state.bump_version(&mut value);
        state.objects.insert(key_of(&obj), value);
    }

    /// Simulate the deployment controller reporting readiness
    pub fn set_ready_replicas(&self, namespace: &str, name: &str, ready: i32) {
        self.modify::<Deployment>(namespace, name, |d| {
            d.status = Some(DeploymentStatus {
                ready_replicas: Some(ready),
                ..Default::default()
            });
        });
    }

    /// Make the next write of `kind` fail with a stale version
    pub fn conflict_on_next_write(&self, kind: &str) {
        self.state.lock().unwrap().conflict_on_next_write = Some(kind.to_string());
    }

    pub fn writes(&self) -> Vec<Write> {
        self.state.lock().unwrap().writes.clone()
    }

    /// Return and forget the writes recorded so far
    pub fn take_writes(&self) -> Vec<Write> {
        std::mem::take(&mut self.state.lock().unwrap().writes)
    }
}

#[async_trait]
impl Store for FakeStore {
    async fn get<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<Option<K>> {
        Ok(self.fetch(namespace, name))
    }

    async fn list<K: StoreObject>(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<K>> {
        let kind = K::kind(&()).to_string();
        let selector = selector::parse(selector)?;
        let state = self.state.lock().unwrap();
        let items = state
            .objects
            .iter()
            .filter(|((k, ns, _), _)| *k == kind && ns == namespace)
            .map(|(_, v)| serde_json::from_value::<K>(v.clone()).unwrap())
            .filter(|obj| selector.matches(obj.labels()))
            .collect();
        Ok(items)
    }

    async fn create<K: StoreObject>(&self, obj: &K) -> Result<K> {
        let key = key_of(obj);
        let mut state = self.state.lock().unwrap();
        if state.objects.contains_key(&key) {
            return Err(AuthenticatorError::AlreadyExists {
                kind: key.0,
                name: key.2,
            });
        }

        let mut value = serde_json::to_value(obj)?;
        if let Some(map) = value.as_object_mut() {
            map.remove("status");
        }
        if key.0 == "Deployment" {
            value = apply_deployment_defaults(value);
        }
        state.assign_uid(&mut value);
        state.bump_version(&mut value);
        state.objects.insert(key.clone(), value.clone());
        state.writes.push(Write {
            op: WriteOp::Create,
            kind: key.0,
            name: key.2,
        });
        Ok(serde_json::from_value(value)?)
    }

    async fn update<K: StoreObject>(&self, obj: &K) -> Result<K> {
        let key = key_of(obj);
        let mut state = self.state.lock().unwrap();
        let Some(stored) = state.objects.get(&key).cloned() else {
            return Err(AuthenticatorError::NotFound {
                kind: key.0,
                name: key.2,
            });
        };
        let stored_version = stored["metadata"]["resourceVersion"].as_str().map(String::from);
        if state.take_injected_conflict(&key.0)
            || (obj.meta().resource_version.is_some()
                && obj.meta().resource_version != stored_version)
        {
            return Err(AuthenticatorError::Conflict {
                kind: key.0,
                name: key.2,
            });
        }

        let mut value = serde_json::to_value(obj)?;
        match stored.get("status") {
            Some(status) => value["status"] = status.clone(),
            None => {
                if let Some(map) = value.as_object_mut() {
                    map.remove("status");
                }
            }
        }
        if key.0 == "Deployment" {
            value = apply_deployment_defaults(value);
        }
        state.bump_version(&mut value);
        state.objects.insert(key.clone(), value.clone());
        state.writes.push(Write {
            op: WriteOp::Update,
            kind: key.0,
            name: key.2,
        });
        Ok(serde_json::from_value(value)?)
    }

    async fn update_status<K: StoreObject>(&self, obj: &K) -> Result<K> {
        let key = key_of(obj);
        let mut state = self.state.lock().unwrap();
        let Some(mut stored) = state.objects.get(&key).cloned() else {
            return Err(AuthenticatorError::NotFound {
                kind: key.0,
                name: key.2,
            });
        };
        let stored_version = stored["metadata"]["resourceVersion"].as_str().map(String::from);
        if state.take_injected_conflict(&key.0) || obj.meta().resource_version != stored_version {
            return Err(AuthenticatorError::Conflict {
                kind: key.0,
                name: key.2,
            });
        }

        let value = serde_json::to_value(obj)?;
        stored["status"] = value.get("status").cloned().unwrap_or(Value::Null);
        state.bump_version(&mut stored);
        state.objects.insert(key.clone(), stored.clone());
        state.writes.push(Write {
            op: WriteOp::UpdateStatus,
            kind: key.0,
            name: key.2,
        });
        Ok(serde_json::from_value(stored)?)
    }
}

/// A BasicAuthenticator in namespace `apps` with the given mode and no credentials yet
pub fn authenticator(name: &str, mode: AuthenticatorMode) -> BasicAuthenticator {
    BasicAuthenticator {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("apps".to_string()),
            ..Default::default()
        },
        spec: BasicAuthenticatorSpec {
            mode,
            credentials_secret_ref: String::new(),
            selector: LabelSelector {
                match_labels: Some(BTreeMap::from([("app".to_string(), "web".to_string())])),
                match_expressions: None,
            },
            app_port: 8000,
            app_service: "web".to_string(),
            replicas: 3,
            adaptive_scale: false,
            proxy_port: None,
        },
        status: None,
    }
}

/// An application Deployment in namespace `apps`, owned by some other actor
pub fn app_deployment(name: &str, labels: &[(&str, &str)], replicas: i32) -> Deployment {
    let labels: BTreeMap<String, String> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("apps".to_string()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                match_expressions: None,
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: "app".to_string(),
                        image: Some("registry.local/web:1.0".to_string()),
                        ports: Some(vec![ContainerPort {
                            container_port: 8000,
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    }
}
