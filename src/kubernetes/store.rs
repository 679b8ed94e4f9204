// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Resource store abstraction consumed by the reconcile steps, and its Kubernetes implementation

use crate::constants::OPERATOR_NAME;
use crate::error::{AuthenticatorError, Result};
use crate::kubernetes::selector;
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::NamespaceResourceScope;
use kube::{
    api::{ListParams, PostParams},
    Api, Client, Resource, ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use tracing::{debug, instrument};

/// Namespaced object kinds the store can persist
pub trait StoreObject:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> StoreObject for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Point reads and version-conditioned writes against the cluster.
///
/// Absence on read is `Ok(None)`. Writes based on a stale `resourceVersion` fail with
/// [`AuthenticatorError::Conflict`], creates of existing objects with
/// [`AuthenticatorError::AlreadyExists`].
#[async_trait]
pub trait Store: Send + Sync {
    async fn get<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<Option<K>>;

    async fn list<K: StoreObject>(&self, namespace: &str, selector: &LabelSelector)
        -> Result<Vec<K>>;

    async fn create<K: StoreObject>(&self, obj: &K) -> Result<K>;

    async fn update<K: StoreObject>(&self, obj: &K) -> Result<K>;

    /// Write only the status subresource, leaving the spec untouched
    async fn update_status<K: StoreObject>(&self, obj: &K) -> Result<K>;
}

/// [`Store`] backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api_for<K: StoreObject>(&self, obj: &K) -> Result<(Api<K>, String)> {
        let namespace = obj
            .namespace()
            .ok_or(AuthenticatorError::MissingObjectKey(".metadata.namespace"))?;
        let name = obj
            .meta()
            .name
            .clone()
            .ok_or(AuthenticatorError::MissingObjectKey(".metadata.name"))?;
        Ok((Api::namespaced(self.client.clone(), &namespace), name))
    }
}

#[async_trait]
impl Store for KubeStore {
    #[instrument(skip(self), fields(kind = %K::kind(&())))]
    async fn get<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<Option<K>> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    #[instrument(skip(self, selector), fields(kind = %K::kind(&())))]
    async fn list<K: StoreObject>(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<K>> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let selector = selector::parse(selector)?;
        debug!("Listing with label selector '{}'", selector);
        let list = api.list(&ListParams::default().labels_from(&selector)).await?;
        Ok(list.items)
    }

    #[instrument(skip(self, obj), fields(kind = %K::kind(&()), name = %obj.name_any()))]
    async fn create<K: StoreObject>(&self, obj: &K) -> Result<K> {
        let (api, name) = self.api_for(obj)?;
        api.create(&post_params(), obj)
            .await
            .map_err(|e| classify::<K>(e, &name))
    }

    #[instrument(skip(self, obj), fields(kind = %K::kind(&()), name = %obj.name_any()))]
    async fn update<K: StoreObject>(&self, obj: &K) -> Result<K> {
        let (api, name) = self.api_for(obj)?;
        api.replace(&name, &post_params(), obj)
            .await
            .map_err(|e| classify::<K>(e, &name))
    }

    #[instrument(skip(self, obj), fields(kind = %K::kind(&()), name = %obj.name_any()))]
    async fn update_status<K: StoreObject>(&self, obj: &K) -> Result<K> {
        let (api, name) = self.api_for(obj)?;
        let data = serde_json::to_vec(obj)?;
        api.replace_status(&name, &post_params(), data)
            .await
            .map_err(|e| classify::<K>(e, &name))
    }
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(OPERATOR_NAME.to_string()),
        ..Default::default()
    }
}

/// Map API server write failures onto the operator's error taxonomy
fn classify<K: StoreObject>(err: kube::Error, name: &str) -> AuthenticatorError {
    let kind = K::kind(&()).to_string();
    let name = name.to_string();

    match err {
        kube::Error::Api(ref resp) if resp.code == 409 && resp.reason == "AlreadyExists" => {
            AuthenticatorError::AlreadyExists { kind, name }
        }
        kube::Error::Api(ref resp) if resp.code == 409 => {
            AuthenticatorError::Conflict { kind, name }
        }
        kube::Error::Api(ref resp) if resp.code == 404 => {
            AuthenticatorError::NotFound { kind, name }
        }
        other => AuthenticatorError::KubeError(other),
    }
}
