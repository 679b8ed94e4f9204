// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};

use crate::error::{AuthenticatorError, Result};

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[kube(
    group = "authenticator.snappcloud.io",
    version = "v1alpha1",
    kind = "BasicAuthenticator"
)]
#[kube(namespaced)]
#[kube(status = "BasicAuthenticatorStatus")]
#[kube(shortname = "ba")]
#[serde(rename_all = "camelCase")]
pub struct BasicAuthenticatorSpec {
    /// Whether the proxy runs as its own deployment or inside the target workloads
    #[serde(rename = "type", default)]
    pub mode: AuthenticatorMode,
    /// Name of the credentials secret; left empty to have one generated
    #[serde(default)]
    pub credentials_secret_ref: String,
    #[serde(default)]
    pub selector: LabelSelector,
    pub app_port: i32,
    #[serde(default)]
    pub app_service: String,
    #[serde(default = "default_replicas")]
    pub replicas: i32,
    #[serde(default)]
    pub adaptive_scale: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_port: Option<i32>,
}

fn default_replicas() -> i32 {
    1
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AuthenticatorMode {
    #[default]
    Standalone,
    Sidecar,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BasicAuthenticatorStatus {
    #[serde(default)]
    pub ready_replicas: i32,
}

impl BasicAuthenticator {
    pub fn is_sidecar(&self) -> bool {
        self.spec.mode == AuthenticatorMode::Sidecar
    }

    /// Whether a credentials secret has already been assigned
    pub fn has_credentials(&self) -> bool {
        !self.spec.credentials_secret_ref.is_empty()
    }

    /// Name of the secret generated when no credentials are referenced
    pub fn generated_secret_name(&self) -> String {
        format!("{}-credentials", self.name_any())
    }

    pub fn config_map_name(&self) -> String {
        format!("{}-nginx-conf", self.name_any())
    }

    pub fn deployment_name(&self) -> String {
        format!("{}-nginx", self.name_any())
    }

    /// Port nginx listens on, falling back to the operator default
    pub fn proxy_port(&self, default_port: i32) -> i32 {
        self.spec.proxy_port.unwrap_or(default_port)
    }

    pub fn ready_replicas(&self) -> i32 {
        self.status.as_ref().map_or(0, |s| s.ready_replicas)
    }

    /// `namespace/name`, used in logs and as the backoff key
    pub fn identity(&self) -> String {
        format!("{}/{}", self.namespace().unwrap_or_default(), self.name_any())
    }

    pub fn require_namespace(&self) -> Result<String> {
        self.namespace()
            .ok_or(AuthenticatorError::MissingObjectKey(".metadata.namespace"))
    }
}
