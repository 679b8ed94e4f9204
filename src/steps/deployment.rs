// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Standalone proxy deployment and the proxy container shared with sidecar injection

use crate::config::Config;
use crate::constants::proxy;
use crate::error::{AuthenticatorError, Result};
use crate::kubernetes::{is_owned_by, selector, set_owner, Store};
use crate::steps::{managed_labels, requeue_on_conflict, Progress, Requeue};
use crate::types::BasicAuthenticator;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, PodSpec, PodTemplateSpec,
    SecretVolumeSource, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

/// The nginx container, identical for standalone and sidecar mode
pub fn proxy_container(auth: &BasicAuthenticator, config: &Config) -> Container {
    Container {
        name: proxy::CONTAINER_NAME.to_string(),
        image: Some(config.nginx_image.clone()),
        ports: Some(vec![ContainerPort {
            name: Some(proxy::PORT_NAME.to_string()),
            container_port: auth.proxy_port(config.default_proxy_port),
            ..Default::default()
        }]),
        volume_mounts: Some(vec![
            VolumeMount {
                name: proxy::CONFIG_VOLUME.to_string(),
                mount_path: proxy::CONFIG_MOUNT_PATH.to_string(),
                read_only: Some(true),
                ..Default::default()
            },
            VolumeMount {
                name: proxy::CREDENTIALS_VOLUME.to_string(),
                mount_path: proxy::CREDENTIALS_MOUNT_PATH.to_string(),
                read_only: Some(true),
                ..Default::default()
            },
        ]),
        ..Default::default()
    }
}

/// Volumes exposing the nginx configuration and the credentials to the proxy
pub fn proxy_volumes(secret_name: &str, config_map_name: &str) -> Vec<Volume> {
    vec![
        Volume {
            name: proxy::CONFIG_VOLUME.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: config_map_name.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        },
        Volume {
            name: proxy::CREDENTIALS_VOLUME.to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(secret_name.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        },
    ]
}

/// The standalone Deployment this authenticator should have
pub fn desired_deployment(
    auth: &BasicAuthenticator,
    secret_name: &str,
    config_map_name: &str,
    replicas: i32,
    config: &Config,
) -> Result<Deployment> {
    let labels = managed_labels(auth);
    let mut metadata = ObjectMeta {
        name: Some(auth.deployment_name()),
        namespace: Some(auth.require_namespace()?),
        labels: Some(labels.clone()),
        ..Default::default()
    };
    set_owner(&mut metadata, auth)?;

    Ok(Deployment {
        metadata,
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
                    containers: vec![proxy_container(auth, config)],
                    volumes: Some(proxy_volumes(secret_name, config_map_name)),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    })
}

#[derive(Debug, PartialEq, Eq)]
struct ContainerShape {
    name: String,
    image: Option<String>,
    ports: Vec<i32>,
    mounts: Vec<(String, String, bool)>,
}

#[derive(Debug, PartialEq, Eq)]
struct VolumeShape {
    name: String,
    config_map: Option<String>,
    secret: Option<String>,
}

/// The fields of a Deployment the operator manages. Anything the API server
/// defaults (strategy, probes, pull policy, protocols...) is left out so it
/// never shows up as drift.
#[derive(Debug, PartialEq, Eq)]
struct DeploymentShape {
    replicas: i32,
    selector: BTreeMap<String, String>,
    template_labels: BTreeMap<String, String>,
    containers: Vec<ContainerShape>,
    volumes: Vec<VolumeShape>,
}

impl DeploymentShape {
    fn of(deployment: &Deployment) -> Self {
        let spec = deployment.spec.clone().unwrap_or_default();
        let pod = spec.template.spec.unwrap_or_default();

        let containers = pod
            .containers
            .into_iter()
            .map(|c| ContainerShape {
                name: c.name,
                image: c.image,
                ports: c
                    .ports
                    .unwrap_or_default()
                    .into_iter()
                    .map(|p| p.container_port)
                    .collect(),
                mounts: c
                    .volume_mounts
                    .unwrap_or_default()
                    .into_iter()
                    .map(|m| (m.name, m.mount_path, m.read_only.unwrap_or(false)))
                    .collect(),
            })
            .collect();

        let volumes = pod
            .volumes
            .unwrap_or_default()
            .into_iter()
            .map(|v| VolumeShape {
                name: v.name,
                config_map: v.config_map.map(|c| c.name),
                secret: v.secret.and_then(|s| s.secret_name),
            })
            .collect();

        DeploymentShape {
            replicas: spec.replicas.unwrap_or(1),
            selector: spec.selector.match_labels.unwrap_or_default(),
            template_labels: spec
                .template
                .metadata
                .and_then(|m| m.labels)
                .unwrap_or_default(),
            containers,
            volumes,
        }
    }
}

/// Replicas for the proxy: fixed, or following the selected workloads when adaptive
async fn desired_replicas<S: Store>(store: &S, auth: &BasicAuthenticator) -> Result<i32> {
    if !auth.spec.adaptive_scale || selector::is_empty(&auth.spec.selector) {
        return Ok(auth.spec.replicas);
    }

    let namespace = auth.require_namespace()?;
    let own_name = auth.deployment_name();
    let targets: Vec<Deployment> = store.list(&namespace, &auth.spec.selector).await?;
    let followed: Vec<i32> = targets
        .iter()
        .filter(|d| d.name_any() != own_name)
        .map(|d| d.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1))
        .collect();

    if followed.is_empty() {
        debug!("Adaptive scale selector matched nothing, using spec.replicas");
        return Ok(auth.spec.replicas);
    }
    match followed.iter().try_fold(0i32, |acc, r| acc.checked_add(*r)) {
        Some(total) => Ok(total),
        None => {
            warn!("Adaptive scale replica sum overflows, using spec.replicas");
            Ok(auth.spec.replicas)
        }
    }
}

/// Ensure the standalone proxy Deployment exists and matches the spec.
///
/// Continues with the observed number of ready replicas.
#[instrument(skip(store, auth, config), fields(authenticator = %auth.identity()))]
pub async fn ensure_deployment<S: Store>(
    store: &S,
    auth: &BasicAuthenticator,
    secret_name: &str,
    config_map_name: &str,
    config: &Config,
) -> Result<Progress<i32>> {
    let namespace = auth.require_namespace()?;
    let replicas = desired_replicas(store, auth).await?;
    let desired = desired_deployment(auth, secret_name, config_map_name, replicas, config)?;
    let name = auth.deployment_name();

    let Some(mut existing) = store.get::<Deployment>(&namespace, &name).await? else {
        if requeue_on_conflict(store.create(&desired).await)?.is_none() {
            return Ok(Progress::Requeue(Requeue::Conflict));
        }
        info!("Created proxy deployment {}/{}", namespace, name);
        return Ok(Progress::Requeue(Requeue::Created { kind: "Deployment" }));
    };

    if !is_owned_by(&existing.metadata, auth) {
        return Err(AuthenticatorError::InvariantViolation(format!(
            "Deployment {}/{} exists but is not owned by {}",
            namespace,
            name,
            auth.identity()
        )));
    }

    let ready = existing
        .status
        .as_ref()
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0);

    if DeploymentShape::of(&existing) == DeploymentShape::of(&desired) {
        debug!("Deployment {}/{} is up to date", namespace, name);
        return Ok(Progress::Continue(ready));
    }

    info!("Deployment {}/{} drifted, updating", namespace, name);
    existing.spec = desired.spec;
    if requeue_on_conflict(store.update(&existing).await)?.is_none() {
        return Ok(Progress::Requeue(Requeue::Conflict));
    }

    Ok(Progress::Continue(ready))
}
