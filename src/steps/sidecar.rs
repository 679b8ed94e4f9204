// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Sidecar injection of the nginx proxy into workloads owned by someone else

use crate::config::Config;
use crate::constants::{annotations, proxy};
use crate::error::Result;
use crate::kubernetes::{selector, Store};
use crate::steps::deployment::{proxy_container, proxy_volumes};
use crate::steps::{requeue_on_conflict, Progress, Requeue};
use crate::types::BasicAuthenticator;
use k8s_openapi::api::apps::v1::Deployment;
use kube::ResourceExt;
use tracing::{debug, info, instrument, warn};

/// Whether the pod template already carries the proxy container
pub fn is_injected(deployment: &Deployment) -> bool {
    deployment
        .spec
        .as_ref()
        .and_then(|s| s.template.spec.as_ref())
        .is_some_and(|pod| pod.containers.iter().any(|c| c.name == proxy::CONTAINER_NAME))
}

/// Add the proxy container and its volumes to every workload that lacks them.
///
/// Returns only the workloads that were changed. Containers, volumes and
/// annotations that are already present are left untouched.
pub fn inject(
    auth: &BasicAuthenticator,
    workloads: &[Deployment],
    secret_name: &str,
    config_map_name: &str,
    config: &Config,
) -> Vec<Deployment> {
    let injector = auth.identity();

    workloads
        .iter()
        .filter(|w| {
            if is_injected(w) {
                let owner = w.annotations().get(annotations::INJECTED_BY);
                if owner.is_some_and(|o| *o != injector) {
                    warn!(
                        "{}/{} already carries a proxy injected by {}, leaving it alone",
                        w.namespace().unwrap_or_default(),
                        w.name_any(),
                        owner.map(String::as_str).unwrap_or_default()
                    );
                }
                return false;
            }
            true
        })
        .filter_map(|w| {
            let mut w = w.clone();
            let pod = w.spec.as_mut()?.template.spec.get_or_insert_with(Default::default);

            pod.containers.push(proxy_container(auth, config));

            let volumes = pod.volumes.get_or_insert_with(Vec::new);
            for volume in proxy_volumes(secret_name, config_map_name) {
                if !volumes.iter().any(|v| v.name == volume.name) {
                    volumes.push(volume);
                }
            }

            w.annotations_mut()
                .insert(annotations::INJECTED_BY.to_string(), injector.clone());
            Some(w)
        })
        .collect()
}

/// Inject the proxy into every Deployment matched by the selector.
///
/// Continues with the summed ready replicas of the matched workloads this
/// authenticator proxies.
#[instrument(skip(store, auth, config), fields(authenticator = %auth.identity()))]
pub async fn ensure_sidecars<S: Store>(
    store: &S,
    auth: &BasicAuthenticator,
    secret_name: &str,
    config_map_name: &str,
    config: &Config,
) -> Result<Progress<i32>> {
    if selector::is_empty(&auth.spec.selector) {
        warn!("Sidecar mode without a selector matches no workloads");
        return Ok(Progress::Continue(0));
    }

    let namespace = auth.require_namespace()?;
    let targets: Vec<Deployment> = store.list(&namespace, &auth.spec.selector).await?;
    debug!("Selector matched {} deployments", targets.len());

    let injector = auth.identity();
    let mutated = inject(auth, &targets, secret_name, config_map_name, config);

    // Only workloads proxied by this authenticator count towards its readiness
    let ready = targets
        .iter()
        .filter(|d| {
            d.annotations().get(annotations::INJECTED_BY) == Some(&injector)
                || mutated.iter().any(|m| m.name_any() == d.name_any())
        })
        .filter_map(|d| d.status.as_ref().and_then(|s| s.ready_replicas))
        .fold(0i32, i32::saturating_add);

    let mut conflicted = false;
    for workload in mutated {
        match requeue_on_conflict(store.update(&workload).await)? {
            Some(_) => info!(
                "Injected proxy sidecar into {}/{}",
                namespace,
                workload.name_any()
            ),
            None => conflicted = true,
        }
    }

    if conflicted {
        return Ok(Progress::Requeue(Requeue::Conflict));
    }
    Ok(Progress::Continue(ready))
}
