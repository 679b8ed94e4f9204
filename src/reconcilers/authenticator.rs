// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! BasicAuthenticator reconciler - drives credentials, nginx config and the proxy workload.

use crate::config::Config;
use crate::constants::requeue::{CREATE_REQUEUE_SECS, RESYNC_INTERVAL_SECS};
use crate::error::{AuthenticatorError, Result};
use crate::kubernetes::{KubeStore, Store};
use crate::reconcilers::backoff::Backoff;
use crate::steps::{self, Progress, Requeue};
use crate::types::BasicAuthenticator;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::{
    runtime::{controller::Action, Controller},
    Api, Client, Resource, ResourceExt,
};
use kube_runtime::watcher::Config as WatcherConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Shared state handed to every reconcile
pub struct Context<S> {
    pub store: S,
    pub config: Config,
    pub backoff: Backoff,
}

impl<S: Store> Context<S> {
    pub fn new(store: S, config: Config) -> Self {
        let backoff = Backoff::new(config.backoff_base, config.backoff_max);
        Self {
            store,
            config,
            backoff,
        }
    }
}

/// Where a single reconcile pass ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The authenticator no longer exists
    Deleted,
    /// Every step converged
    Done { ready_replicas: i32 },
    /// A step stopped the pass early
    Requeue(Requeue),
}

macro_rules! step {
    ($progress:expr) => {
        match $progress? {
            Progress::Continue(value) => value,
            Progress::Requeue(reason) => {
                debug!("Pass stopped: {:?}", reason);
                return Ok(Outcome::Requeue(reason));
            }
        }
    };
}

/// Run one pass of Fetch → EnsureCredential → EnsureConfig → EnsureWorkload → ReportStatus.
///
/// Every pass starts over from live state; there is no persisted step pointer.
#[instrument(skip(ctx))]
pub async fn reconcile_once<S: Store>(
    ctx: &Context<S>,
    namespace: &str,
    name: &str,
) -> Result<Outcome> {
    let store = &ctx.store;
    let config = &ctx.config;

    let Some(auth) = store.get::<BasicAuthenticator>(namespace, name).await? else {
        info!("BasicAuthenticator {}/{} not found, assuming it was deleted", namespace, name);
        return Ok(Outcome::Deleted);
    };

    let secret_name = step!(steps::ensure_credentials(store, &auth).await);
    let config_map_name = step!(steps::ensure_config_map(store, &auth, config).await);

    let ready_replicas = if auth.is_sidecar() {
        step!(steps::ensure_sidecars(store, &auth, &secret_name, &config_map_name, config).await)
    } else {
        step!(steps::ensure_deployment(store, &auth, &secret_name, &config_map_name, config).await)
    };

    step!(steps::report_status(store, &auth, ready_replicas).await);

    Ok(Outcome::Done { ready_replicas })
}

/// Translate a pass outcome into the next scheduling decision
fn next_action<S: Store>(ctx: &Context<S>, key: &str, outcome: &Outcome) -> Action {
    match outcome {
        Outcome::Deleted => {
            ctx.backoff.reset(key);
            Action::await_change()
        }
        Outcome::Done { .. } => {
            ctx.backoff.reset(key);
            Action::requeue(Duration::from_secs(RESYNC_INTERVAL_SECS))
        }
        Outcome::Requeue(reason) if reason.is_expected() => {
            Action::requeue(Duration::from_secs(CREATE_REQUEUE_SECS))
        }
        Outcome::Requeue(reason) => {
            let delay = ctx.backoff.next_delay(key);
            warn!("{}: retrying in {:?} ({:?})", key, delay, reason);
            Action::requeue(delay)
        }
    }
}

async fn reconcile<S: Store>(
    auth: Arc<BasicAuthenticator>,
    ctx: Arc<Context<S>>,
) -> Result<Action> {
    let namespace = auth.require_namespace()?;
    let name = auth.name_any();
    let key = auth.identity();

    let outcome = reconcile_once(&ctx, &namespace, &name).await?;
    debug!("Reconciled {}: {:?}", key, outcome);

    Ok(next_action(&ctx, &key, &outcome))
}

fn error_policy<S: Store>(
    auth: Arc<BasicAuthenticator>,
    error: &AuthenticatorError,
    ctx: Arc<Context<S>>,
) -> Action {
    let key = auth.identity();
    let delay = ctx.backoff.next_delay(&key);

    match error {
        AuthenticatorError::InvariantViolation(_) => error!(
            "Reconciliation of {} needs manual intervention: {}, retrying in {:?}",
            key, error, delay
        ),
        _ => error!(
            "Reconciliation error for {}: {}, retrying in {:?}",
            key, error, delay
        ),
    }

    Action::requeue(delay)
}

fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<DynamicType = (), Scope = k8s_openapi::NamespaceResourceScope>,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

pub struct AuthenticatorReconciler {
    client: Client,
    config: Config,
}

impl AuthenticatorReconciler {
    pub fn new(client: Client, config: Config) -> Self {
        Self { client, config }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let namespace = self.config.watch_namespace.clone();
        let scope = namespace.as_deref();

        let authenticators: Api<BasicAuthenticator> = scoped_api(&self.client, scope);
        let secrets: Api<Secret> = scoped_api(&self.client, scope);
        let config_maps: Api<ConfigMap> = scoped_api(&self.client, scope);
        let deployments: Api<Deployment> = scoped_api(&self.client, scope);

        let context = Arc::new(Context::new(KubeStore::new(self.client), self.config));

        Controller::new(authenticators, WatcherConfig::default())
            .owns(secrets, WatcherConfig::default())
            .owns(config_maps, WatcherConfig::default())
            .owns(deployments, WatcherConfig::default())
            .shutdown_on_signal()
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled authenticator: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}
