// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! nginx configuration derived from the authenticator spec and stored in a ConfigMap

use crate::config::Config;
use crate::constants::{proxy, secret_keys};
use crate::error::{AuthenticatorError, Result};
use crate::kubernetes::{is_owned_by, set_owner, Store};
use crate::steps::{managed_labels, requeue_on_conflict, Progress, Requeue};
use crate::types::BasicAuthenticator;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// Render the nginx server block for an authenticator
pub fn render_nginx_conf(auth: &BasicAuthenticator, config: &Config) -> Result<String> {
    let upstream = if auth.is_sidecar() {
        format!("127.0.0.1:{}", auth.spec.app_port)
    } else {
        if auth.spec.app_service.is_empty() {
            return Err(AuthenticatorError::InvalidSpec(format!(
                "{}: appService is required in standalone mode",
                auth.identity()
            )));
        }
        format!("{}:{}", auth.spec.app_service, auth.spec.app_port)
    };

    Ok(format!(
        r#"server {{
    listen {port};

    location / {{
        auth_basic "Restricted";
        auth_basic_user_file {secret_dir}/{htpasswd};

        proxy_pass http://{upstream};
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
    }}
}}
"#,
        port = auth.proxy_port(config.default_proxy_port),
        secret_dir = proxy::CREDENTIALS_MOUNT_PATH,
        htpasswd = secret_keys::HTPASSWD,
        upstream = upstream,
    ))
}

/// The ConfigMap this authenticator should have
pub fn desired_config_map(auth: &BasicAuthenticator, config: &Config) -> Result<ConfigMap> {
    let mut metadata = ObjectMeta {
        name: Some(auth.config_map_name()),
        namespace: Some(auth.require_namespace()?),
        labels: Some(managed_labels(auth)),
        ..Default::default()
    };
    set_owner(&mut metadata, auth)?;

    Ok(ConfigMap {
        metadata,
        data: Some(BTreeMap::from([(
            proxy::CONFIG_KEY.to_string(),
            render_nginx_conf(auth, config)?,
        )])),
        ..Default::default()
    })
}

/// Ensure the nginx ConfigMap exists and carries the derived configuration.
///
/// Continues with the ConfigMap name. Only `data` is compared, so an unchanged
/// configuration never causes a write.
#[instrument(skip(store, auth, config), fields(authenticator = %auth.identity()))]
pub async fn ensure_config_map<S: Store>(
    store: &S,
    auth: &BasicAuthenticator,
    config: &Config,
) -> Result<Progress<String>> {
    let namespace = auth.require_namespace()?;
    let desired = desired_config_map(auth, config)?;
    let name = auth.config_map_name();

    let Some(mut existing) = store.get::<ConfigMap>(&namespace, &name).await? else {
        if requeue_on_conflict(store.create(&desired).await)?.is_none() {
            return Ok(Progress::Requeue(Requeue::Conflict));
        }
        info!("Created nginx ConfigMap {}/{}", namespace, name);
        return Ok(Progress::Requeue(Requeue::Created { kind: "ConfigMap" }));
    };

    if !is_owned_by(&existing.metadata, auth) {
        return Err(AuthenticatorError::InvariantViolation(format!(
            "ConfigMap {}/{} exists but is not owned by {}",
            namespace,
            name,
            auth.identity()
        )));
    }

    if existing.data == desired.data {
        debug!("ConfigMap {}/{} is up to date", namespace, name);
        return Ok(Progress::Continue(name));
    }

    info!("ConfigMap {}/{} drifted, updating", namespace, name);
    existing.data = desired.data;
    if requeue_on_conflict(store.update(&existing).await)?.is_none() {
        return Ok(Progress::Requeue(Requeue::Conflict));
    }

    Ok(Progress::Continue(name))
}
