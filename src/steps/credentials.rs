// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Credential provisioning: make sure the authenticator references an existing secret

use crate::constants::secret_keys;
use crate::error::{AuthenticatorError, Result};
use crate::kubernetes::{is_owned_by, set_owner, Store};
use crate::steps::{managed_labels, requeue_on_conflict, Progress, Requeue};
use crate::types::BasicAuthenticator;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

const USERNAME_SUFFIX_LEN: usize = 8;
const PASSWORD_LEN: usize = 32;

/// Freshly generated basic-auth credentials
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn generate() -> Self {
        let suffix: String = random_alphanumeric(USERNAME_SUFFIX_LEN).to_lowercase();
        Self {
            username: format!("user-{}", suffix),
            password: random_alphanumeric(PASSWORD_LEN),
        }
    }

    /// One line of a password file in the format nginx reads
    pub fn htpasswd_line(&self) -> String {
        format!("{}:{{PLAIN}}{}", self.username, self.password)
    }
}

fn random_alphanumeric(len: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Build the owned secret holding generated credentials
pub fn credentials_secret(
    auth: &BasicAuthenticator,
    name: &str,
    credentials: &Credentials,
) -> Result<Secret> {
    let mut metadata = ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(auth.require_namespace()?),
        labels: Some(managed_labels(auth)),
        ..Default::default()
    };
    set_owner(&mut metadata, auth)?;

    let data = BTreeMap::from([
        (
            secret_keys::USERNAME.to_string(),
            ByteString(credentials.username.clone().into_bytes()),
        ),
        (
            secret_keys::PASSWORD.to_string(),
            ByteString(credentials.password.clone().into_bytes()),
        ),
        (
            secret_keys::HTPASSWD.to_string(),
            ByteString(credentials.htpasswd_line().into_bytes()),
        ),
    ]);

    Ok(Secret {
        metadata,
        data: Some(data),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    })
}

/// Ensure a credentials secret exists and is referenced by the authenticator.
///
/// Continues with the secret name once the reference points at a visible secret.
/// A set reference is never changed and its secret never regenerated.
#[instrument(skip(store, auth), fields(authenticator = %auth.identity()))]
pub async fn ensure_credentials<S: Store>(
    store: &S,
    auth: &BasicAuthenticator,
) -> Result<Progress<String>> {
    let namespace = auth.require_namespace()?;

    if auth.has_credentials() {
        let name = &auth.spec.credentials_secret_ref;
        return match store.get::<Secret>(&namespace, name).await? {
            Some(secret) => {
                let has_htpasswd = secret
                    .data
                    .as_ref()
                    .is_some_and(|d| d.contains_key(secret_keys::HTPASSWD));
                if !has_htpasswd {
                    warn!(
                        "Secret {}/{} has no '{}' key, the proxy will reject every request",
                        namespace,
                        name,
                        secret_keys::HTPASSWD
                    );
                }
                debug!("Using credentials secret {}/{}", namespace, name);
                Ok(Progress::Continue(name.clone()))
            }
            None => {
                warn!(
                    "Referenced credentials secret {}/{} does not exist yet",
                    namespace, name
                );
                Ok(Progress::Requeue(Requeue::CredentialsPending))
            }
        };
    }

    let name = auth.generated_secret_name();
    match store.get::<Secret>(&namespace, &name).await? {
        Some(existing) if is_owned_by(&existing.metadata, auth) => {
            info!(
                "Secret {}/{} was created earlier but never referenced, adopting it",
                namespace, name
            );
            return assign_reference(store, auth, &name, Requeue::Adopted { kind: "Secret" })
                .await;
        }
        Some(_) => {
            return Err(AuthenticatorError::InvariantViolation(format!(
                "secret {}/{} exists but is not owned by {}",
                namespace,
                name,
                auth.identity()
            )));
        }
        None => {}
    }

    let secret = credentials_secret(auth, &name, &Credentials::generate())?;
    if requeue_on_conflict(store.create(&secret).await)?.is_none() {
        return Ok(Progress::Requeue(Requeue::Conflict));
    }
    info!("Created credentials secret {}/{}", namespace, name);

    assign_reference(store, auth, &name, Requeue::Created { kind: "Secret" }).await
}

/// Persist `credentialsSecretRef` and confirm the secret is visible afterwards
async fn assign_reference<S: Store>(
    store: &S,
    auth: &BasicAuthenticator,
    name: &str,
    reason: Requeue,
) -> Result<Progress<String>> {
    let namespace = auth.require_namespace()?;
    let mut updated = auth.clone();
    updated.spec.credentials_secret_ref = name.to_string();

    if requeue_on_conflict(store.update(&updated).await)?.is_none() {
        return Ok(Progress::Requeue(Requeue::Conflict));
    }
    info!("Set credentialsSecretRef of {} to {}", auth.identity(), name);

    if store.get::<Secret>(&namespace, name).await?.is_none() {
        warn!(
            "Secret {}/{} disappeared right after being referenced",
            namespace, name
        );
        return Ok(Progress::Requeue(Requeue::Conflict));
    }

    Ok(Progress::Requeue(reason))
}
