// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Idempotent convergence steps run in order by the reconcile loop.

pub mod config_map;
pub mod credentials;
pub mod deployment;
pub mod sidecar;
pub mod status;

pub use config_map::ensure_config_map;
pub use credentials::ensure_credentials;
pub use deployment::ensure_deployment;
pub use sidecar::ensure_sidecars;
pub use status::report_status;

/// Result of a single convergence step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress<T> {
    /// The step is converged; carry its output to the next step
    Continue(T),
    /// Stop this pass and run again later
    Requeue(Requeue),
}

/// Why a pass stopped early
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requeue {
    /// A dependent object was created and may not be visible to the next read yet
    Created { kind: &'static str },
    /// A previously created secret was taken over by setting the credentials reference
    Adopted { kind: &'static str },
    /// A write was based on a stale version
    Conflict,
    /// The referenced credentials secret does not exist yet
    CredentialsPending,
}

impl Requeue {
    /// Requeues caused by our own writes; the rest are retried with backoff
    pub fn is_expected(&self) -> bool {
        matches!(self, Requeue::Created { .. } | Requeue::Adopted { .. })
    }
}

/// Labels stamped on every object created for an authenticator
pub(crate) fn managed_labels(
    auth: &crate::types::BasicAuthenticator,
) -> std::collections::BTreeMap<String, String> {
    use crate::constants::{labels, OPERATOR_NAME};
    use kube::ResourceExt;

    std::collections::BTreeMap::from([
        (labels::NAME.to_string(), labels::NAME_VALUE.to_string()),
        (labels::INSTANCE.to_string(), auth.name_any()),
        (labels::MANAGED_BY.to_string(), OPERATOR_NAME.to_string()),
    ])
}

/// Turn conflict errors of a write into a requeue, passing everything else through
pub(crate) fn requeue_on_conflict<T>(
    result: crate::error::Result<T>,
) -> crate::error::Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_conflict() => {
            tracing::info!("Write lost a race ({}), requeueing", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
