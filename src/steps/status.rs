// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Readiness reporting through the status subresource

use crate::error::Result;
use crate::kubernetes::Store;
use crate::steps::{requeue_on_conflict, Progress, Requeue};
use crate::types::{BasicAuthenticator, BasicAuthenticatorStatus};
use tracing::{debug, info, instrument};

/// Write `readyReplicas` unless the stored status already says so
#[instrument(skip(store, auth), fields(authenticator = %auth.identity()))]
pub async fn report_status<S: Store>(
    store: &S,
    auth: &BasicAuthenticator,
    ready_replicas: i32,
) -> Result<Progress<()>> {
    if auth.status.is_some() && auth.ready_replicas() == ready_replicas {
        debug!("Status already reports {} ready replicas", ready_replicas);
        return Ok(Progress::Continue(()));
    }

    let mut updated = auth.clone();
    updated.status = Some(BasicAuthenticatorStatus { ready_replicas });

    if requeue_on_conflict(store.update_status(&updated).await)?.is_none() {
        return Ok(Progress::Requeue(Requeue::Conflict));
    }
    info!("Reported {} ready replicas", ready_replicas);

    Ok(Progress::Continue(()))
}
