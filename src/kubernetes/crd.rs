// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! CRD availability checking utilities

use crate::constants::crd::{POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS};
use crate::error::Result;
use crate::types::BasicAuthenticator;
use kube::{discovery::Discovery, Client, Resource};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Wait for the BasicAuthenticator CRD to be served by the API server.
/// This uses exponential backoff starting at POLL_INTERVAL_SECS seconds.
pub async fn wait_for_authenticator_crd(client: &Client) -> Result<()> {
    let mut interval = POLL_INTERVAL_SECS;
    let api_version = BasicAuthenticator::api_version(&());

    loop {
        match check_authenticator_crd_exists(client).await {
            Ok(true) => {
                info!("BasicAuthenticator CRD ({}) is available", api_version);
                return Ok(());
            }
            Ok(false) => {
                info!(
                    "BasicAuthenticator CRD ({}) not yet available, waiting {} seconds...",
                    api_version, interval
                );
            }
            Err(e) => {
                warn!(
                    "Error checking for BasicAuthenticator CRD: {}, retrying in {} seconds...",
                    e, interval
                );
            }
        }

        sleep(Duration::from_secs(interval)).await;

        interval = (interval * 2).min(POLL_MAX_INTERVAL_SECS);
    }
}

async fn check_authenticator_crd_exists(client: &Client) -> Result<bool> {
    let group = BasicAuthenticator::group(&());
    let discovery = Discovery::new(client.clone())
        .filter(&[group.as_ref()])
        .run()
        .await?;

    let kind = BasicAuthenticator::kind(&());
    let version = BasicAuthenticator::version(&());

    for api_group in discovery.groups() {
        if api_group.name() != group {
            continue;
        }
        for (ar, _caps) in api_group.recommended_resources() {
            if ar.kind == kind && ar.version == version {
                return Ok(true);
            }
        }
    }

    Ok(false)
}
