// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::Client;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use basic_authenticator::config::Config;
use basic_authenticator::kubernetes::wait_for_authenticator_crd;
use basic_authenticator::reconcilers::AuthenticatorReconciler;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting basic-authenticator operator");

    let config = Config::from_env()?;
    info!(
        "Configuration loaded: nginx_image={}, default_proxy_port={}, watch_namespace={}",
        config.nginx_image,
        config.default_proxy_port,
        config.watch_namespace.as_deref().unwrap_or("<all>")
    );

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    info!("Waiting for BasicAuthenticator CRD to become available...");
    wait_for_authenticator_crd(&client).await?;

    AuthenticatorReconciler::new(client, config).run().await?;

    warn!("Reconciler stopped");
    Ok(())
}
