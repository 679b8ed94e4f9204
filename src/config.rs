// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

const DEFAULT_NGINX_IMAGE: &str = "nginx:1.25-alpine";
const DEFAULT_PROXY_PORT: i32 = 8080;
const DEFAULT_BACKOFF_BASE_MS: u64 = 500;
const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Image of the nginx proxy, standalone and sidecar alike
    pub nginx_image: String,
    /// Listen port of the proxy when the resource leaves `proxyPort` unset
    pub default_proxy_port: i32,
    /// Restrict the controller to a single namespace
    pub watch_namespace: Option<String>,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            nginx_image: DEFAULT_NGINX_IMAGE.to_string(),
            default_proxy_port: DEFAULT_PROXY_PORT,
            watch_namespace: None,
            backoff_base: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
            backoff_max: Duration::from_secs(DEFAULT_BACKOFF_MAX_SECS),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Config::default();

        let nginx_image = lookup("NGINX_IMAGE").unwrap_or(defaults.nginx_image);

        let default_proxy_port = match lookup("DEFAULT_PROXY_PORT") {
            Some(v) => v
                .parse()
                .with_context(|| format!("DEFAULT_PROXY_PORT is not a port number: {}", v))?,
            None => defaults.default_proxy_port,
        };

        let watch_namespace = lookup("WATCH_NAMESPACE").filter(|ns| !ns.is_empty());

        let backoff_base = match lookup("BACKOFF_BASE_MS") {
            Some(v) => Duration::from_millis(
                v.parse()
                    .with_context(|| format!("BACKOFF_BASE_MS is not a number: {}", v))?,
            ),
            None => defaults.backoff_base,
        };

        let backoff_max = match lookup("BACKOFF_MAX_SECS") {
            Some(v) => Duration::from_secs(
                v.parse()
                    .with_context(|| format!("BACKOFF_MAX_SECS is not a number: {}", v))?,
            ),
            None => defaults.backoff_max,
        };

        Ok(Config {
            nginx_image,
            default_proxy_port,
            watch_namespace,
            backoff_base,
            backoff_max,
        })
    }
}
