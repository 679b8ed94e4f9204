// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Kubernetes annotation keys used by the operator
pub mod annotations {
    /// Weak back-reference from an injected workload to the authenticator that injected it
    pub const INJECTED_BY: &str = "authenticator.snappcloud.io/injected-by";
}

/// Labels stamped on every object the operator creates
pub mod labels {
    pub const NAME: &str = "app.kubernetes.io/name";
    pub const INSTANCE: &str = "app.kubernetes.io/instance";
    pub const MANAGED_BY: &str = "app.kubernetes.io/managed-by";
    pub const NAME_VALUE: &str = "basic-authenticator";
}

/// Keys inside the credentials secret
pub mod secret_keys {
    pub const USERNAME: &str = "username";
    pub const PASSWORD: &str = "password";
    /// `user:{PLAIN}password`, read by nginx through `auth_basic_user_file`
    pub const HTPASSWD: &str = "htpasswd";
}

/// Layout of the nginx proxy container
pub mod proxy {
    /// Stable marker used to detect an already injected sidecar
    pub const CONTAINER_NAME: &str = "basic-auth-proxy";
    pub const CONFIG_VOLUME: &str = "basic-auth-nginx-conf";
    pub const CREDENTIALS_VOLUME: &str = "basic-auth-credentials";
    pub const CONFIG_MOUNT_PATH: &str = "/etc/nginx/conf.d";
    pub const CREDENTIALS_MOUNT_PATH: &str = "/etc/nginx/secret";
    pub const CONFIG_KEY: &str = "nginx.conf";
    pub const PORT_NAME: &str = "basic-auth";
}

/// The operator name, used as field manager and managed-by label value
pub const OPERATOR_NAME: &str = "basic-authenticator";

/// CRD polling configuration
pub mod crd {
    /// Initial polling interval in seconds when waiting for CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}

/// Requeue timings of the reconcile loop
pub mod requeue {
    /// Delay after a pass created a dependent object
    pub const CREATE_REQUEUE_SECS: u64 = 1;
    /// Periodic resync once converged; sidecar targets are not watched
    pub const RESYNC_INTERVAL_SECS: u64 = 300;
}
