// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthenticatorError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: String, name: String },

    #[error("Conflict writing {kind} {name}: resource version is stale")]
    Conflict { kind: String, name: String },

    #[error("{kind} {name} not found")]
    NotFound { kind: String, name: String },

    #[error("Missing object key: {0}")]
    MissingObjectKey(&'static str),

    #[error("Invalid spec: {0}")]
    InvalidSpec(String),

    #[error("Invalid label selector: {0}")]
    InvalidSelector(String),

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl AuthenticatorError {
    /// Stale writes and lost create races, both resolved by a fresh read on the next pass
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            AuthenticatorError::Conflict { .. } | AuthenticatorError::AlreadyExists { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AuthenticatorError>;
