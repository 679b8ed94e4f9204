// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes reconcilers that react to watch events.

pub mod authenticator;
pub mod backoff;

pub use authenticator::{reconcile_once, AuthenticatorReconciler, Context, Outcome};
pub use backoff::Backoff;
