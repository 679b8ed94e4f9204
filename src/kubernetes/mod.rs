// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities: the resource store, CRD discovery, ownership and label selectors.

pub mod crd;
pub mod ownership;
pub mod selector;
pub mod store;

pub use crd::wait_for_authenticator_crd;
pub use ownership::{is_owned_by, set_owner};
pub use store::{KubeStore, Store, StoreObject};
