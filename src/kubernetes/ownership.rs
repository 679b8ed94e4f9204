// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Owner reference declarations. Garbage collection itself is left to the cluster.

use crate::error::{AuthenticatorError, Result};
use kube::api::ObjectMeta;
use kube::Resource;

/// Declare `owner` as the controlling owner of the object described by `child`
pub fn set_owner<K>(child: &mut ObjectMeta, owner: &K) -> Result<()>
where
    K: Resource<DynamicType = ()>,
{
    let oref = owner
        .controller_owner_ref(&())
        .ok_or(AuthenticatorError::MissingObjectKey(".metadata.uid"))?;

    let refs = child.owner_references.get_or_insert_with(Vec::new);
    if !refs.iter().any(|r| r.uid == oref.uid) {
        refs.push(oref);
    }
    Ok(())
}

/// Check whether `child` carries an owner reference to `owner`
pub fn is_owned_by<K>(child: &ObjectMeta, owner: &K) -> bool
where
    K: Resource<DynamicType = ()>,
{
    let Some(uid) = owner.meta().uid.as_deref() else {
        return false;
    };

    child
        .owner_references
        .as_ref()
        .is_some_and(|refs| refs.iter().any(|r| r.uid == uid))
}
