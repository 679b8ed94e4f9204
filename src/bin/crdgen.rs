// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Print the BasicAuthenticator CustomResourceDefinition as YAML.

use basic_authenticator::types::BasicAuthenticator;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&BasicAuthenticator::crd())?);
    Ok(())
}
