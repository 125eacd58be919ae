// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube::CustomResourceExt;
use kwatcher::types::Kwatcher;

/// Print the Kwatcher CustomResourceDefinition as YAML
fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&Kwatcher::crd())?);
    Ok(())
}
