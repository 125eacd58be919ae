// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! ConfigMap-backed storage of the materialized configuration

use crate::constants::{CONFIG_KEY, OPERATOR_NAME};
use crate::error::{KwatcherError, Result};
use crate::types::Kwatcher;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{
    api::{ObjectMeta, PostParams},
    Api, Client, Resource, ResourceExt,
};
use std::collections::BTreeMap;
use tracing::{info, instrument};

/// Get the artifact for a Kwatcher, `None` when it was never created
#[instrument(skip(client))]
pub async fn get_artifact(client: &Client, namespace: &str, name: &str) -> Result<Option<ConfigMap>> {
    let configmaps: Api<ConfigMap> = Api::namespaced(client.clone(), namespace);
    configmaps
        .get_opt(name)
        .await
        .map_err(|e| KwatcherError::from_kube(e, format!("configmap {}/{}", namespace, name)))
}

/// The stored configuration body, if the artifact has one
pub fn stored_config(configmap: &ConfigMap) -> Option<&str> {
    configmap
        .data
        .as_ref()
        .and_then(|d| d.get(CONFIG_KEY))
        .map(String::as_str)
}

/// Create the artifact for a Kwatcher, owned by it
#[instrument(skip(client, owner, body), fields(kwatcher = %owner.key()))]
pub async fn create_artifact(client: &Client, owner: &Kwatcher, body: &str) -> Result<ConfigMap> {
    let namespace = owner.namespace().unwrap_or_default();
    let configmaps: Api<ConfigMap> = Api::namespaced(client.clone(), &namespace);
    let configmap = build_artifact(owner, body);

    let created = configmaps
        .create(&post_params(), &configmap)
        .await
        .map_err(|e| {
            KwatcherError::from_kube(e, format!("configmap {}/{}", namespace, owner.name_any()))
        })?;

    info!("Created ConfigMap {}/{}", namespace, owner.name_any());
    Ok(created)
}

/// Overwrite the artifact body wholesale, guarded by the observed resourceVersion
#[instrument(skip(client, existing, body), fields(configmap = %format!("{}/{}", existing.namespace().unwrap_or_default(), existing.name_any())))]
pub async fn replace_artifact(client: &Client, existing: &ConfigMap, body: &str) -> Result<ConfigMap> {
    let namespace = existing.namespace().unwrap_or_default();
    let name = existing.name_any();
    let configmaps: Api<ConfigMap> = Api::namespaced(client.clone(), &namespace);

    let mut updated = existing.clone();
    updated.data = Some(config_data(body));
    updated.binary_data = None;

    let replaced = configmaps
        .replace(&name, &post_params(), &updated)
        .await
        .map_err(|e| KwatcherError::from_kube(e, format!("configmap {}/{}", namespace, name)))?;

    info!("Updated ConfigMap {}/{}", namespace, name);
    Ok(replaced)
}

/// Build a fresh artifact named after its Kwatcher
fn build_artifact(owner: &Kwatcher, body: &str) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(owner.name_any()),
            namespace: owner.namespace(),
            owner_references: owner.controller_owner_ref(&()).map(|r| vec![r]),
            ..Default::default()
        },
        data: Some(config_data(body)),
        ..Default::default()
    }
}

fn config_data(body: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(CONFIG_KEY.to_string(), body.to_string())])
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(OPERATOR_NAME.to_string()),
        ..Default::default()
    }
}
