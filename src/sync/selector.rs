// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Annotation-based opt-in filter over Deployments

use crate::constants::annotations;
use crate::error::{KwatcherError, Result};
use k8s_openapi::api::apps::v1::Deployment;
use kube::{api::ListParams, Api, Client, ResourceExt};
use std::collections::BTreeMap;
use std::fmt;
use tracing::instrument;

/// Identity of a workload that can be restarted
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkloadKey {
    pub namespace: String,
    pub name: String,
}

impl WorkloadKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for WorkloadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A Deployment selected for restart, with the annotations that made it eligible
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolloutCandidate {
    pub key: WorkloadKey,
    pub watched: Vec<String>,
}

/// List all Deployments in a namespace
#[instrument(skip(client))]
pub async fn list_deployments(client: &Client, namespace: &str) -> Result<Vec<Deployment>> {
    let deployments: Api<Deployment> = Api::namespaced(client.clone(), namespace);
    let list = deployments
        .list(&ListParams::default())
        .await
        .map_err(|e| KwatcherError::from_kube(e, format!("deployments in {}", namespace)))?;
    Ok(list.items)
}

/// Select the Deployments that opted in to restarts on changes of `artifact_name`
pub fn select(workloads: &[Deployment], artifact_name: &str) -> Vec<RolloutCandidate> {
    workloads
        .iter()
        .filter_map(|deployment| {
            let pod_annotations = template_annotations(deployment)?;
            if !watches(pod_annotations, artifact_name) {
                return None;
            }
            Some(RolloutCandidate {
                key: WorkloadKey::new(
                    deployment.namespace().unwrap_or_default(),
                    deployment.name_any(),
                ),
                watched: watched_names(pod_annotations).map(str::to_string).collect(),
            })
        })
        .collect()
}

/// Check whether a Deployment should be restarted when `artifact_name` changes
pub fn should_handle_deployment(deployment: &Deployment, artifact_name: &str) -> bool {
    template_annotations(deployment).is_some_and(|a| watches(a, artifact_name))
}

fn template_annotations(deployment: &Deployment) -> Option<&BTreeMap<String, String>> {
    deployment
        .spec
        .as_ref()?
        .template
        .metadata
        .as_ref()?
        .annotations
        .as_ref()
}

fn watches(pod_annotations: &BTreeMap<String, String>, artifact_name: &str) -> bool {
    pod_annotations
        .get(annotations::UPDATE_POLICY)
        .is_some_and(|p| p == annotations::POLICY_EXPLICIT)
        && watched_names(pod_annotations).any(|name| name == artifact_name)
}

fn watched_names(pod_annotations: &BTreeMap<String, String>) -> impl Iterator<Item = &str> {
    pod_annotations
        .get(annotations::WATCHED_CONFIGMAPS)
        .map(String::as_str)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
}
