// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! One reconciliation pass for a Kwatcher.
//!
//! Steps run strictly in order: load, validate, resolve credential, fetch,
//! diff, persist, select, submit. The artifact is always persisted before any
//! rollout is submitted.

use crate::error::Result;
use crate::rollout::RolloutQueue;
use crate::sync::artifact::{create_artifact, get_artifact, replace_artifact, stored_config};
use crate::sync::credentials::resolve_credential;
use crate::sync::diff::compare;
use crate::sync::provider::{parse_payload, ConfigProvider};
use crate::sync::selector::{list_deployments, select};
use crate::types::Kwatcher;
use kube::{Api, Client};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// What a pass did to the artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactChange {
    /// The Kwatcher no longer exists
    TargetDeleted,
    /// First write, no rollouts
    Created,
    Unchanged,
    /// Overwritten; `rollouts` is the number of newly queued restarts
    Updated { rollouts: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub change: ArtifactChange,
    /// When to run the next pass; `None` when only a watch event should trigger one
    pub requeue_after: Option<Duration>,
}

/// Drives reconciliation passes against the cluster and the configuration provider
#[derive(Clone)]
pub struct ConfigSync {
    client: Client,
    provider: Arc<dyn ConfigProvider>,
    rollouts: RolloutQueue,
}

impl ConfigSync {
    pub fn new(client: Client, provider: Arc<dyn ConfigProvider>, rollouts: RolloutQueue) -> Self {
        Self {
            client,
            provider,
            rollouts,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Run one pass for the Kwatcher `namespace/name`
    #[instrument(skip(self), fields(kwatcher = %format!("{}/{}", namespace, name)))]
    pub async fn sync(&self, namespace: &str, name: &str) -> Result<SyncReport> {
        let kwatchers: Api<Kwatcher> = Api::namespaced(self.client.clone(), namespace);
        let Some(kwatcher) = kwatchers.get_opt(name).await? else {
            debug!("Kwatcher is gone, nothing to do");
            return Ok(SyncReport {
                change: ArtifactChange::TargetDeleted,
                requeue_after: None,
            });
        };

        let url = kwatcher.spec.validate()?;

        let credential = match kwatcher.spec.secret_name() {
            Some(secret_name) => Some(resolve_credential(&self.client, namespace, secret_name).await?),
            None => None,
        };

        let body = self.provider.fetch(&url, credential.as_ref()).await?;
        let payload = parse_payload(&body)?;
        let config = serde_json::to_string(&payload)?;

        let change = match get_artifact(&self.client, namespace, name).await? {
            None => {
                create_artifact(&self.client, &kwatcher, &config).await?;
                ArtifactChange::Created
            }
            Some(existing) => {
                let changed = match stored_config(&existing) {
                    Some(stored) => compare(config.as_bytes(), stored)?.changed,
                    None => true,
                };

                if changed {
                    replace_artifact(&self.client, &existing, &config).await?;
                    let rollouts = self.submit_rollouts(namespace, name).await?;
                    ArtifactChange::Updated { rollouts }
                } else {
                    debug!("ConfigMap already up to date");
                    ArtifactChange::Unchanged
                }
            }
        };

        Ok(SyncReport {
            change,
            requeue_after: Some(kwatcher.spec.refresh_interval()),
        })
    }

    async fn submit_rollouts(&self, namespace: &str, artifact_name: &str) -> Result<usize> {
        let deployments = list_deployments(&self.client, namespace).await?;
        let candidates = select(&deployments, artifact_name);

        let submitted = candidates
            .into_iter()
            .filter(|candidate| self.rollouts.submit(candidate.key.clone()))
            .count();

        info!(
            "ConfigMap {}/{} changed, queued {} rollouts",
            namespace, artifact_name, submitted
        );
        Ok(submitted)
    }
}
