// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Restart trigger for selected workloads

use crate::constants::{annotations, OPERATOR_NAME};
use crate::error::{KwatcherError, Result};
use crate::sync::WorkloadKey;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use kube::{
    api::{Patch, PatchParams},
    Api, Client,
};
use serde_json::json;
use tracing::{info, instrument};

/// Performs the restart of one workload
#[async_trait]
pub trait RolloutExecutor: Send + Sync + 'static {
    async fn execute(&self, key: &WorkloadKey) -> Result<()>;
}

/// Restarts a Deployment by stamping its pod template with the current time
#[derive(Clone)]
pub struct DeploymentRestarter {
    client: Client,
}

impl DeploymentRestarter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RolloutExecutor for DeploymentRestarter {
    #[instrument(skip(self), fields(deployment = %key))]
    async fn execute(&self, key: &WorkloadKey) -> Result<()> {
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), &key.namespace);

        if deployments
            .get_opt(&key.name)
            .await
            .map_err(|e| KwatcherError::from_kube(e, format!("deployment {}", key)))?
            .is_none()
        {
            return Err(KwatcherError::NotFound(format!("deployment {}", key)));
        }

        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true);
        let pp = PatchParams {
            field_manager: Some(OPERATOR_NAME.to_string()),
            ..Default::default()
        };
        deployments
            .patch(&key.name, &pp, &Patch::Merge(restart_patch(&timestamp)))
            .await
            .map_err(|e| KwatcherError::from_kube(e, format!("deployment {}", key)))?;

        info!("Triggered restart of deployment {} at {}", key, timestamp);
        Ok(())
    }
}

/// Merge patch touching only the restart annotation of the pod template
fn restart_patch(timestamp: &str) -> serde_json::Value {
    json!({
        "spec": {
            "template": {
                "metadata": {
                    "annotations": {
                        (annotations::LAST_UPDATED): timestamp
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{deployment_json, not_found_json, MockService};
    use chrono::DateTime;

    const DEPLOYMENT_PATH: &str = "/apis/apps/v1/namespaces/apps/deployments/web";

    fn patched_timestamp(body: &str) -> DateTime<chrono::FixedOffset> {
        let patch: serde_json::Value = serde_json::from_str(body).unwrap();
        let stamp = patch["spec"]["template"]["metadata"]["annotations"][annotations::LAST_UPDATED]
            .as_str()
            .unwrap()
            .to_string();
        DateTime::parse_from_rfc3339(&stamp).unwrap()
    }

    #[test]
    fn test_restart_patch_only_touches_annotation() {
        let patch = restart_patch("2026-01-01T00:00:00Z");
        assert_eq!(
            patch,
            json!({"spec": {"template": {"metadata": {"annotations": {
                "kwatcher.config/last-updated": "2026-01-01T00:00:00Z"
            }}}}})
        );
    }

    #[tokio::test]
    async fn test_execute_missing_deployment_is_not_found() {
        let mock = MockService::new().on_get(
            DEPLOYMENT_PATH,
            404,
            &not_found_json("deployments.apps", "web"),
        );
        let restarter = DeploymentRestarter::new(mock.clone().into_client());

        let err = restarter
            .execute(&WorkloadKey::new("apps", "web"))
            .await
            .unwrap_err();

        assert!(matches!(err, KwatcherError::NotFound(_)));
        assert!(mock.requests_with_method("PATCH").is_empty());
    }

    #[tokio::test]
    async fn test_execute_patches_pod_template_annotation() {
        let deployment = deployment_json("apps", "web", &[]);
        let mock = MockService::new()
            .on_get(DEPLOYMENT_PATH, 200, &deployment)
            .on_patch(DEPLOYMENT_PATH, 200, &deployment);
        let restarter = DeploymentRestarter::new(mock.clone().into_client());
        let before = Utc::now();

        restarter.execute(&WorkloadKey::new("apps", "web")).await.unwrap();

        let patches = mock.requests_with_method("PATCH");
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].path, DEPLOYMENT_PATH);
        assert_eq!(
            patches[0].content_type.as_deref(),
            Some("application/merge-patch+json")
        );
        assert!(patched_timestamp(&patches[0].body) >= before);
    }

    #[tokio::test]
    async fn test_execute_twice_gives_distinct_timestamps() {
        let deployment = deployment_json("apps", "web", &[]);
        let mock = MockService::new()
            .on_get(DEPLOYMENT_PATH, 200, &deployment)
            .on_patch(DEPLOYMENT_PATH, 200, &deployment);
        let restarter = DeploymentRestarter::new(mock.clone().into_client());
        let key = WorkloadKey::new("apps", "web");

        restarter.execute(&key).await.unwrap();
        restarter.execute(&key).await.unwrap();

        let patches = mock.requests_with_method("PATCH");
        assert_eq!(patches.len(), 2);
        assert!(patched_timestamp(&patches[1].body) > patched_timestamp(&patches[0].body));
    }

    #[tokio::test]
    async fn test_execute_conflict_is_reported() {
        let deployment = deployment_json("apps", "web", &[]);
        let conflict = serde_json::json!({
            "kind": "Status", "apiVersion": "v1", "status": "Failure",
            "message": "the object has been modified", "reason": "Conflict", "code": 409
        })
        .to_string();
        let mock = MockService::new()
            .on_get(DEPLOYMENT_PATH, 200, &deployment)
            .on_patch(DEPLOYMENT_PATH, 409, &conflict);
        let restarter = DeploymentRestarter::new(mock.into_client());

        let err = restarter
            .execute(&WorkloadKey::new("apps", "web"))
            .await
            .unwrap_err();

        assert!(matches!(err, KwatcherError::Conflict(_)));
    }
}
