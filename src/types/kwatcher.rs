// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::error::{KwatcherError, Result};
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, schemars::JsonSchema)]
#[kube(group = "core.kwatch.cloudcorner.org", version = "v1beta1", kind = "Kwatcher")]
#[kube(namespaced)]
#[kube(status = "KwatcherStatus")]
#[serde(rename_all = "camelCase")]
pub struct KwatcherSpec {
    pub provider: ProviderSpec,
    pub config: SyncConfig,
}

#[derive(Serialize, Deserialize, Clone, Debug, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpec {
    /// HTTP(S) endpoint returning the configuration as a JSON object
    pub url: String,
    pub port: i32,
}

#[derive(Serialize, Deserialize, Clone, Debug, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// Seconds between two polls of the provider
    pub refresh_interval: i32,
    /// Name of a Secret in the same namespace holding the request credential
    #[serde(default)]
    pub secret: String,
}

impl KwatcherSpec {
    /// Check the spec invariants and return the parsed provider URL
    pub fn validate(&self) -> Result<Url> {
        let raw = self.provider.url.trim();
        if raw.is_empty() {
            return Err(KwatcherError::Validation(
                "provider URL cannot be empty".to_string(),
            ));
        }

        let url = Url::parse(raw).map_err(|e| {
            KwatcherError::Validation(format!("provider URL {:?} is malformed: {}", raw, e))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(KwatcherError::Validation(
                "provider URL must be a valid HTTP/HTTPS URL".to_string(),
            ));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(KwatcherError::Validation(
                "provider URL must name a host".to_string(),
            ));
        }

        if self.provider.port <= 0 {
            return Err(KwatcherError::Validation(
                "provider port must be positive".to_string(),
            ));
        }
        if self.config.refresh_interval <= 0 {
            return Err(KwatcherError::Validation(
                "refresh interval must be positive".to_string(),
            ));
        }

        Ok(url)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(u64::try_from(self.config.refresh_interval).unwrap_or_default())
    }

    /// Name of the referenced credential Secret, if any
    pub fn secret_name(&self) -> Option<&str> {
        let name = self.config.secret.trim();
        (!name.is_empty()).then_some(name)
    }
}

impl Kwatcher {
    /// `namespace/name` identity used in logs and as reconcile backoff key
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace().unwrap_or_default(), self.name_any())
    }

    /// The current Ready condition, if one has been reported
    pub fn ready_condition(&self) -> Option<&Condition> {
        self.status
            .as_ref()
            .and_then(|s| s.conditions.as_ref())
            .and_then(|conditions| {
                conditions
                    .iter()
                    .find(|c| c.condition_type == crate::constants::conditions::READY)
            })
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KwatcherStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

impl Condition {
    /// Whether two conditions carry the same observable state, ignoring timestamps
    pub fn same_state(&self, other: &Condition) -> bool {
        self.condition_type == other.condition_type
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}
