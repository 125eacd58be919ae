// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kwatcher reconciler - runs a sync pass per watch event or refresh tick and
//! reports the outcome on the Kwatcher status.

use crate::config::Config;
use crate::constants::{conditions, OPERATOR_NAME};
use crate::error::{ErrorKind, KwatcherError, Result};
use crate::rollout::ExponentialBackoff;
use crate::sync::{ArtifactChange, ConfigSync, SyncReport};
use crate::types::{Condition, Kwatcher};
use chrono::{SecondsFormat, Utc};
use futures::StreamExt;
use kube::{
    api::{DynamicObject, Patch, PatchParams},
    runtime::{controller, controller::Action, reflector::ObjectRef, Controller},
    Api, ResourceExt,
};
use kube_runtime::watcher::Config as WatcherConfig;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

pub struct KwatcherReconciler {
    sync: ConfigSync,
    config: Config,
    backoff: ExponentialBackoff,
    /// Consecutive failed passes per Kwatcher key
    failures: Mutex<HashMap<String, u32>>,
}

impl KwatcherReconciler {
    pub fn new(sync: ConfigSync, config: Config) -> Self {
        Self {
            sync,
            config,
            backoff: ExponentialBackoff::default(),
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let client = self.sync.client().clone();
        let kwatchers: Api<Kwatcher> = match &self.config.watch_namespace {
            Some(namespace) => {
                info!("Watching Kwatchers in namespace {}", namespace);
                Api::namespaced(client, namespace)
            }
            None => {
                info!("Watching Kwatchers in all namespaces");
                Api::all(client)
            }
        };
        let concurrency = self.config.max_concurrent_reconciles;
        let context = Arc::new(self);
        let results = Arc::clone(&context);

        Controller::new(kwatchers, WatcherConfig::default())
            .with_config(controller::Config::default().concurrency(concurrency))
            .graceful_shutdown_on(shutdown.cancelled_owned())
            .run(reconcile, error_policy, context)
            .for_each(|res| {
                let ctx = Arc::clone(&results);
                async move {
                    match res {
                        Ok(o) => debug!("Reconciled kwatcher: {:?}", o),
                        // A scheduled retry fired after the Kwatcher left the store.
                        Err(controller::Error::ObjectNotFound(obj)) => ctx.forget(&obj),
                        Err(e) => warn!("Reconciliation error: {:?}", e),
                    }
                }
            })
            .await;

        info!("Kwatcher reconciler stopped");
        Ok(())
    }

    /// Delay before retrying a failed pass of `key`; every call counts one more failure
    fn next_retry_delay(&self, key: &str) -> Duration {
        let mut failures = self.failures.lock();
        let count = failures.entry(key.to_string()).or_insert(0);
        let delay = self.backoff.delay(*count);
        *count = count.saturating_add(1);
        delay
    }

    fn reset_failures(&self, key: &str) {
        self.failures.lock().remove(key);
    }

    fn forget(&self, obj: &ObjectRef<DynamicObject>) {
        let key = format!("{}/{}", obj.namespace.as_deref().unwrap_or_default(), obj.name);
        debug!("Kwatcher {} is gone, dropping its retry state", key);
        self.reset_failures(&key);
    }

    async fn report_status(&self, kwatcher: &Kwatcher, condition: Condition) {
        if kwatcher
            .ready_condition()
            .is_some_and(|current| current.same_state(&condition))
        {
            return;
        }

        let namespace = kwatcher.namespace().unwrap_or_default();
        let api: Api<Kwatcher> = Api::namespaced(self.sync.client().clone(), &namespace);
        let patch = serde_json::json!({
            "status": { "conditions": [condition] }
        });
        if let Err(e) = api
            .patch_status(
                &kwatcher.name_any(),
                &PatchParams::apply(OPERATOR_NAME),
                &Patch::Merge(patch),
            )
            .await
        {
            warn!("Failed to update status of Kwatcher {}: {}", kwatcher.key(), e);
        }
    }
}

#[instrument(skip(kwatcher, ctx), fields(kwatcher = %kwatcher.key()))]
async fn reconcile(kwatcher: Arc<Kwatcher>, ctx: Arc<KwatcherReconciler>) -> Result<Action> {
    let key = kwatcher.key();
    let namespace = kwatcher.namespace().unwrap_or_default();
    debug!("Reconciling kwatcher: {}", key);

    let result = ctx.sync.sync(&namespace, &kwatcher.name_any()).await;

    let deleted = matches!(
        result,
        Ok(SyncReport {
            change: ArtifactChange::TargetDeleted,
            ..
        })
    );
    if !deleted {
        let condition = ready_condition(&result, kwatcher.ready_condition(), &now());
        ctx.report_status(&kwatcher, condition).await;
    }

    let report = result?;
    ctx.reset_failures(&key);
    match &report.change {
        ArtifactChange::Updated { rollouts } => {
            info!("ConfigMap {} updated, {} rollouts queued", key, rollouts)
        }
        ArtifactChange::Created => info!("ConfigMap {} created", key),
        ArtifactChange::Unchanged | ArtifactChange::TargetDeleted => {}
    }

    Ok(report
        .requeue_after
        .map_or_else(Action::await_change, Action::requeue))
}

fn error_policy(
    kwatcher: Arc<Kwatcher>,
    error: &KwatcherError,
    ctx: Arc<KwatcherReconciler>,
) -> Action {
    match error.kind() {
        ErrorKind::Validation => {
            warn!("Kwatcher {} is invalid, waiting for a spec change: {}", kwatcher.key(), error);
            ctx.reset_failures(&kwatcher.key());
            Action::await_change()
        }
        _ => {
            let delay = ctx.next_retry_delay(&kwatcher.key());
            error!(
                "Reconciliation of {} failed, retrying in {:?}: {}",
                kwatcher.key(),
                delay,
                error
            );
            Action::requeue(delay)
        }
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// The Ready condition describing the outcome of a pass.
///
/// `lastTransitionTime` is carried over from `previous` when the status value
/// does not flip.
fn ready_condition(
    result: &Result<SyncReport>,
    previous: Option<&Condition>,
    now: &str,
) -> Condition {
    let (status, reason, message) = match result {
        Ok(_) => ("True", conditions::REASON_SYNCED, "Configuration is up to date".to_string()),
        Err(e) => {
            let reason = match e.kind() {
                ErrorKind::Validation => conditions::REASON_INVALID_SPEC,
                ErrorKind::Transport => conditions::REASON_PROVIDER_UNAVAILABLE,
                ErrorKind::NotFound => conditions::REASON_NOT_FOUND,
                ErrorKind::Conflict => conditions::REASON_CONFLICT,
                ErrorKind::Internal => conditions::REASON_SYNC_FAILED,
            };
            ("False", reason, e.to_string())
        }
    };

    let last_transition_time = previous
        .filter(|p| p.status == status)
        .and_then(|p| p.last_transition_time.clone())
        .unwrap_or_else(|| now.to_string());

    Condition {
        condition_type: conditions::READY.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message),
        last_transition_time: Some(last_transition_time),
    }
}
