// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::Client;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use kwatcher::config::Config;
use kwatcher::kubernetes::wait_for_kwatcher_crd;
use kwatcher::reconcilers::KwatcherReconciler;
use kwatcher::rollout::{DeploymentRestarter, RolloutWorker};
use kwatcher::sync::{ConfigSync, HttpConfigProvider};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting Kwatcher operator");

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Configuration loaded: watch_namespace={:?}, max_concurrent_reconciles={}, max_concurrent_rollouts={}",
        config.watch_namespace, config.max_concurrent_reconciles, config.max_concurrent_rollouts
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    info!("Waiting for Kwatcher CRD to become available...");
    wait_for_kwatcher_crd(&client).await?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
        signal_token.cancel();
    });

    // The rollout worker owns the admission queue; the sync driver only submits to it
    let executor = Arc::new(DeploymentRestarter::new(client.clone()));
    let (rollout_worker, rollouts) = RolloutWorker::new(executor, config.rollout_settings());

    let provider = Arc::new(HttpConfigProvider::new(config.provider_timeout)?);
    let sync = ConfigSync::new(client, provider, rollouts);
    let reconciler = KwatcherReconciler::new(sync, config);

    info!("Starting reconciler and rollout worker...");

    let worker_token = shutdown.clone();
    tokio::try_join!(
        async move {
            rollout_worker.run(worker_token).await;
            Ok::<(), anyhow::Error>(())
        },
        reconciler.run(shutdown)
    )?;

    info!("Kwatcher operator stopped");
    Ok(())
}
