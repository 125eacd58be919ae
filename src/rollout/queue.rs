// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Bounded-concurrency, deduplicating, retrying rollout queue.
//!
//! [`RolloutQueue`] is the cheap-to-clone submission handle. [`RolloutWorker`]
//! owns the admission loop: it pulls ready keys, admits them against a semaphore
//! and runs the executor in tracked tasks. Keys waiting on a deferral or a
//! retry sit in a `DelayQueue` owned by the worker.
//!
//! Per key: `Queued -> Running -> (removed | Queued with a longer delay)`.
//! A key is present in the job table at most once.

use crate::error::Result;
use crate::rollout::backoff::ExponentialBackoff;
use crate::rollout::executor::RolloutExecutor;
use crate::sync::WorkloadKey;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio_util::time::DelayQueue;
use tracing::{debug, error, info, warn};

/// Tuning of the admission queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolloutSettings {
    /// Maximum number of executions running at the same time
    pub max_concurrent: usize,
    pub backoff: ExponentialBackoff,
    /// Consecutive failures after which a key is dropped
    pub max_attempts: u32,
}

impl Default for RolloutSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            backoff: ExponentialBackoff::default(),
            max_attempts: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Waiting for admission, possibly behind a delay
    Queued,
    /// Executing
    Running,
}

#[derive(Debug, Clone, Copy)]
struct Job {
    state: JobState,
    failures: u32,
}

struct Shared {
    jobs: Mutex<HashMap<WorkloadKey, Job>>,
    ready_tx: mpsc::UnboundedSender<WorkloadKey>,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
}

/// Handle used to submit rollouts
#[derive(Clone)]
pub struct RolloutQueue {
    shared: Arc<Shared>,
}

impl RolloutQueue {
    /// Enqueue a rollout for `key`.
    ///
    /// Returns `false` without doing anything when a job for the key is
    /// already queued or running.
    pub fn submit(&self, key: WorkloadKey) -> bool {
        {
            let mut jobs = self.shared.jobs.lock();
            if jobs.contains_key(&key) {
                debug!("Rollout for {} already pending, skipping", key);
                return false;
            }
            jobs.insert(
                key.clone(),
                Job {
                    state: JobState::Queued,
                    failures: 0,
                },
            );
        }

        debug!("Queued rollout for {}", key);
        if self.shared.ready_tx.send(key.clone()).is_err() {
            error!("Rollout worker is gone, dropping rollout for {}", key);
            self.shared.jobs.lock().remove(&key);
            return false;
        }
        true
    }

    pub fn state(&self, key: &WorkloadKey) -> Option<JobState> {
        self.shared.jobs.lock().get(key).map(|job| job.state)
    }

    /// Consecutive failures recorded for a live job
    pub fn failures(&self, key: &WorkloadKey) -> Option<u32> {
        self.shared.jobs.lock().get(key).map(|job| job.failures)
    }

    pub fn contains(&self, key: &WorkloadKey) -> bool {
        self.shared.jobs.lock().contains_key(key)
    }

    /// Number of live jobs, queued or running
    pub fn len(&self) -> usize {
        self.shared.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of executions currently holding an admission permit
    pub fn active(&self) -> usize {
        self.shared.max_concurrent - self.shared.permits.available_permits()
    }
}

/// Owns the admission loop of the rollout queue
pub struct RolloutWorker {
    shared: Arc<Shared>,
    settings: RolloutSettings,
    executor: Arc<dyn RolloutExecutor>,
    ready_rx: mpsc::UnboundedReceiver<WorkloadKey>,
    done_tx: mpsc::UnboundedSender<(WorkloadKey, Result<()>)>,
    done_rx: mpsc::UnboundedReceiver<(WorkloadKey, Result<()>)>,
    delayed: DelayQueue<WorkloadKey>,
    tracker: TaskTracker,
}

impl RolloutWorker {
    pub fn new(executor: Arc<dyn RolloutExecutor>, settings: RolloutSettings) -> (Self, RolloutQueue) {
        let max_concurrent = settings.max_concurrent.max(1);
        let (ready_tx, ready_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            jobs: Mutex::new(HashMap::new()),
            ready_tx,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        });

        let worker = Self {
            shared: Arc::clone(&shared),
            settings,
            executor,
            ready_rx,
            done_tx,
            done_rx,
            delayed: DelayQueue::new(),
            tracker: TaskTracker::new(),
        };

        (worker, RolloutQueue { shared })
    }

    /// Run until `shutdown` is cancelled, then wait for in-flight executions
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            "Rollout worker started (max {} concurrent rollouts)",
            self.shared.max_concurrent
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                Some((key, result)) = self.done_rx.recv() => self.complete(key, result),
                Some(expired) = self.delayed.next() => self.admit(expired.into_inner()),
                Some(key) = self.ready_rx.recv() => self.admit(key),
            }
        }

        info!(
            "Rollout worker stopping, waiting for {} in-flight rollouts",
            self.tracker.len()
        );
        self.tracker.close();
        self.tracker.wait().await;
        while let Ok((key, result)) = self.done_rx.try_recv() {
            self.complete(key, result);
        }
        info!("Rollout worker stopped");
    }

    fn admit(&mut self, key: WorkloadKey) {
        let Ok(permit) = Arc::clone(&self.shared.permits).try_acquire_owned() else {
            let failures = self.shared.jobs.lock().get(&key).map_or(0, |job| job.failures);
            let delay = self.settings.backoff.delay(failures);
            debug!("Rollout capacity reached, deferring {} by {:?}", key, delay);
            self.delayed.insert(key, delay);
            return;
        };

        if let Some(job) = self.shared.jobs.lock().get_mut(&key) {
            job.state = JobState::Running;
        }

        debug!("Admitted rollout for {}", key);
        let executor = Arc::clone(&self.executor);
        let done_tx = self.done_tx.clone();
        self.tracker.spawn(async move {
            let result = executor.execute(&key).await;
            drop(permit);
            // The worker holds the receiver for its whole lifetime.
            let _ = done_tx.send((key, result));
        });
    }

    fn complete(&mut self, key: WorkloadKey, result: Result<()>) {
        let mut jobs = self.shared.jobs.lock();

        let error = match result {
            Ok(()) => {
                jobs.remove(&key);
                info!("Rollout for {} succeeded", key);
                return;
            }
            Err(e) => e,
        };

        let Some(job) = jobs.get_mut(&key) else {
            return;
        };
        let delay = self.settings.backoff.delay(job.failures);
        job.failures += 1;
        let attempts = job.failures;

        if attempts >= self.settings.max_attempts {
            jobs.remove(&key);
            warn!(
                "Giving up rollout for {} after {} failed attempts: {}",
                key, attempts, error
            );
            return;
        }

        job.state = JobState::Queued;
        drop(jobs);

        warn!(
            "Rollout for {} failed (attempt {}), retrying in {:?}: {}",
            key, attempts, delay, error
        );
        self.delayed.insert(key, delay);
    }
}
