// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Admission and execution of workload restarts.

pub mod backoff;
pub mod executor;
pub mod queue;

pub use backoff::ExponentialBackoff;
pub use executor::{DeploymentRestarter, RolloutExecutor};
pub use queue::{JobState, RolloutQueue, RolloutSettings, RolloutWorker};
