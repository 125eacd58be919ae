// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Configuration synchronization: fetch, diff, persist and select.

pub mod artifact;
pub mod credentials;
pub mod diff;
pub mod driver;
pub mod provider;
pub mod selector;

pub use credentials::Credential;
pub use diff::{compare, ConfigDiff};
pub use driver::{ArtifactChange, ConfigSync, SyncReport};
pub use provider::{ConfigProvider, HttpConfigProvider};
pub use selector::{select, RolloutCandidate, WorkloadKey};
