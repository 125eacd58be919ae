// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Custom resource types owned by kwatcher.

pub mod kwatcher;

pub use kwatcher::{Condition, Kwatcher, KwatcherSpec, KwatcherStatus, ProviderSpec, SyncConfig};
