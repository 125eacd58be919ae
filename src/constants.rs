// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Deployment pod-template annotation keys used by kwatcher
pub mod annotations {
    /// Must equal [`POLICY_EXPLICIT`] for a Deployment to opt in to restarts
    pub const UPDATE_POLICY: &str = "kwatcher.config/update-policy";
    /// Comma-separated list of ConfigMap names the Deployment depends on
    pub const WATCHED_CONFIGMAPS: &str = "kwatcher.config/watched-configmaps";
    /// RFC-3339 timestamp written on every restart trigger
    pub const LAST_UPDATED: &str = "kwatcher.config/last-updated";

    pub const POLICY_EXPLICIT: &str = "explicit";
}

/// Keys read from the credential Secret referenced by a Kwatcher
pub mod secret_keys {
    /// Name of the HTTP header to send
    pub const KEY_TYPE: &str = "key-type";
    /// Value of the HTTP header to send
    pub const CLIENT_KEY: &str = "client-key";
}

/// ConfigMap data key holding the materialized configuration
pub const CONFIG_KEY: &str = "config";

/// The operator name used as field manager
pub const OPERATOR_NAME: &str = "kwatcher";

/// CRD polling configuration
pub mod crd {
    pub const GROUP: &str = "core.kwatch.cloudcorner.org";
    pub const VERSION: &str = "v1beta1";
    pub const KIND: &str = "Kwatcher";
    /// Initial polling interval in seconds when waiting for CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}

/// Status condition vocabulary
pub mod conditions {
    pub const READY: &str = "Ready";

    pub const REASON_SYNCED: &str = "Synced";
    pub const REASON_INVALID_SPEC: &str = "InvalidSpec";
    pub const REASON_PROVIDER_UNAVAILABLE: &str = "ProviderUnavailable";
    pub const REASON_NOT_FOUND: &str = "NotFound";
    pub const REASON_CONFLICT: &str = "Conflict";
    pub const REASON_SYNC_FAILED: &str = "SyncFailed";
}
