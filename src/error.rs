// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::fmt::Display;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KwatcherError {
    #[error("Invalid Kwatcher spec: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Provider request failed: {0}")]
    Transport(String),

    #[error("Conflicting update: {0}")]
    Conflict(String),

    #[error("Stored artifact is invalid: {0}")]
    InvalidArtifact(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),
}

/// Coarse classification of a [`KwatcherError`], used to pick retry policy and
/// the reason reported on the Kwatcher status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Transport,
    Conflict,
    Internal,
}

impl KwatcherError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KwatcherError::Validation(_) => ErrorKind::Validation,
            KwatcherError::NotFound(_) => ErrorKind::NotFound,
            KwatcherError::Transport(_) => ErrorKind::Transport,
            KwatcherError::Conflict(_) => ErrorKind::Conflict,
            KwatcherError::KubeError(kube::Error::Api(err)) if err.code == 404 => {
                ErrorKind::NotFound
            }
            KwatcherError::KubeError(kube::Error::Api(err)) if err.code == 409 => {
                ErrorKind::Conflict
            }
            KwatcherError::InvalidArtifact(_)
            | KwatcherError::Serialization(_)
            | KwatcherError::KubeError(_) => ErrorKind::Internal,
        }
    }

    /// Map a kube API error into NotFound / Conflict when the status code says so,
    /// keeping the raw kube error otherwise.
    pub fn from_kube(err: kube::Error, what: impl Display) -> Self {
        match &err {
            kube::Error::Api(resp) if resp.code == 404 => {
                KwatcherError::NotFound(format!("{}: {}", what, resp.message))
            }
            kube::Error::Api(resp) if resp.code == 409 => {
                KwatcherError::Conflict(format!("{}: {}", what, resp.message))
            }
            _ => KwatcherError::KubeError(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, KwatcherError>;
