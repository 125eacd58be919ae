// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Resolution of the provider request credential from a Secret

use crate::constants::secret_keys;
use crate::error::{KwatcherError, Result};
use http::header::{HeaderName, HeaderValue};
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use std::fmt;
use tracing::{debug, instrument};

/// HTTP header attached to the provider request
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub header_name: String,
    pub header_value: String,
}

// Keep the header value out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("header_name", &self.header_name)
            .field("header_value", &"<redacted>")
            .finish()
    }
}

/// Fetch the named Secret and extract the credential from it
#[instrument(skip(client))]
pub async fn resolve_credential(
    client: &Client,
    namespace: &str,
    secret_name: &str,
) -> Result<Credential> {
    let secrets: Api<Secret> = Api::namespaced(client.clone(), namespace);

    let secret = secrets
        .get_opt(secret_name)
        .await
        .map_err(|e| KwatcherError::from_kube(e, format!("secret {}/{}", namespace, secret_name)))?
        .ok_or_else(|| {
            KwatcherError::NotFound(format!("secret {}/{}", namespace, secret_name))
        })?;

    let credential = credential_from_secret(&secret).ok_or_else(|| {
        KwatcherError::NotFound(format!(
            "secret {}/{} must contain non-empty '{}' and '{}' keys",
            namespace,
            secret_name,
            secret_keys::KEY_TYPE,
            secret_keys::CLIENT_KEY
        ))
    })?;

    if !is_valid_header(&credential) {
        return Err(KwatcherError::NotFound(format!(
            "secret {}/{} holds no usable '{}' header",
            namespace, secret_name, credential.header_name
        )));
    }

    debug!("Resolved credential header {}", credential.header_name);
    Ok(credential)
}

/// Extract the credential, `None` when either key is missing or blank
pub fn credential_from_secret(secret: &Secret) -> Option<Credential> {
    let header_name = secret_value(secret, secret_keys::KEY_TYPE)?;
    let header_value = secret_value(secret, secret_keys::CLIENT_KEY)?;
    Some(Credential {
        header_name,
        header_value,
    })
}

/// Whether the credential can be sent as an HTTP header
pub fn is_valid_header(credential: &Credential) -> bool {
    HeaderName::from_bytes(credential.header_name.as_bytes()).is_ok()
        && HeaderValue::from_str(&credential.header_value).is_ok()
}

fn secret_value(secret: &Secret, key: &str) -> Option<String> {
    let from_data = secret
        .data
        .as_ref()
        .and_then(|d| d.get(key))
        .and_then(|v| String::from_utf8(v.0.clone()).ok());
    let raw = from_data.or_else(|| secret.string_data.as_ref().and_then(|d| d.get(key)).cloned())?;

    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
