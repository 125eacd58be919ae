// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Client for the external configuration provider

use crate::error::{KwatcherError, Result};
use crate::sync::credentials::Credential;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderName, HeaderValue};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Source of configuration documents
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// GET `url`, attaching the credential as a header when present, and return the raw body
    async fn fetch(&self, url: &Url, credential: Option<&Credential>) -> Result<Bytes>;
}

/// [`ConfigProvider`] speaking plain HTTP/JSON
#[derive(Debug, Clone)]
pub struct HttpConfigProvider {
    http: reqwest::Client,
}

impl HttpConfigProvider {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KwatcherError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ConfigProvider for HttpConfigProvider {
    #[instrument(skip(self, credential), fields(url = %url))]
    async fn fetch(&self, url: &Url, credential: Option<&Credential>) -> Result<Bytes> {
        let mut request = self.http.get(url.clone());
        if let Some(credential) = credential {
            let (name, value) = credential_header(credential)?;
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| KwatcherError::Transport(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KwatcherError::Transport(format!(
                "GET {} returned {}",
                url, status
            )));
        }

        let body = response.bytes().await.map_err(|e| {
            KwatcherError::Transport(format!("Failed to read response body from {}: {}", url, e))
        })?;
        debug!("Fetched {} bytes", body.len());
        Ok(body)
    }
}

fn credential_header(credential: &Credential) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::from_bytes(credential.header_name.as_bytes()).map_err(|_| {
        KwatcherError::Transport(format!(
            "credential header name {:?} is not a valid HTTP header",
            credential.header_name
        ))
    })?;
    let mut value = HeaderValue::from_str(&credential.header_value).map_err(|_| {
        KwatcherError::Transport("credential header value is not valid".to_string())
    })?;
    value.set_sensitive(true);
    Ok((name, value))
}

/// Parse a provider response body, which must be a JSON object
pub fn parse_payload(body: &[u8]) -> Result<Map<String, Value>> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(KwatcherError::Transport(
            "provider response is not a JSON object".to_string(),
        )),
        Err(e) => Err(KwatcherError::Transport(format!(
            "Failed to parse provider response as JSON: {}",
            e
        ))),
    }
}
