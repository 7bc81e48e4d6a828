//! Remote translator reached over HTTP.
//!
//! Sends `POST {endpoint}` with `{"prompt": ".."}` and expects a
//! [`Translation`] body back.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::errors::TranslationError;
use crate::domain::models::TranslatorConfig;
use crate::domain::ports::{Translation, Translator};

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    prompt: &'a str,
}

/// Translator backed by a JSON HTTP endpoint.
pub struct HttpTranslator {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    timeout_ms: u64,
}

impl HttpTranslator {
    /// Translator posting to `endpoint` with a bounded request timeout.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout_ms: u64,
    ) -> Result<Self, TranslationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| TranslationError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            timeout_ms,
        })
    }

    /// Build from the `[translator]` config section.
    pub fn from_config(config: &TranslatorConfig) -> Result<Self, TranslationError> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| TranslationError::Unavailable("translator.endpoint is not configured".into()))?;
        Self::new(endpoint, config.api_key.clone(), config.timeout_ms)
    }

    /// Configured endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn translate(&self, prompt: &str) -> Result<Translation, TranslationError> {
        if prompt.trim().is_empty() {
            return Err(TranslationError::EmptyPrompt);
        }

        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&TranslateRequest { prompt });
        if let Some(ref key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TranslationError::Timeout(self.timeout_ms)
            } else {
                TranslationError::Unavailable(format!("request to {} failed: {e}", self.endpoint))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranslationError::Unavailable(format!(
                "translator returned {status}: {body}"
            )));
        }

        response
            .json::<Translation>()
            .await
            .map_err(|e| TranslationError::Malformed(format!("invalid translation body: {e}")))
    }
}
