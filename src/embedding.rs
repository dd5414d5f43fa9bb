//! Text embedding capability

use crate::config::AppConfig;
use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Maps text to a fixed-length vector.
///
/// Every call for a given deployment must return the same dimensionality,
/// and queries must be embedded with the same implementation used at
/// ingestion.
pub trait Embedder: Send + Sync {
    fn embed_query(&self, text: &str) -> Result<Vec<f64>>;
}

/// Google Generative Language `embedContent` client.
///
/// No retries: transport errors, non-success statuses and malformed bodies
/// are returned to the caller as [`StoreError::Embedding`].
pub struct GeminiEmbedder {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::blocking::Client,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: String,
    content: Content<'a>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f64>,
}

impl GeminiEmbedder {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Build an embedder from configuration. `None` when no API key is set.
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>> {
        match config.api_key() {
            Some(key) => Self::new(
                key,
                config.embedding_model.clone(),
                config.embedding_base_url.clone(),
                Duration::from_secs(config.request_timeout_secs),
            )
            .map(Some),
            None => Ok(None),
        }
    }

    /// Model name without the `models/` resource prefix.
    fn model_name(&self) -> &str {
        self.model.strip_prefix("models/").unwrap_or(&self.model)
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:embedContent", self.base_url, self.model_name())
    }

    fn request_body<'a>(&self, text: &'a str) -> EmbedRequest<'a> {
        EmbedRequest {
            model: format!("models/{}", self.model_name()),
            content: Content {
                parts: [Part { text }],
            },
        }
    }
}

impl Embedder for GeminiEmbedder {
    fn embed_query(&self, text: &str) -> Result<Vec<f64>> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(text))
            .send()
            .map_err(|e| StoreError::Embedding(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StoreError::Embedding(format!(
                "embedContent returned {}: {}",
                status, body
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .map_err(|e| StoreError::Embedding(format!("malformed response: {}", e)))?;

        debug!(
            model = self.model_name(),
            dimension = parsed.embedding.values.len(),
            "embedded text"
        );
        Ok(parsed.embedding.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder(model: &str) -> GeminiEmbedder {
        GeminiEmbedder::new(
            "test-key",
            model,
            "https://example.invalid/v1beta/",
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint_and_model_prefix() {
        let e = embedder("text-embedding-004");
        assert_eq!(
            e.endpoint(),
            "https://example.invalid/v1beta/models/text-embedding-004:embedContent"
        );

        let prefixed = embedder("models/text-embedding-004");
        assert_eq!(prefixed.endpoint(), e.endpoint());
    }

    #[test]
    fn test_request_body_shape() {
        let e = embedder("text-embedding-004");
        let body = serde_json::to_value(e.request_body("avoid alcohol")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "model": "models/text-embedding-004",
                "content": { "parts": [ { "text": "avoid alcohol" } ] }
            })
        );
    }

    #[test]
    fn test_response_parsing() {
        let parsed: EmbedResponse =
            serde_json::from_str(r#"{"embedding": {"values": [0.25, -0.5, 1.0]}}"#).unwrap();
        assert_eq!(parsed.embedding.values, vec![0.25, -0.5, 1.0]);
    }

    #[test]
    fn test_from_config_without_key() {
        let config = AppConfig {
            google_api_key: None,
            ..AppConfig::default()
        };
        assert!(GeminiEmbedder::from_config(&config).unwrap().is_none());
    }
}
