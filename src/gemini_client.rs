//! Google Gemini API client for diagnostic analysis
//!
//! Thin wrapper around the Gemini generateContent endpoint. Exactly one
//! request per call; no retries.

use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info};

use crate::config::{DEFAULT_ENDPOINT, DEFAULT_MODEL};
use crate::request::GenerateContentRequest;

/// Gemini client errors
#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
    #[error("Gemini API key is required")]
    MissingApiKey,

    #[error("Invalid Gemini endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("Failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Gemini API request failed: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Gemini API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse Gemini response: {0}")]
    Parse(#[source] reqwest::Error),

    #[error("Gemini response contained no text")]
    EmptyResponse,
}

#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

// -- Response types --

#[derive(Debug, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiResponseContent,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: &str) -> Result<Self, GeminiError> {
        Self::with_endpoint(api_key, DEFAULT_ENDPOINT, DEFAULT_MODEL, None)
    }

    pub fn with_endpoint(
        api_key: &str,
        endpoint: &str,
        model: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, GeminiError> {
        if api_key.trim().is_empty() {
            return Err(GeminiError::MissingApiKey);
        }

        let endpoint = endpoint.trim_end_matches('/');
        let parsed = reqwest::Url::parse(endpoint)
            .map_err(|_| GeminiError::InvalidEndpoint(endpoint.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(GeminiError::InvalidEndpoint(endpoint.to_string()));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(GeminiError::Client)?;

        Ok(Self {
            client,
            api_key: api_key.trim().to_string(),
            endpoint: endpoint.to_string(),
            model: model.to_string(),
        })
    }

    /// Full request URL, without the key
    pub fn url(&self) -> String {
        format!("{}/{}:generateContent", self.endpoint, self.model)
    }

    /// First candidate's first text part
    pub fn extract_text(response: &GeminiResponse) -> Option<String> {
        response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .and_then(|p| p.text.clone())
    }

    pub async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<String, GeminiError> {
        let url = self.url();
        let parts = request.contents.iter().map(|c| c.parts.len()).sum::<usize>();

        info!(url = %url, parts, "Sending Gemini analysis request");

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .json(request)
            .send()
            .await
            .map_err(|e| GeminiError::Network(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Gemini API error: {}", body);
            return Err(GeminiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| GeminiError::Parse(e.without_url()))?;

        Self::extract_text(&gemini_response).ok_or(GeminiError::EmptyResponse)
    }
}
