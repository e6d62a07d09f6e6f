//! Google Gemini backend over the Generative Language REST API.

use std::time::Duration;

use log::{debug, trace, warn};
use reqwest::blocking::Client;
use serde_json::{json, Value};

use crate::error::{ConfigError, OracleError};
use crate::oracle::Backend;

pub const API_KEY_VAR: &str = "GEMINI_API_KEY";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiBackend {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl GeminiBackend {
    /// Build a backend. Every request is bounded by `timeout`.
    pub fn new(
        api_key: impl Into<String>,
        model_name: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::InvalidSetting {
                name: "http client",
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model_name: model_name.into(),
            base_url: BASE_URL.to_string(),
        })
    }

    /// Read the credential from `GEMINI_API_KEY`.
    pub fn from_env(model_name: impl Into<String>, timeout: Duration) -> Result<Self, ConfigError> {
        let api_key = api_key_from(std::env::var(API_KEY_VAR).ok())?;
        Self::new(api_key, model_name, timeout)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

impl Backend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.model_name
        );
        let body = request_body(prompt);
        trace!(
            "Gemini request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(OracleError::Status {
                provider: "Gemini",
                status: status.as_u16(),
                body: text,
            });
        }

        let resp_json: Value = resp.json()?;
        debug!("Gemini response: {resp_json}");
        extract_text(&resp_json)
    }
}

/// A blank key counts as missing.
pub fn api_key_from(value: Option<String>) -> Result<String, ConfigError> {
    value
        .filter(|k| !k.trim().is_empty())
        .ok_or(ConfigError::MissingCredential(API_KEY_VAR))
}

pub fn request_body(prompt: &str) -> Value {
    json!({
        "contents": [
            { "role": "user", "parts": [ { "text": prompt } ] }
        ],
        "generationConfig": { "temperature": 0.0 }
    })
}

/// Pull the concatenated text of the first candidate out of a
/// `generateContent` response.
pub fn extract_text(resp_json: &Value) -> Result<String, OracleError> {
    if let Some(reason) = resp_json
        .pointer("/promptFeedback/blockReason")
        .and_then(Value::as_str)
    {
        return Err(OracleError::Blocked(reason.to_string()));
    }

    let candidate = resp_json["candidates"]
        .as_array()
        .and_then(|c| c.first())
        .ok_or_else(|| OracleError::MalformedResponse("no candidates in response".into()))?;

    if let Some(finish_reason) = candidate.get("finishReason").and_then(Value::as_str) {
        debug!("Gemini finish reason: {finish_reason}");
        if finish_reason == "SAFETY" {
            return Err(OracleError::Blocked("safety filters".into()));
        }
    }

    let parts = candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            warn!("No content parts in candidate: {candidate}");
            OracleError::MalformedResponse("no content parts in candidate".into())
        })?;

    // Thought parts from thinking models are not part of the answer.
    let text: String = parts
        .iter()
        .filter(|p| !p["thought"].as_bool().unwrap_or(false))
        .filter_map(|p| p["text"].as_str())
        .collect();

    Ok(text)
}
