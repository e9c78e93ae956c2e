//! Gemini adapter (completion engine).
//!
//! Calls the `generateContent` endpoint for text and vision prompts. One
//! attempt per call; the HTTP client carries the bounded timeout.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{json, Value};

use concierge_core::{errors::Error, ports::CompletionPort, Result};

#[derive(Clone, Debug)]
pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: std::time::Duration,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client build");

        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            http,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn generate(&self, body: Value) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(map_request_error)?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(Error::RateLimited);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::ServiceUnavailable(format!(
                "gemini returned {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let v: Value = resp
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(format!("gemini json error: {e}")))?;

        parse_completion(&v)
    }
}

fn map_request_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        return Error::ServiceUnavailable("gemini request timed out".to_string());
    }
    Error::ServiceUnavailable(format!("gemini request error: {e}"))
}

/// Pull the first candidate's text parts out of a `generateContent` response.
fn parse_completion(v: &Value) -> Result<String> {
    let parts = v
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::InvalidResponse("gemini response has no candidates".to_string()))?;

    let text = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("");

    if text.trim().is_empty() {
        return Err(Error::InvalidResponse(
            "gemini returned empty text".to_string(),
        ));
    }

    Ok(text)
}

#[async_trait::async_trait]
impl CompletionPort for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.generate(json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        }))
        .await
    }

    async fn describe_image(&self, prompt: &str, image: &[u8], mime: &str) -> Result<String> {
        self.generate(json!({
            "contents": [{ "parts": [
                { "text": prompt },
                { "inline_data": { "mime_type": mime, "data": BASE64.encode(image) } }
            ] }]
        }))
        .await
    }
}
