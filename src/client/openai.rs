use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use serde_json::{Value, json};

use super::{CompletionRequest, ModelClient};
use crate::error::ServiceError;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

const ERROR_BODY_LIMIT: usize = 400;

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct OpenAiChatClient {
    http: Client,
    api_base: String,
    api_key: String,
}

impl OpenAiChatClient {
    pub fn new(api_base: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("failed to build model service HTTP client")?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

impl ModelClient for OpenAiChatClient {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, ServiceError> {
        let url = format!("{}/chat/completions", self.api_base);
        let body = build_request_body(request);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|err| ServiceError::permanent(format!("request to {url} failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .map(ToOwned::to_owned);
            let text = response.text().unwrap_or_default();
            return Err(classify_failure(status, retry_after.as_deref(), &text));
        }

        let envelope: Value = response
            .json()
            .map_err(|err| ServiceError::permanent(format!("unreadable response body: {err}")))?;
        extract_content(&envelope)
    }
}

fn build_request_body(request: &CompletionRequest<'_>) -> Value {
    let mut body = json!({
        "model": request.model,
        "temperature": request.temperature,
        "messages": [
            {"role": "system", "content": request.system_prompt},
            {"role": "user", "content": request.user_prompt}
        ]
    });

    if request.json_response {
        body["response_format"] = json!({"type": "json_object"});
    }
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }

    body
}

fn classify_failure(status: StatusCode, retry_after: Option<&str>, body: &str) -> ServiceError {
    let message = truncate(body.trim(), ERROR_BODY_LIMIT);
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ServiceError::Transient {
            status: status.as_u16(),
            message,
            retry_after: retry_after
                .and_then(|value| value.trim().parse::<f64>().ok())
                .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
                .map(Duration::from_secs_f64),
        };
    }

    ServiceError::Permanent {
        status: Some(status.as_u16()),
        message: format!("{status}: {message}"),
    }
}

fn extract_content(envelope: &Value) -> Result<String, ServiceError> {
    envelope["choices"][0]["message"]["content"]
        .as_str()
        .map(ToOwned::to_owned)
        .ok_or_else(|| ServiceError::permanent("unexpected response structure: no message content"))
}

fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((index, _)) => format!("{}...", &text[..index]),
        None => text.to_string(),
    }
}
