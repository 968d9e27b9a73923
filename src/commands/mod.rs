pub mod evaluate;
pub mod generate;
pub mod inventory;
pub mod status;

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::cli::ServiceArgs;
use crate::client::OpenAiChatClient;
use crate::client::openai::API_KEY_ENV;

pub fn resolve_api_key(service: &ServiceArgs) -> Result<String> {
    if let Some(key) = service.api_key.as_deref().filter(|key| !key.trim().is_empty()) {
        return Ok(key.trim().to_string());
    }

    env::var(API_KEY_ENV)
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .with_context(|| format!("no API key: pass --api-key or set {API_KEY_ENV}"))
}

pub fn build_service_client(service: &ServiceArgs, timeout: Duration) -> Result<OpenAiChatClient> {
    let api_key = resolve_api_key(service)?;
    OpenAiChatClient::new(&service.api_base, &api_key, timeout)
}
