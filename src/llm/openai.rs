//! Blocking client for OpenAI-compatible chat-completions endpoints.

use super::{ChatRequest, ChatResponse, LlmClient};
use anyhow::{bail, Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 300;

pub struct OpenAiClient {
    http: reqwest::blocking::Client,
    base_url: String,
    api_key: SecretString,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: SecretString) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

impl LlmClient for OpenAiClient {
    fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = self.endpoint();
        tracing::debug!(%url, model = %request.model, messages = request.messages.len(), "chat request");

        let resp = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(request)
            .send()
            .with_context(|| format!("Request to {} failed", url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            bail!("{} returned {}: {}", url, status, body);
        }

        resp.json::<ChatResponse>()
            .context("Failed to parse chat completion response")
    }
}
