use anyhow::{anyhow, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;

use crate::pacer::Pacer;
use crate::types::{ChatRequest, ChatResponse};

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Chat-completions client for a Groq-compatible endpoint.
///
/// All calls through one client share its `Pacer`, so the minimum
/// spacing between requests to the upstream endpoint holds globally,
/// not per caller.
pub struct ChatClient {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
    pacer: Pacer,
}

impl ChatClient {
    pub fn new(api_key: &str, pacer: Pacer) -> Self {
        Self {
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            pacer,
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Send a chat request and return the first choice's text.
    pub async fn chat(&self, request: &ChatRequest) -> Result<String> {
        self.pacer.wait_turn().await;

        let url = format!("{}/chat/completions", self.base_url);

        debug!(model = %request.model, "chat request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("Chat API error ({}): {}", status, error_text));
        }

        let chat_response: ChatResponse = response.json().await?;
        chat_response
            .text()
            .ok_or_else(|| anyhow!("Chat API returned no content"))
    }
}
