pub mod prompts;

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;

const DEFAULT_TIMEOUT_SECONDS: u64 = 300;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// A chat-completion model, used for planning changes and generating diffs.
pub trait ChatModel {
    /// Send one system/user exchange and return the assistant's reply text.
    fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Client for an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct ChatClient {
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl ChatClient {
    /// Build a client from config, reading the API key from the environment
    /// variable named in `llm.api_key_env`.
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = std::env::var(&config.llm.api_key_env).with_context(|| {
            format!(
                "API key environment variable {} is not set",
                config.llm.api_key_env
            )
        })?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            base_url: config.llm.base_url.clone(),
            model: config.llm.model.clone(),
            api_key,
            temperature: config.llm.temperature,
            agent,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Endpoint URL, preserving any path prefix on the base URL (`/v1`
    /// style bases must not lose their last segment).
    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl ChatModel for ChatClient {
    fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user.to_string(),
                },
            ],
            temperature: self.temperature,
        };

        let url = self.completions_url();
        let request_json =
            serde_json::to_string(&request).context("Failed to serialize chat request")?;

        debug!(
            "Requesting chat completion from {} (user prompt: {} chars)",
            url,
            user.len()
        );

        let mut last_error = None;
        for attempt in 1..=self.retry_attempts {
            let result = self
                .agent
                .post(&url)
                .header("Content-Type", "application/json")
                .header("Authorization", &format!("Bearer {}", self.api_key))
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string());

            match result {
                Ok(response_text) => {
                    let response: ChatResponse = serde_json::from_str(&response_text)
                        .context("Failed to parse chat completion response")?;
                    let choice = response
                        .choices
                        .into_iter()
                        .next()
                        .context("Chat completion response contained no choices")?;
                    return Ok(choice.message.content);
                }
                Err(error) => {
                    let retryable = matches!(
                        &error,
                        ureq::Error::StatusCode(status) if *status >= 500
                    ) || matches!(
                        &error,
                        ureq::Error::ConnectionFailed
                            | ureq::Error::HostNotFound
                            | ureq::Error::Timeout(_)
                            | ureq::Error::Io(_)
                    );

                    if !retryable {
                        return Err(anyhow::anyhow!("Chat completion failed: {}", error));
                    }

                    warn!(
                        "Chat completion attempt {}/{} failed: {}",
                        attempt, self.retry_attempts, error
                    );
                    last_error = Some(anyhow::anyhow!("Request error: {}", error));

                    if attempt < self.retry_attempts {
                        let delay_ms = EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000;
                        std::thread::sleep(Duration::from_millis(delay_ms));
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Chat completion failed after retries")))
    }
}
