//! HTTP clients for the supported LLM providers.
//!
//! A model identifier routes to exactly one provider; the three chat APIs
//! are wrapped behind a single [`ProviderClient::complete`] call with typed
//! response deserialization and provider-tagged errors.

use std::time::Duration;

use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;

use crate::GeneratorError;

const OPENAI_BASE_URL: &str = "https://api.openai.com/";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/";
const PERPLEXITY_BASE_URL: &str = "https://api.perplexity.ai/";

const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MAX_TOKENS: u32 = 1024;

/// The third-party LLM providers a model can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
    Perplexity,
}

impl Provider {
    /// Route a model identifier to its provider.
    ///
    /// `claude*` goes to Anthropic, `sonar*` to Perplexity, everything else
    /// (`gpt-*`, `o*`, fine-tunes) to OpenAI.
    #[must_use]
    pub fn for_model(model: &str) -> Self {
        let lower = model.to_ascii_lowercase();
        if lower.starts_with("claude") {
            Provider::Anthropic
        } else if lower.starts_with("sonar") {
            Provider::Perplexity
        } else {
            Provider::OpenAi
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::OpenAi => write!(f, "openai"),
            Provider::Anthropic => write!(f, "anthropic"),
            Provider::Perplexity => write!(f, "perplexity"),
        }
    }
}

/// API keys per provider; a missing key fails requests to that provider only.
#[derive(Debug, Clone, Default)]
pub struct ProviderKeys {
    pub openai: Option<String>,
    pub anthropic: Option<String>,
    pub perplexity: Option<String>,
}

impl ProviderKeys {
    /// Pull keys out of the loaded application config.
    #[must_use]
    pub fn from_app_config(config: &copychef_core::AppConfig) -> Self {
        Self {
            openai: config.openai_api_key.clone(),
            anthropic: config.anthropic_api_key.clone(),
            perplexity: config.perplexity_api_key.clone(),
        }
    }
}

/// Chat-completion client covering all three providers.
///
/// Use [`ProviderClient::new`] for production or
/// [`ProviderClient::with_base_urls`] to point at a mock server in tests.
pub struct ProviderClient {
    client: Client,
    keys: ProviderKeys,
    openai_base: Url,
    anthropic_base: Url,
    perplexity_base: Url,
}

impl ProviderClient {
    /// Creates a client pointed at the production provider endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`GeneratorError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(keys: ProviderKeys, timeout_secs: u64) -> Result<Self, GeneratorError> {
        Self::with_base_urls(
            keys,
            timeout_secs,
            OPENAI_BASE_URL,
            ANTHROPIC_BASE_URL,
            PERPLEXITY_BASE_URL,
        )
    }

    /// Creates a client with custom base URLs (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`GeneratorError::Http`] if the client cannot be constructed,
    /// or [`GeneratorError::InvalidBaseUrl`] if a base URL does not parse.
    pub fn with_base_urls(
        keys: ProviderKeys,
        timeout_secs: u64,
        openai_base: &str,
        anthropic_base: &str,
        perplexity_base: &str,
    ) -> Result<Self, GeneratorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("copychef/0.1 (content-generation)")
            .build()?;

        Ok(Self {
            client,
            keys,
            openai_base: parse_base(openai_base)?,
            anthropic_base: parse_base(anthropic_base)?,
            perplexity_base: parse_base(perplexity_base)?,
        })
    }

    /// The shared HTTP client, reused for webhook delivery.
    #[must_use]
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    /// Send one prompt to the provider the model routes to and return the
    /// completion text.
    ///
    /// # Errors
    ///
    /// - [`GeneratorError::MissingApiKey`] when the routed provider has no key.
    /// - [`GeneratorError::Api`] on a non-2xx provider response.
    /// - [`GeneratorError::Http`] on network failure.
    /// - [`GeneratorError::Deserialize`] if the body has an unexpected shape.
    /// - [`GeneratorError::EmptyCompletion`] when the provider answers with
    ///   no usable text.
    pub async fn complete(&self, model: &str, prompt: &str) -> Result<String, GeneratorError> {
        let provider = Provider::for_model(model);
        match provider {
            Provider::OpenAi => {
                let key = self.key_for(provider)?;
                let url = join(&self.openai_base, "v1/chat/completions");
                self.openai_style_completion(provider, &url, key, model, prompt)
                    .await
            }
            Provider::Perplexity => {
                let key = self.key_for(provider)?;
                let url = join(&self.perplexity_base, "chat/completions");
                self.openai_style_completion(provider, &url, key, model, prompt)
                    .await
            }
            Provider::Anthropic => self.anthropic_completion(model, prompt).await,
        }
    }

    fn key_for(&self, provider: Provider) -> Result<&str, GeneratorError> {
        let key = match provider {
            Provider::OpenAi => self.keys.openai.as_deref(),
            Provider::Anthropic => self.keys.anthropic.as_deref(),
            Provider::Perplexity => self.keys.perplexity.as_deref(),
        };
        key.ok_or(GeneratorError::MissingApiKey(provider))
    }

    /// OpenAI-compatible chat endpoint (also used by Perplexity).
    async fn openai_style_completion(
        &self,
        provider: Provider,
        url: &Url,
        key: &str,
        model: &str,
        prompt: &str,
    ) -> Result<String, GeneratorError> {
        let body = json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .client
            .post(url.clone())
            .bearer_auth(key)
            .json(&body)
            .send()
            .await?;
        let body = Self::read_body(provider, response).await?;

        let parsed: ChatCompletionResponse =
            serde_json::from_str(&body).map_err(|e| GeneratorError::Deserialize {
                context: format!("{provider} chat completion (model={model})"),
                source: e,
            })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(GeneratorError::EmptyCompletion(provider))
    }

    async fn anthropic_completion(
        &self,
        model: &str,
        prompt: &str,
    ) -> Result<String, GeneratorError> {
        let provider = Provider::Anthropic;
        let key = self.key_for(provider)?;
        let url = join(&self.anthropic_base, "v1/messages");

        let body = json!({
            "model": model,
            "max_tokens": ANTHROPIC_MAX_TOKENS,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .client
            .post(url)
            .header("x-api-key", key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;
        let body = Self::read_body(provider, response).await?;

        let parsed: AnthropicResponse =
            serde_json::from_str(&body).map_err(|e| GeneratorError::Deserialize {
                context: format!("anthropic messages (model={model})"),
                source: e,
            })?;

        let text: String = parsed
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");

        if text.trim().is_empty() {
            return Err(GeneratorError::EmptyCompletion(provider));
        }
        Ok(text)
    }

    /// Collapse a response into its body, mapping non-2xx to [`GeneratorError::Api`].
    async fn read_body(
        provider: Provider,
        response: reqwest::Response,
    ) -> Result<String, GeneratorError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GeneratorError::Api {
                provider,
                status: status.as_u16(),
                message: truncate(&body, 300),
            });
        }
        Ok(body)
    }
}

fn parse_base(raw: &str) -> Result<Url, GeneratorError> {
    // Ensure exactly one trailing slash so join() appends instead of replacing.
    let normalised = format!("{}/", raw.trim_end_matches('/'));
    Url::parse(&normalised).map_err(|_| GeneratorError::InvalidBaseUrl(raw.to_string()))
}

fn join(base: &Url, path: &str) -> Url {
    base.join(path).unwrap_or_else(|_| base.clone())
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicBlock {
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
#[path = "provider_test.rs"]
mod provider_test;
