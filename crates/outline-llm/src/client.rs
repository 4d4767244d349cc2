use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::error::{LLMError, Result};
use crate::model::ModelClass;
use crate::normalize::normalize_descriptions;
use crate::strategy::{strategy_for, ModelStrategy};
use crate::timer::Timer;
use crate::types::{ChatCompletionResponse, CompletionRequest};

/// Sends one completion request and returns the parsed result object.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value>;

    /// Model the client talks to.
    fn model(&self) -> &str;
}

/// Chat-completions endpoint over HTTP with bearer auth. No retries.
pub struct HttpCompletionClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    class: ModelClass,
}

impl HttpCompletionClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            class: ModelClass::classify(&model),
            model,
        }
    }

    /// Build a client routed through `proxy` when it is non-empty.
    pub fn with_proxy(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        proxy: &str,
    ) -> Result<Self> {
        let mut client = Self::new(endpoint, api_key, model);
        if !proxy.trim().is_empty() {
            client.client = Client::builder().proxy(reqwest::Proxy::all(proxy)?).build()?;
        }
        Ok(client)
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn class(&self) -> ModelClass {
        self.class
    }

    fn strategy(&self) -> &'static dyn ModelStrategy {
        strategy_for(self.class)
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value> {
        let strategy = self.strategy();
        let body = strategy.build_body(&self.model, request);
        let _timer = Timer::new(format!("completion[{}]", self.model));

        log::debug!(
            "Sending {} request to {} ({} chars of prompt)",
            self.class,
            self.endpoint,
            request.user_prompt.len()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            log::error!("Completion request failed with HTTP {}: {}", status, text);
            return Err(LLMError::Transport {
                status: status.as_u16(),
                body: text,
            });
        }

        let text = response.text().await?;
        let parsed: ChatCompletionResponse = serde_json::from_str(&text)
            .map_err(|e| LLMError::malformed(format!("response body: {e}"), &text))?;
        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| LLMError::malformed("response has no choices", &text))?;

        let value = strategy.parse_message(&message)?;
        if request.normalize {
            Ok(normalize_descriptions(value, &request.content_field))
        } else {
            Ok(value)
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}
