use async_trait::async_trait;
use reqwest::Client;

use super::wire::{WireError, WireRequest, WireResponse};
use super::{ActiveKey, ModelGateway};
use crate::config::GeminiConfig;
use crate::error::{ReplicatorError, Result};

/// Client for a `/api/gemini` style proxy that holds no key of its own;
/// the active key travels in every request body.
pub struct ProxyGateway {
    client: Client,
    endpoint: String,
    model: String,
    active_key: ActiveKey,
}

impl ProxyGateway {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            active_key: ActiveKey::default(),
        }
    }

    pub fn from_config(config: &GeminiConfig) -> Self {
        Self::new(config.proxy_url(), config.model())
    }
}

#[async_trait]
impl ModelGateway for ProxyGateway {
    fn activate_key(&self, api_key: &str) {
        self.active_key.set(api_key);
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn send(
        &self,
        prompt: &str,
        images: &[String],
        system_instruction: Option<&str>,
    ) -> Result<String> {
        let api_key = self.active_key.get()?;

        let request = WireRequest {
            api_key: Some(api_key),
            prompt: Some(prompt.to_string()),
            images: (!images.is_empty()).then(|| images.to_vec()),
            system_instruction: system_instruction.map(str::to_string),
            model: Some(self.model.clone()),
        };

        tracing::debug!("Posting to proxy {} ({} images)", self.endpoint, images.len());

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                ReplicatorError::transport(format!("Failed to reach {}: {}", self.endpoint, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<WireError>()
                .await
                .map(|e| e.error)
                .unwrap_or_else(|_| {
                    format!("API request failed with status {}", status.as_u16())
                });
            return Err(ReplicatorError::Transport(message));
        }

        let body: WireResponse = response.json().await.map_err(|e| {
            ReplicatorError::transport(format!("Failed to read proxy response: {}", e))
        })?;
        Ok(body.text)
    }
}
