use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ActiveKey, ModelGateway};
use crate::config::GeminiConfig;
use crate::data_url;
use crate::error::{ReplicatorError, Result};

/// Direct client for the Gemini `generateContent` endpoint
pub struct GeminiGateway {
    client: Client,
    base_url: String,
    model: String,
    active_key: ActiveKey,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: String,
}

impl GenerateResponse {
    fn into_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

fn build_request(prompt: &str, images: &[String], system_instruction: Option<&str>) -> GenerateRequest {
    let mut parts: Vec<Part> = images
        .iter()
        .filter_map(|url| data_url::split(url))
        .map(|(mime, data)| Part::InlineData {
            inline_data: InlineData {
                mime_type: mime.to_string(),
                data: data.to_string(),
            },
        })
        .collect();
    parts.push(Part::Text {
        text: prompt.to_string(),
    });

    GenerateRequest {
        contents: vec![Content {
            role: Some("user"),
            parts,
        }],
        system_instruction: system_instruction.filter(|s| !s.is_empty()).map(|s| Content {
            role: None,
            parts: vec![Part::Text {
                text: s.to_string(),
            }],
        }),
    }
}

impl GeminiGateway {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            active_key: ActiveKey::default(),
        }
    }

    pub fn from_config(config: &GeminiConfig) -> Self {
        Self::new(config.base_url(), config.model())
    }

    /// One `generateContent` call with an explicit key and model
    pub async fn generate(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
        images: &[String],
        system_instruction: Option<&str>,
    ) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        );
        let request = build_request(prompt, images, system_instruction);

        tracing::debug!("Sending Gemini request: model={} images={}", model, images.len());

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ReplicatorError::transport(format!("Failed to reach Gemini: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ProviderError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(ReplicatorError::transport(format!(
                "Gemini API error ({}): {}",
                status, message
            )));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            ReplicatorError::transport(format!("Failed to read Gemini response: {}", e))
        })?;

        parsed
            .into_text()
            .ok_or_else(|| ReplicatorError::transport("No content in Gemini response"))
    }
}

#[async_trait]
impl ModelGateway for GeminiGateway {
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
        self.generate(&api_key, &self.model, prompt, images, system_instruction)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn images_precede_text_and_non_data_urls_are_skipped() {
        let images = vec![
            "data:image/png;base64,AAA".to_string(),
            "not-a-data-url".to_string(),
        ];
        let request = build_request("describe", &images, Some("be terse"));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        { "inlineData": { "mimeType": "image/png", "data": "AAA" } },
                        { "text": "describe" }
                    ]
                }],
                "systemInstruction": { "parts": [{ "text": "be terse" }] }
            })
        );
    }

    #[test]
    fn response_text_joins_first_candidate_parts() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [
                { "content": { "parts": [{ "text": "[1," }, { "text": "2]" }] } },
                { "content": { "parts": [{ "text": "ignored" }] } }
            ]
        }))
        .unwrap();
        assert_eq!(response.into_text().as_deref(), Some("[1,2]"));

        let empty: GenerateResponse = serde_json::from_value(json!({})).unwrap();
        assert!(empty.into_text().is_none());
    }

    #[tokio::test]
    async fn send_without_key_fails_before_network() {
        let gateway = GeminiGateway::new("http://127.0.0.1:9", "m");
        let err = gateway.send("hi", &[], None).await.unwrap_err();
        assert!(matches!(err, ReplicatorError::Auth(_)));
    }
}
