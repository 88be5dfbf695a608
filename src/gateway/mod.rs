pub mod gemini;
pub mod parse;
pub mod proxy;
pub mod wire;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::GeminiConfig;
use crate::error::{ReplicatorError, Result};

pub use gemini::GeminiGateway;
pub use parse::{parse_structured, strip_code_fences};
pub use proxy::ProxyGateway;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-05-20";

/// Transport to the remote generative model.
///
/// Implementations never retry; key rotation is the caller's job.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Make `api_key` the key used by subsequent calls
    fn activate_key(&self, api_key: &str);

    fn model(&self) -> &str;

    /// Send a prompt with optional data-URL images and return the raw completion text
    async fn send(
        &self,
        prompt: &str,
        images: &[String],
        system_instruction: Option<&str>,
    ) -> Result<String>;
}

/// The key a gateway is currently sending with
#[derive(Debug, Default)]
pub struct ActiveKey(RwLock<Option<String>>);

impl ActiveKey {
    pub fn set(&self, api_key: &str) {
        let mut guard = self.0.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(api_key.to_string());
    }

    pub fn get(&self) -> Result<String> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                ReplicatorError::Auth(
                    "no active API key. Add one with `scene-replicator keys add <KEY>`".to_string(),
                )
            })
    }
}

/// Build the gateway selected by `[gemini].transport`
pub fn from_config(config: &GeminiConfig) -> Result<Arc<dyn ModelGateway>> {
    match config.transport.as_str() {
        "direct" => Ok(Arc::new(GeminiGateway::from_config(config))),
        "proxy" => Ok(Arc::new(ProxyGateway::from_config(config))),
        other => Err(ReplicatorError::Config(format!(
            "unknown transport '{}' (expected direct or proxy)",
            other
        ))),
    }
}
