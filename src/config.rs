use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::export::ExportFormat;
use crate::gateway::DEFAULT_MODEL;
use crate::keys::KeyPool;
use crate::languages::LanguageCode;
use crate::model::{VoiceoverMode, VoiceoverSettings};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_PROXY_URL: &str = "http://localhost:8787/api/gemini";

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub voiceover: VoiceoverConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub output: OutputConfig,
    /// File this config was read from; `write` goes back there
    #[serde(skip)]
    path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GeminiConfig {
    /// `direct` or `proxy`
    #[serde(default = "default_transport")]
    pub transport: String,
    #[serde(default)]
    pub api_keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
    /// Keys picked up from the environment; never written back
    #[serde(skip)]
    pub env_keys: Vec<String>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            api_keys: Vec::new(),
            model: None,
            base_url: None,
            proxy_url: None,
            env_keys: Vec::new(),
        }
    }
}

impl GeminiConfig {
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn proxy_url(&self) -> &str {
        self.proxy_url.as_deref().unwrap_or(DEFAULT_PROXY_URL)
    }

    /// Configured keys, or the environment's when none are configured
    pub fn effective_keys(&self) -> &[String] {
        if self.api_keys.is_empty() {
            &self.env_keys
        } else {
            &self.api_keys
        }
    }
}

fn default_transport() -> String {
    "direct".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AnalysisConfig {
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            batch_delay_ms: default_batch_delay_ms(),
        }
    }
}

impl AnalysisConfig {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

fn default_batch_delay_ms() -> u64 {
    2000
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct VoiceoverConfig {
    #[serde(default)]
    pub mode: VoiceoverMode,
    #[serde(default)]
    pub default_language: LanguageCode,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct MediaConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffmpeg_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffprobe_path: Option<String>,
}

impl MediaConfig {
    pub fn ffmpeg_path(&self) -> &str {
        self.ffmpeg_path.as_deref().unwrap_or("ffmpeg")
    }

    pub fn ffprobe_path(&self) -> &str {
        self.ffprobe_path.as_deref().unwrap_or("ffprobe")
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_format")]
    pub default_format: String,
    /// Write an export automatically when an analysis completes
    #[serde(default = "default_auto_save")]
    pub auto_save: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_format: default_format(),
            auto_save: default_auto_save(),
            dir: None,
        }
    }
}

impl OutputConfig {
    pub fn format(&self) -> Result<ExportFormat> {
        self.default_format
            .parse()
            .map_err(|e: String| anyhow::anyhow!("[output] default_format: {}", e))
    }
}

fn default_format() -> String {
    "txt".to_string()
}

fn default_auto_save() -> bool {
    true
}

/// Split a comma separated key list, dropping blanks
pub fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    /// Load config from file or default location
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p.to_path_buf()
        } else {
            Self::default_path()
        };

        let mut config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config from {:?}", config_path))?;
            toml::from_str::<Config>(&contents)
                .with_context(|| format!("Failed to parse config from {:?}", config_path))?
        } else {
            Config::default()
        };

        config.path = Some(config_path);
        config.apply_env_fallbacks();
        Ok(config)
    }

    /// Default config path: ~/.config/scene-replicator/config.toml
    pub fn default_path() -> PathBuf {
        if let Some(home) = dirs::home_dir() {
            let xdg_path = home
                .join(".config")
                .join("scene-replicator")
                .join("config.toml");
            if xdg_path.exists() {
                return xdg_path;
            }
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scene-replicator")
            .join("config.toml")
    }

    pub fn path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(Self::default_path)
    }

    /// GEMINI_API_KEYS (comma separated), then GEMINI_API_KEY
    fn apply_env_fallbacks(&mut self) {
        if !self.gemini.api_keys.is_empty() {
            return;
        }
        self.gemini.env_keys = std::env::var("GEMINI_API_KEYS")
            .ok()
            .map(|raw| parse_key_list(&raw))
            .filter(|keys| !keys.is_empty())
            .or_else(|| std::env::var("GEMINI_API_KEY").ok().map(|k| parse_key_list(&k)))
            .unwrap_or_default();
    }

    pub fn key_pool(&self) -> KeyPool {
        KeyPool::new(self.gemini.effective_keys().iter().cloned())
    }

    pub fn voiceover_settings(&self) -> VoiceoverSettings {
        VoiceoverSettings {
            mode: self.voiceover.mode,
            default_language: self.voiceover.default_language,
            scene_overrides: Default::default(),
        }
    }

    /// Add a key to the persisted pool; duplicates are ignored
    pub fn add_key(&mut self, key: &str) -> bool {
        let key = key.trim();
        if key.is_empty() || self.gemini.api_keys.iter().any(|k| k == key) {
            return false;
        }
        self.gemini.api_keys.push(key.to_string());
        true
    }

    /// Remove a persisted key by 1-based position
    pub fn remove_key(&mut self, position: usize) -> Result<String> {
        let count = self.gemini.api_keys.len();
        if position == 0 || position > count {
            anyhow::bail!("No key #{} (the config holds {} keys)", position, count);
        }
        Ok(self.gemini.api_keys.remove(position - 1))
    }

    /// Write config to the file it was loaded from
    pub fn write(&self) -> Result<()> {
        let path = self.path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&path, toml_str)
            .with_context(|| format!("Failed to write config to {:?}", path))?;
        Ok(())
    }
}
