use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use crate::languages::LanguageCode;

/// Length of one scene window in seconds
pub const SAMPLING_INTERVAL_SECS: f64 = 8.0;

/// Scenes sent to the model per request
pub const BATCH_SIZE: usize = 5;

/// Number of whole scene windows in a video of `duration` seconds
pub fn scene_count(duration: f64) -> usize {
    if !duration.is_finite() || duration <= 0.0 {
        return 0;
    }
    (duration / SAMPLING_INTERVAL_SECS).floor() as usize
}

pub fn batch_count(total_scenes: usize) -> usize {
    total_scenes.div_ceil(BATCH_SIZE)
}

/// Scene indices covered by `batch_index`; the last batch may be short.
pub fn batch_window(batch_index: usize, total_scenes: usize) -> Range<usize> {
    let start = (batch_index * BATCH_SIZE).min(total_scenes);
    let end = (start + BATCH_SIZE).min(total_scenes);
    start..end
}

/// `MM:SS-MM:SS`
pub fn format_time_range(start_secs: f64, end_secs: f64) -> String {
    fn clock(seconds: f64) -> String {
        let total = seconds.max(0.0).floor() as u64;
        format!("{:02}:{:02}", total / 60, total % 60)
    }
    format!("{}-{}", clock(start_secs), clock(end_secs))
}

pub fn scene_time_range(scene_index: usize) -> String {
    let start = scene_index as f64 * SAMPLING_INTERVAL_SECS;
    format_time_range(start, start + SAMPLING_INTERVAL_SECS)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    /// seconds
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub format: String,
    pub file_name: String,
    /// bytes
    pub file_size: u64,
}

/// One sampled still, as a `data:<mime>;base64,...` URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFrame {
    pub scene_index: usize,
    pub timestamp: f64,
    pub time_range: String,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FidelityElement {
    pub factor: String,
    pub description: String,
    pub value: String,
}

impl FidelityElement {
    pub fn new(factor: &str, description: &str, value: &str) -> Self {
        Self {
            factor: factor.to_string(),
            description: description.to_string(),
            value: value.to_string(),
        }
    }
}

/// Visual fingerprint of a video, derived once and shared by every prompt batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStyleToken {
    pub art_style: String,
    pub render_quality: String,
    pub line_weight: String,
    pub line_style: String,
    pub color_palette: Vec<String>,
    pub color_harmony: String,
    pub shading_style: String,
    pub contrast_level: String,
    pub camera_style: String,
    pub lens_character: String,
    pub motion_style: String,
    pub physics_realism: String,
    pub background_style: String,
    pub depth_treatment: String,
    pub text_style: String,
    pub text_animation: String,
    pub token_string: String,
    pub fidelity_elements: Vec<FidelityElement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OcrPosition {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrStyle {
    pub font_style: String,
    pub font_size: String,
    pub color: String,
}

impl Default for OcrStyle {
    fn default() -> Self {
        Self {
            font_style: "sans-serif".to_string(),
            font_size: "medium".to_string(),
            color: "#ffffff".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrText {
    pub text: String,
    pub position: OcrPosition,
    pub style: OcrStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPrompt {
    pub scene_index: usize,
    pub time_range: String,
    pub image_prompt: String,
    pub video_prompt: String,
    pub shot_type: String,
    pub ocr_text: Vec<OcrText>,
    pub quality_score: u32,
    pub missing_factors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Narrative,
    Dramatic,
    Informative,
    Conversational,
}

impl Tone {
    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Narrative => "narrative",
            Tone::Dramatic => "dramatic",
            Tone::Informative => "informative",
            Tone::Conversational => "conversational",
        }
    }

    /// Lenient parse used on model output; anything unknown is `None`
    pub fn parse_lenient(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "narrative" => Some(Tone::Narrative),
            "dramatic" => Some(Tone::Dramatic),
            "informative" => Some(Tone::Informative),
            "conversational" => Some(Tone::Conversational),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceoverScript {
    pub scene_index: usize,
    pub time_range: String,
    pub language: LanguageCode,
    pub script: String,
    pub word_count: usize,
    pub estimated_duration: f64,
    pub tone: Tone,
}

/// Whitespace-delimited token count
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VoiceoverMode {
    #[default]
    #[serde(rename = "global")]
    Global,
    #[serde(rename = "per-scene")]
    PerScene,
}

impl FromStr for VoiceoverMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "global" => Ok(VoiceoverMode::Global),
            "per-scene" | "per_scene" | "perscene" => Ok(VoiceoverMode::PerScene),
            other => Err(format!(
                "unknown voiceover mode '{}' (expected global or per-scene)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceoverSettings {
    pub mode: VoiceoverMode,
    pub default_language: LanguageCode,
    #[serde(default)]
    pub scene_overrides: BTreeMap<usize, LanguageCode>,
}

impl VoiceoverSettings {
    /// Language a scene should be narrated in under the current mode
    pub fn effective_language(&self, scene_index: usize) -> LanguageCode {
        match self.mode {
            VoiceoverMode::Global => self.default_language,
            VoiceoverMode::PerScene => self
                .scene_overrides
                .get(&scene_index)
                .copied()
                .unwrap_or(self.default_language),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisState {
    #[default]
    Idle,
    Uploading,
    ExtractingMetadata,
    AwaitingConfirmation,
    ExtractingFrames,
    DetectingStyle,
    GeneratingPrompts,
    GeneratingVoiceovers,
    /// Reserved for an external quality scorer
    Validating,
    Complete,
    Error,
}

impl AnalysisState {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisState::Idle => "IDLE",
            AnalysisState::Uploading => "UPLOADING",
            AnalysisState::ExtractingMetadata => "EXTRACTING_METADATA",
            AnalysisState::AwaitingConfirmation => "AWAITING_CONFIRMATION",
            AnalysisState::ExtractingFrames => "EXTRACTING_FRAMES",
            AnalysisState::DetectingStyle => "DETECTING_STYLE",
            AnalysisState::GeneratingPrompts => "GENERATING_PROMPTS",
            AnalysisState::GeneratingVoiceovers => "GENERATING_VOICEOVERS",
            AnalysisState::Validating => "VALIDATING",
            AnalysisState::Complete => "COMPLETE",
            AnalysisState::Error => "ERROR",
        }
    }
}

impl fmt::Display for AnalysisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
