use serde::Deserialize;
use serde_json::Value;

use super::{loose_number, non_empty, prompts};
use crate::error::{ReplicatorError, Result};
use crate::gateway::{parse_structured, ModelGateway};
use crate::languages::LanguageCode;
use crate::model::{count_words, scene_time_range, Tone, VoiceoverScript, SAMPLING_INTERVAL_SECS};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawVoiceover {
    pub script: Option<String>,
    /// Number or numeric string
    pub word_count: Option<Value>,
    pub estimated_duration: Option<Value>,
    pub tone: Option<String>,
}

/// Narrate a batch of frames in one language; array position `i` is scene
/// `start_scene_index + i`.
pub async fn generate_batch<G>(
    gateway: &G,
    frames: &[String],
    language: LanguageCode,
    start_scene_index: usize,
) -> Result<Vec<VoiceoverScript>>
where
    G: ModelGateway + ?Sized,
{
    if frames.is_empty() {
        return Err(ReplicatorError::invalid_input("at least one frame is required"));
    }

    tracing::info!(
        "Generating {} voiceovers in {}",
        frames.len(),
        language.name()
    );

    let instruction =
        prompts::build_voiceover_batch_prompt(frames.len(), language.name(), language.code());
    let text = gateway.send(&instruction, frames, None).await?;
    let mut raw: Vec<RawVoiceover> = parse_structured(&text)?;

    if raw.len() != frames.len() {
        tracing::warn!(
            "Voiceover batch returned {} scripts for {} frames",
            raw.len(),
            frames.len()
        );
        raw.truncate(frames.len());
    }

    Ok(raw
        .into_iter()
        .enumerate()
        .map(|(i, raw)| fill_voiceover_defaults(raw, start_scene_index + i, language))
        .collect())
}

/// Narrate one scene, optionally continuing from the previous scene's script
pub async fn generate_single<G>(
    gateway: &G,
    frame: &str,
    language: LanguageCode,
    scene_index: usize,
    previous_script: Option<&str>,
) -> Result<VoiceoverScript>
where
    G: ModelGateway + ?Sized,
{
    if frame.is_empty() {
        return Err(ReplicatorError::invalid_input("a frame is required"));
    }

    tracing::info!("Narrating scene {} in {}", scene_index + 1, language.name());

    let instruction = prompts::build_single_voiceover_prompt(language.name(), previous_script);
    let images = [frame.to_string()];
    let text = gateway
        .send(&instruction, &images, Some(prompts::VOICEOVER_SYSTEM))
        .await?;
    let raw: RawVoiceover = parse_structured(&text)?;

    Ok(fill_voiceover_defaults(raw, scene_index, language))
}

pub fn fill_voiceover_defaults(
    raw: RawVoiceover,
    scene_index: usize,
    language: LanguageCode,
) -> VoiceoverScript {
    let script = non_empty(raw.script).unwrap_or_default();
    let word_count = positive_number(raw.word_count.as_ref())
        .map(|n| n.round() as usize)
        .filter(|n| *n > 0)
        .unwrap_or_else(|| count_words(&script));

    VoiceoverScript {
        scene_index,
        time_range: scene_time_range(scene_index),
        language,
        word_count,
        estimated_duration: positive_number(raw.estimated_duration.as_ref())
            .unwrap_or(SAMPLING_INTERVAL_SECS),
        tone: raw
            .tone
            .as_deref()
            .and_then(Tone::parse_lenient)
            .unwrap_or_default(),
        script,
    }
}

fn positive_number(value: Option<&Value>) -> Option<f64> {
    loose_number(value).filter(|n| *n > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::fake::FakeGateway;
    use serde_json::json;

    fn raw(value: Value) -> RawVoiceover {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn word_count_falls_back_to_token_count() {
        let script = fill_voiceover_defaults(
            raw(json!({ "script": "The tide returns  before dawn.", "wordCount": 0 })),
            3,
            LanguageCode::En,
        );
        assert_eq!(script.word_count, 5);
        assert_eq!(script.time_range, "00:24-00:32");
        assert_eq!(script.estimated_duration, 8.0);
        assert_eq!(script.tone, Tone::Narrative);
    }

    #[test]
    fn model_values_are_kept_when_sensible() {
        let script = fill_voiceover_defaults(
            raw(json!({ "script": "a b", "wordCount": "24", "estimatedDuration": 7.5, "tone": "Dramatic" })),
            0,
            LanguageCode::Fr,
        );
        assert_eq!(script.word_count, 24);
        assert_eq!(script.estimated_duration, 7.5);
        assert_eq!(script.tone, Tone::Dramatic);
        assert_eq!(script.language, LanguageCode::Fr);
    }

    #[test]
    fn unknown_tone_defaults_to_narrative() {
        let script = fill_voiceover_defaults(raw(json!({ "tone": "whimsical" })), 0, LanguageCode::En);
        assert_eq!(script.tone, Tone::Narrative);
        assert_eq!(script.script, "");
        assert_eq!(script.word_count, 0);
    }

    #[tokio::test]
    async fn batch_names_language_and_maps_positions() {
        let reply = json!([
            { "sceneIndex": 7, "script": "Một ngày mới bắt đầu." },
            { "script": "Gió thổi qua cánh đồng.", "tone": "informative" }
        ]);
        let gateway = FakeGateway::replying(&format!("```json\n{}\n```", reply));
        let frames = vec!["data:image/jpeg;base64,A".to_string(); 2];

        let scripts = generate_batch(&gateway, &frames, LanguageCode::Vi, 10).await.unwrap();

        assert_eq!(scripts[0].scene_index, 10);
        assert_eq!(scripts[1].scene_index, 11);
        assert_eq!(scripts[1].tone, Tone::Informative);
        assert!(gateway.calls()[0].prompt.contains("in Vietnamese (vi)"));
    }

    #[tokio::test]
    async fn single_scene_uses_system_instruction_and_previous_script() {
        let gateway = FakeGateway::replying(r#"{"script": "And so it ends."}"#);
        let script = generate_single(
            &gateway,
            "data:image/jpeg;base64,A",
            LanguageCode::En,
            4,
            Some("It began at dawn."),
        )
        .await
        .unwrap();

        assert_eq!(script.scene_index, 4);
        assert_eq!(script.word_count, 4);
        let call = &gateway.calls()[0];
        assert_eq!(call.system_instruction.as_deref(), Some(prompts::VOICEOVER_SYSTEM));
        assert!(call.prompt.contains("It began at dawn."));
        assert_eq!(call.images.len(), 1);
    }

    #[tokio::test]
    async fn empty_frames_are_rejected() {
        let gateway = FakeGateway::replying("[]");
        let err = generate_batch(&gateway, &[], LanguageCode::En, 0).await.unwrap_err();
        assert!(matches!(err, ReplicatorError::InvalidInput(_)));
    }
}
