use serde::Deserialize;
use serde_json::Value;

use super::{ensure_style_marker, loose_number, loose_text, prompts};
use crate::error::{ReplicatorError, Result};
use crate::gateway::{parse_structured, ModelGateway};
use crate::model::{scene_time_range, GeneratedPrompt, OcrPosition, OcrStyle, OcrText};

pub const DEFAULT_SHOT_TYPE: &str = "Medium Shot";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawScenePrompt {
    pub time_range: Option<Value>,
    pub shot_type: Option<Value>,
    pub image_prompt: Option<Value>,
    pub video_prompt: Option<Value>,
    /// Entries that are not objects are dropped one at a time
    pub ocr_text: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawOcrText {
    pub text: Option<Value>,
    pub position: Option<Value>,
    pub style: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawOcrPosition {
    pub x: Option<Value>,
    pub y: Option<Value>,
    pub width: Option<Value>,
    pub height: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawOcrStyle {
    pub font_style: Option<Value>,
    pub font_size: Option<Value>,
    pub color: Option<Value>,
}

/// Turn a batch of frames into image/motion prompt pairs.
///
/// Array position `i` of the reply becomes scene `start_scene_index + i`;
/// any `sceneIndex` the model echoes back is ignored.
pub async fn generate_batch<G>(
    gateway: &G,
    frames: &[String],
    batch_index: usize,
    style_token: &str,
    start_scene_index: usize,
) -> Result<Vec<GeneratedPrompt>>
where
    G: ModelGateway + ?Sized,
{
    if frames.is_empty() {
        return Err(ReplicatorError::invalid_input("at least one frame is required"));
    }

    tracing::info!(
        "Generating prompt batch {} with {} frames",
        batch_index + 1,
        frames.len()
    );

    let instruction = prompts::build_batch_prompt(batch_index, frames.len(), style_token);
    let text = gateway.send(&instruction, frames, None).await?;
    let mut raw: Vec<RawScenePrompt> = parse_structured(&text)?;

    if raw.len() != frames.len() {
        tracing::warn!(
            "Batch {} returned {} prompts for {} frames",
            batch_index + 1,
            raw.len(),
            frames.len()
        );
        raw.truncate(frames.len());
    }

    Ok(raw
        .into_iter()
        .enumerate()
        .map(|(i, raw)| fill_prompt_defaults(raw, start_scene_index + i))
        .collect())
}

pub fn fill_prompt_defaults(raw: RawScenePrompt, scene_index: usize) -> GeneratedPrompt {
    let ocr_text = match raw.ocr_text {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<RawOcrText>(item).ok())
            .map(fill_ocr_defaults)
            .collect(),
        _ => Vec::new(),
    };

    GeneratedPrompt {
        scene_index,
        time_range: loose_text(raw.time_range).unwrap_or_else(|| scene_time_range(scene_index)),
        image_prompt: ensure_style_marker(&loose_text(raw.image_prompt).unwrap_or_default()),
        video_prompt: ensure_style_marker(&loose_text(raw.video_prompt).unwrap_or_default()),
        shot_type: loose_text(raw.shot_type).unwrap_or_else(|| DEFAULT_SHOT_TYPE.to_string()),
        ocr_text,
        quality_score: 0,
        missing_factors: Vec::new(),
    }
}

/// Fills each OCR sub-field on its own; a value of the wrong type counts as missing
fn fill_ocr_defaults(raw: RawOcrText) -> OcrText {
    let position: RawOcrPosition = raw
        .position
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();
    let style: RawOcrStyle = raw
        .style
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();
    let default_style = OcrStyle::default();

    OcrText {
        text: loose_text(raw.text).unwrap_or_default(),
        position: OcrPosition {
            x: loose_number(position.x.as_ref()).unwrap_or(0.0),
            y: loose_number(position.y.as_ref()).unwrap_or(0.0),
            width: loose_number(position.width.as_ref()).unwrap_or(0.0),
            height: loose_number(position.height.as_ref()).unwrap_or(0.0),
        },
        style: OcrStyle {
            font_style: loose_text(style.font_style).unwrap_or(default_style.font_style),
            font_size: loose_text(style.font_size).unwrap_or(default_style.font_size),
            color: loose_text(style.color).unwrap_or(default_style.color),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::STYLE_TOKEN_MARKER;
    use crate::gateway::fake::FakeGateway;
    use serde_json::json;

    fn frames(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("data:image/jpeg;base64,F{}", i)).collect()
    }

    #[tokio::test]
    async fn positions_map_to_scene_indices() {
        let reply = json!([
            { "sceneIndex": 99, "imagePrompt": "Wide desert at noon." },
            { "sceneIndex": 0, "videoPrompt": "Camera dollies in." }
        ]);
        let gateway = FakeGateway::replying(&reply.to_string());

        let prompts = generate_batch(&gateway, &frames(2), 1, "Cinematic", 5).await.unwrap();

        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0].scene_index, 5);
        assert_eq!(prompts[1].scene_index, 6);
        assert_eq!(prompts[0].time_range, "00:40-00:48");
        assert_eq!(
            prompts[0].image_prompt,
            format!("Wide desert at noon. {}", STYLE_TOKEN_MARKER)
        );
        assert_eq!(prompts[0].video_prompt, STYLE_TOKEN_MARKER);
        assert_eq!(prompts[1].shot_type, DEFAULT_SHOT_TYPE);
        assert_eq!(prompts[1].quality_score, 0);
        assert!(prompts[1].missing_factors.is_empty());

        let calls = gateway.calls();
        assert!(calls[0].prompt.contains("BATCH: 2"));
        assert!(calls[0].prompt.contains("\"Cinematic\""));
        assert_eq!(calls[0].images, frames(2));
    }

    #[tokio::test]
    async fn already_suffixed_prompts_are_unchanged() {
        let suffixed = format!("A lighthouse in fog. {}", STYLE_TOKEN_MARKER);
        let reply = json!([{ "imagePrompt": suffixed, "videoPrompt": suffixed, "timeRange": "00:00-00:08" }]);
        let gateway = FakeGateway::replying(&reply.to_string());

        let first = generate_batch(&gateway, &frames(1), 0, "t", 0).await.unwrap();
        let second = generate_batch(&gateway, &frames(1), 0, "t", 0).await.unwrap();

        assert_eq!(first[0].image_prompt, suffixed);
        assert_eq!(first, second);
    }

    #[test]
    fn ocr_sub_fields_are_defaulted_individually() {
        let raw: RawScenePrompt = serde_json::from_value(json!({
            "ocrText": [
                { "text": "SALE", "position": { "x": 10, "y": 20 }, "style": { "color": "#ff0000" } },
                { "text": "50%" }
            ]
        }))
        .unwrap();

        let prompt = fill_prompt_defaults(raw, 0);

        let first = &prompt.ocr_text[0];
        assert_eq!(first.position, OcrPosition { x: 10.0, y: 20.0, width: 0.0, height: 0.0 });
        assert_eq!(first.style.color, "#ff0000");
        assert_eq!(first.style.font_style, "sans-serif");
        let second = &prompt.ocr_text[1];
        assert_eq!(second.position, OcrPosition::default());
        assert_eq!(second.style, OcrStyle::default());
    }

    #[tokio::test]
    async fn odd_ocr_values_fall_back_per_field() {
        let reply = json!([{
            "imagePrompt": "A shop front.",
            "ocrText": [
                {
                    "text": "SALE",
                    "position": { "x": "10", "y": "top", "width": 40, "height": null },
                    "style": { "fontStyle": 7, "fontSize": ["big"], "color": "" }
                },
                { "text": "OPEN", "position": "center", "style": "bold" },
                "stray string"
            ]
        }]);
        let gateway = FakeGateway::replying(&reply.to_string());

        let prompts = generate_batch(&gateway, &frames(1), 0, "t", 0).await.unwrap();

        let ocr = &prompts[0].ocr_text;
        assert_eq!(ocr.len(), 2);
        assert_eq!(ocr[0].text, "SALE");
        assert_eq!(ocr[0].position, OcrPosition { x: 10.0, y: 0.0, width: 40.0, height: 0.0 });
        assert_eq!(ocr[0].style.font_style, "7");
        assert_eq!(ocr[0].style.font_size, "medium");
        assert_eq!(ocr[0].style.color, "#ffffff");
        assert_eq!(ocr[1].text, "OPEN");
        assert_eq!(ocr[1].position, OcrPosition::default());
        assert_eq!(ocr[1].style, OcrStyle::default());
    }

    #[tokio::test]
    async fn non_string_prompt_fields_are_defaulted() {
        let reply = json!([{ "imagePrompt": 42, "shotType": false, "timeRange": ["00:00"] }]);
        let gateway = FakeGateway::replying(&reply.to_string());

        let prompts = generate_batch(&gateway, &frames(1), 0, "t", 3).await.unwrap();

        assert_eq!(prompts[0].image_prompt, format!("42 {}", STYLE_TOKEN_MARKER));
        assert_eq!(prompts[0].shot_type, DEFAULT_SHOT_TYPE);
        assert_eq!(prompts[0].time_range, scene_time_range(3));
    }

    #[tokio::test]
    async fn extra_elements_are_dropped() {
        let reply = json!([{}, {}, {}]);
        let gateway = FakeGateway::replying(&reply.to_string());
        let prompts = generate_batch(&gateway, &frames(2), 0, "t", 10).await.unwrap();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[1].scene_index, 11);
    }

    #[tokio::test]
    async fn empty_frames_are_rejected() {
        let gateway = FakeGateway::replying("[]");
        let err = generate_batch(&gateway, &[], 0, "t", 0).await.unwrap_err();
        assert!(matches!(err, ReplicatorError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn non_array_reply_is_malformed() {
        let gateway = FakeGateway::replying("Here are your prompts!");
        let err = generate_batch(&gateway, &frames(1), 0, "t", 0).await.unwrap_err();
        assert!(matches!(err, ReplicatorError::MalformedResponse { .. }));
    }
}
