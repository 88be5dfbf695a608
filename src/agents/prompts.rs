use super::STYLE_TOKEN_MARKER;

/// Instruction for the one-shot style extraction call
pub const STYLE_EXTRACTION_PROMPT: &str = r##"You are a cinematic visual analyst reverse-engineering a video so it can be recreated with a generative video model.

Study the sample frames and extract a GLOBAL STYLE TOKEN describing the visual identity shared by all of them.

## What to capture
- Art & rendering: art style ("Photorealistic", "Anime stylized", ...) and render quality ("4K", "8K HDR", "35mm film grain", ...)
- Lines: weight (sharp/soft/varied) and style (clean vector, sketch, photographic)
- Color: 5-7 dominant HEX codes and the harmony (analogous, complementary, triadic, ...)
- Shading: style (cel-shaded, soft volumetric, hard edge) and contrast level (high/medium/low)
- Camera: style (handheld, gimbal, tripod, drone) and lens character (wide, telephoto, anamorphic, ...)
- Motion: style (smooth, jerky, slow-motion, time-lapse) and physics realism (realistic, exaggerated, stylized)
- Background: style (detailed, minimalist, bokeh) and depth treatment (deep focus, shallow DOF, layered)
- On-screen text, if any: font treatment and animation behaviour

## The 14 fidelity elements
Character Anatomy, Facial Construction, Material Surface, Lighting Temperature, Shadow Behavior,
Highlight Behavior, Geometry Simplification, Perspective Rules, Background Density, Object Interaction,
Transition Language, Timing Rhythm, Secondary Motion, Continuity Rules.

## Output Format
Return ONLY valid JSON. No markdown, no explanation.

{
  "artStyle": "string",
  "renderQuality": "string",
  "lineWeight": "string",
  "lineStyle": "string",
  "colorPalette": ["#hex1", "#hex2"],
  "colorHarmony": "string",
  "shadingStyle": "string",
  "contrastLevel": "string",
  "cameraStyle": "string",
  "lensCharacter": "string",
  "motionStyle": "string",
  "physicsRealism": "string",
  "backgroundStyle": "string",
  "depthTreatment": "string",
  "textStyle": "string or null",
  "textAnimation": "string or null",
  "tokenString": "one-line style summary usable as a prompt suffix",
  "fidelityElements": [
    { "factor": "Character Anatomy", "description": "...", "value": "..." }
  ]
}
fidelityElements must contain all 14 elements."##;

/// System instruction for single-scene narration
pub const VOICEOVER_SYSTEM: &str = r#"You write 8-second voiceover scripts for video scenes.

- The script must fit EXACTLY 8 seconds of speech: roughly 20-30 words
- Match the visual mood; keep continuity with the previous scene when one is given
- Complement the picture with context or story; never describe what is visible
- Write in the requested language only
- Tone is one of: narrative, dramatic, informative, conversational"#;

/// Instruction for one batch of image/motion prompts
pub fn build_batch_prompt(batch_index: usize, scenes_in_batch: usize, style_token: &str) -> String {
    format!(
        r##"Generate {count} scene prompts for this video segment, one per frame, in frame order.

BATCH: {batch}
GLOBAL STYLE TOKEN: "{token}"

For EACH frame create:
1. IMAGE PROMPT: one continuous paragraph describing a perfect still keyframe with ZERO motion
   (subject, pose, environment, lighting, camera angle and lens, textures, on-screen text in place)
2. VIDEO PROMPT: one continuous paragraph describing ONLY the motion over 8 seconds
   (primary and secondary motion, camera movement, timing and easing), never redesigning the still

Both prompts are ENGLISH ONLY (except quoted on-screen text) and end with {marker}

## Output Format
Return ONLY a JSON array with exactly {count} elements:
[
  {{
    "sceneIndex": number,
    "timeRange": "MM:SS-MM:SS",
    "shotType": "Shot type name",
    "imagePrompt": "Full paragraph... {marker}",
    "videoPrompt": "Full motion paragraph... {marker}",
    "ocrText": [
      {{
        "text": "detected text",
        "position": {{ "x": 0, "y": 0, "width": 0, "height": 0 }},
        "style": {{ "fontStyle": "sans-serif", "fontSize": "medium", "color": "#ffffff" }}
      }}
    ]
  }}
]"##,
        count = scenes_in_batch,
        batch = batch_index + 1,
        token = style_token,
        marker = STYLE_TOKEN_MARKER,
    )
}

/// Instruction for one batch of narration scripts
pub fn build_voiceover_batch_prompt(scene_count: usize, language_name: &str, language_code: &str) -> String {
    format!(
        r#"Generate {count} voiceover scripts in {name} ({code}), one per frame, in frame order.

Each script narrates an 8-second scene:
1. Approximately 20-30 words
2. Keep the narrative flowing from scene to scene
3. Complement the visuals, don't describe them
4. Match the visual mood and tone
5. Language: {name}

## Output Format
Return ONLY a JSON array with exactly {count} elements:
[
  {{
    "sceneIndex": number,
    "script": "8-second narration in {name}",
    "wordCount": number,
    "estimatedDuration": 8,
    "tone": "narrative|dramatic|informative|conversational"
  }}
]"#,
        count = scene_count,
        name = language_name,
        code = language_code,
    )
}

/// Instruction for re-narrating a single scene
pub fn build_single_voiceover_prompt(language_name: &str, previous_script: Option<&str>) -> String {
    let mut prompt = format!(
        "Generate an 8-second voiceover script in {} for this video frame.",
        language_name
    );

    if let Some(previous) = previous_script.filter(|s| !s.trim().is_empty()) {
        prompt.push_str(&format!(
            "\n\nPrevious scene script (keep continuity):\n\"{}\"",
            previous
        ));
    }

    prompt.push_str(&format!(
        r#"

## Output Format
Return ONLY a JSON object:
{{
  "script": "8-second script in {}",
  "wordCount": number,
  "tone": "narrative|dramatic|informative|conversational"
}}"#,
        language_name
    ));

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_prompt_names_count_batch_and_token() {
        let prompt = build_batch_prompt(2, 4, "Cinematic, 4K");
        assert!(prompt.starts_with("Generate 4 scene prompts"));
        assert!(prompt.contains("BATCH: 3"));
        assert!(prompt.contains("GLOBAL STYLE TOKEN: \"Cinematic, 4K\""));
        assert!(prompt.contains(STYLE_TOKEN_MARKER));
    }

    #[test]
    fn hex_color_examples_survive_in_templates() {
        assert!(STYLE_EXTRACTION_PROMPT.contains(r##""colorPalette": ["#hex1", "#hex2"]"##));
        assert!(STYLE_EXTRACTION_PROMPT.ends_with("fidelityElements must contain all 14 elements."));

        let prompt = build_batch_prompt(0, 5, "t");
        assert!(prompt.contains(r##""color": "#ffffff" }"##));
        assert!(prompt.ends_with(']'));
    }

    #[test]
    fn voiceover_prompt_names_language() {
        let prompt = build_voiceover_batch_prompt(5, "Japanese", "ja");
        assert!(prompt.contains("5 voiceover scripts in Japanese (ja)"));
    }

    #[test]
    fn single_prompt_includes_previous_script_only_when_present() {
        assert!(!build_single_voiceover_prompt("English", None).contains("Previous scene"));
        assert!(!build_single_voiceover_prompt("English", Some("  ")).contains("Previous scene"));
        assert!(build_single_voiceover_prompt("English", Some("It began at dawn."))
            .contains("\"It began at dawn.\""));
    }
}
