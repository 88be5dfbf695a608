use serde::Deserialize;

use super::{non_empty, prompts};
use crate::error::{ReplicatorError, Result};
use crate::gateway::{parse_structured, ModelGateway};
use crate::model::{FidelityElement, GlobalStyleToken};

pub const FIDELITY_ELEMENT_COUNT: usize = 14;

/// Style fields as the model returned them; anything may be missing
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawStyleResponse {
    pub art_style: Option<String>,
    pub render_quality: Option<String>,
    pub line_weight: Option<String>,
    pub line_style: Option<String>,
    pub color_palette: Option<Vec<String>>,
    pub color_harmony: Option<String>,
    pub shading_style: Option<String>,
    pub contrast_level: Option<String>,
    pub camera_style: Option<String>,
    pub lens_character: Option<String>,
    pub motion_style: Option<String>,
    pub physics_realism: Option<String>,
    pub background_style: Option<String>,
    pub depth_treatment: Option<String>,
    pub text_style: Option<String>,
    pub text_animation: Option<String>,
    pub token_string: Option<String>,
    pub fidelity_elements: Option<Vec<FidelityElement>>,
}

/// Derive the video's style token from a few sample frames
pub async fn extract_style<G>(gateway: &G, sample_frames: &[String]) -> Result<GlobalStyleToken>
where
    G: ModelGateway + ?Sized,
{
    if sample_frames.is_empty() {
        return Err(ReplicatorError::invalid_input(
            "at least one sample frame is required",
        ));
    }

    tracing::info!("Analyzing style from {} sample frames", sample_frames.len());

    let text = gateway
        .send(prompts::STYLE_EXTRACTION_PROMPT, sample_frames, None)
        .await?;
    let raw: RawStyleResponse = parse_structured(&text)?;
    let token = fill_style_defaults(raw);

    tracing::info!("Style token: {}", token.token_string);
    Ok(token)
}

pub fn fill_style_defaults(raw: RawStyleResponse) -> GlobalStyleToken {
    let text_or = |value: Option<String>, default: &str| {
        non_empty(value).unwrap_or_else(|| default.to_string())
    };

    let fidelity_elements = match raw.fidelity_elements {
        Some(elements) if elements.len() == FIDELITY_ELEMENT_COUNT => elements,
        Some(elements) => {
            tracing::debug!(
                "Model returned {} fidelity elements, using the default set",
                elements.len()
            );
            default_fidelity_elements()
        }
        None => default_fidelity_elements(),
    };

    let mut token = GlobalStyleToken {
        art_style: text_or(raw.art_style, "Cinematic"),
        render_quality: text_or(raw.render_quality, "4K"),
        line_weight: text_or(raw.line_weight, "sharp"),
        line_style: text_or(raw.line_style, "photographic"),
        color_palette: raw.color_palette.unwrap_or_default(),
        color_harmony: text_or(raw.color_harmony, "complementary"),
        shading_style: text_or(raw.shading_style, "soft volumetric"),
        contrast_level: text_or(raw.contrast_level, "high"),
        camera_style: text_or(raw.camera_style, "stabilized"),
        lens_character: text_or(raw.lens_character, "35mm"),
        motion_style: text_or(raw.motion_style, "smooth"),
        physics_realism: text_or(raw.physics_realism, "realistic"),
        background_style: text_or(raw.background_style, "detailed"),
        depth_treatment: text_or(raw.depth_treatment, "shallow DOF"),
        text_style: raw.text_style.unwrap_or_default(),
        text_animation: raw.text_animation.unwrap_or_default(),
        token_string: String::new(),
        fidelity_elements,
    };

    token.token_string = non_empty(raw.token_string).unwrap_or_else(|| build_token_string(&token));
    token
}

/// One-line summary used when the model gives no `tokenString`
pub fn build_token_string(token: &GlobalStyleToken) -> String {
    let contrast = format!("{} contrast", token.contrast_level);
    let motion = format!("{} motion", token.motion_style);
    [
        token.art_style.as_str(),
        token.render_quality.as_str(),
        token.camera_style.as_str(),
        token.lens_character.as_str(),
        token.shading_style.as_str(),
        contrast.as_str(),
        motion.as_str(),
    ]
    .iter()
    .map(|part| part.trim())
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(", ")
}

pub fn default_fidelity_elements() -> Vec<FidelityElement> {
    vec![
        FidelityElement::new("Character Anatomy", "Body proportions and pose", "natural proportions"),
        FidelityElement::new("Facial Construction", "Face structure rules", "realistic features"),
        FidelityElement::new("Material Surface", "Texture behavior", "physically accurate"),
        FidelityElement::new("Lighting Temperature", "Color temperature", "neutral to warm"),
        FidelityElement::new("Shadow Behavior", "Shadow casting", "soft diffused"),
        FidelityElement::new("Highlight Behavior", "Specular/reflection", "natural highlights"),
        FidelityElement::new("Geometry Simplification", "Detail level", "high detail"),
        FidelityElement::new("Perspective Rules", "Camera perspective", "natural perspective"),
        FidelityElement::new("Background Density", "Background complexity", "contextual"),
        FidelityElement::new("Object Interaction", "Physics of contact", "realistic"),
        FidelityElement::new("Transition Language", "Scene transitions", "smooth cuts"),
        FidelityElement::new("Timing Rhythm", "Motion pacing", "natural timing"),
        FidelityElement::new("Secondary Motion", "Subsidiary movement", "subtle"),
        FidelityElement::new("Continuity Rules", "Cross-scene consistency", "maintained"),
    ]
}
