use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fmt;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{ReplicatorError, Result};
use crate::languages::LanguageCode;
use crate::model::{GeneratedPrompt, GlobalStyleToken, OcrText, VoiceoverScript};
use crate::session::Session;

pub const EXPORT_VERSION: &str = "3.7";
const FALLBACK_FILE_STEM: &str = "veo3_prompts";
const RULE: &str = "================================================================================";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Txt,
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Txt => "txt",
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Txt => "text/plain",
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "txt" | "text" => Ok(ExportFormat::Txt),
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!("unknown export format '{}' (txt, json, csv)", other)),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExportOptions {
    pub format: ExportFormat,
}

/// Everything an export needs, borrowed from the session
#[derive(Debug, Clone, Copy)]
pub struct ExportData<'a> {
    pub prompts: &'a [GeneratedPrompt],
    pub voiceovers: &'a [VoiceoverScript],
    pub style_token: &'a GlobalStyleToken,
    pub source: &'a str,
    pub duration: f64,
    pub total_scenes: usize,
    pub voiceover_language: LanguageCode,
}

impl<'a> ExportData<'a> {
    pub fn from_session(session: &'a Session) -> Result<Self> {
        let metadata = session
            .metadata()
            .ok_or_else(|| ReplicatorError::Export("no video metadata to export".to_string()))?;
        let style_token = session
            .style_token()
            .ok_or_else(|| ReplicatorError::Export("no style token to export".to_string()))?;

        Ok(Self {
            prompts: session.prompts(),
            voiceovers: session.voiceovers(),
            style_token,
            source: &metadata.file_name,
            duration: metadata.duration,
            total_scenes: session.progress().total_scenes,
            voiceover_language: session.voiceover_settings().default_language,
        })
    }

    fn voiceover_for(&self, scene_index: usize) -> Option<&'a VoiceoverScript> {
        self.voiceovers.iter().find(|v| v.scene_index == scene_index)
    }
}

/// Where an export landed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportedFile {
    pub path: PathBuf,
    pub mime_type: &'static str,
    pub bytes: usize,
}

/// `clip.final.mp4` -> `clip.final.txt`; an empty stem falls back to `veo3_prompts`
pub fn export_file_name(source: &str, format: ExportFormat) -> String {
    let stem = match source.rfind('.') {
        Some(dot) if dot + 1 < source.len() && !source[dot + 1..].contains(['/', '\\']) => {
            &source[..dot]
        }
        _ => source,
    };
    let stem = if stem.trim().is_empty() {
        FALLBACK_FILE_STEM
    } else {
        stem
    };
    format!("{}.{}", stem, format.extension())
}

pub fn render(data: &ExportData<'_>, format: ExportFormat, generated_at: DateTime<Utc>) -> Result<String> {
    match format {
        ExportFormat::Txt => Ok(render_txt(data, generated_at)),
        ExportFormat::Json => render_json(data, generated_at),
        ExportFormat::Csv => Ok(render_csv(data)),
    }
}

fn timestamp(generated_at: DateTime<Utc>) -> String {
    generated_at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn render_txt(data: &ExportData<'_>, generated_at: DateTime<Utc>) -> String {
    let language = data.voiceover_language;
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = write!(
        out,
        "{rule}\nVEO3 REPLICATOR ELITE \u{2014} ULTRA MODE v{version}\n{rule}\n\
         Source: {source}\n\
         Duration: {duration}s\n\
         Total Scenes: {scenes}\n\
         Voiceover Language: {name} ({native})\n\
         Global Style Token: {token}\n\
         Generated: {generated}\n\
         {rule}\n\n",
        rule = RULE,
        version = EXPORT_VERSION,
        source = data.source,
        duration = data.duration,
        scenes = data.total_scenes,
        name = language.name(),
        native = language.native(),
        token = data.style_token.token_string,
        generated = timestamp(generated_at),
    );

    for prompt in data.prompts {
        let script = data
            .voiceover_for(prompt.scene_index)
            .map(|v| v.script.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("(No voiceover)");

        let _ = write!(
            out,
            "--- SCENE {n} | {range} | {shot} ---\n\n\
             [IMAGE PROMPT]\n{image}\n\n\
             [VIDEO PROMPT]\n{video}\n\n\
             [VOICEOVER - {native}]\n{script}\n\n\
             {rule}\n\n",
            n = prompt.scene_index + 1,
            range = prompt.time_range,
            shot = prompt.shot_type,
            image = prompt.image_prompt,
            video = prompt.video_prompt,
            native = language.native(),
            script = script,
            rule = RULE,
        );
    }

    out
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonExport<'a> {
    version: &'static str,
    generated_at: String,
    metadata: JsonMetadata<'a>,
    global_style_token: JsonStyleToken<'a>,
    scenes: Vec<JsonScene<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonMetadata<'a> {
    source: &'a str,
    duration: f64,
    total_scenes: usize,
    voiceover_language: LanguageCode,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonStyleToken<'a> {
    token_string: &'a str,
    art_style: &'a str,
    render_quality: &'a str,
    color_palette: &'a [String],
    camera_style: &'a str,
    motion_style: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonScene<'a> {
    index: usize,
    time_range: &'a str,
    shot_type: &'a str,
    image_prompt: &'a str,
    video_prompt: &'a str,
    voiceover: Option<JsonVoiceover<'a>>,
    quality_score: u32,
    ocr_text: &'a [OcrText],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonVoiceover<'a> {
    language: LanguageCode,
    script: &'a str,
    word_count: usize,
    tone: crate::model::Tone,
}

pub fn render_json(data: &ExportData<'_>, generated_at: DateTime<Utc>) -> Result<String> {
    let token = data.style_token;
    let export = JsonExport {
        version: EXPORT_VERSION,
        generated_at: timestamp(generated_at),
        metadata: JsonMetadata {
            source: data.source,
            duration: data.duration,
            total_scenes: data.total_scenes,
            voiceover_language: data.voiceover_language,
        },
        global_style_token: JsonStyleToken {
            token_string: &token.token_string,
            art_style: &token.art_style,
            render_quality: &token.render_quality,
            color_palette: &token.color_palette,
            camera_style: &token.camera_style,
            motion_style: &token.motion_style,
        },
        scenes: data
            .prompts
            .iter()
            .map(|prompt| JsonScene {
                index: prompt.scene_index + 1,
                time_range: &prompt.time_range,
                shot_type: &prompt.shot_type,
                image_prompt: &prompt.image_prompt,
                video_prompt: &prompt.video_prompt,
                voiceover: data.voiceover_for(prompt.scene_index).map(|v| JsonVoiceover {
                    language: v.language,
                    script: &v.script,
                    word_count: v.word_count,
                    tone: v.tone,
                }),
                quality_score: prompt.quality_score,
                ocr_text: &prompt.ocr_text,
            })
            .collect(),
    };

    serde_json::to_string_pretty(&export)
        .map_err(|e| ReplicatorError::Export(format!("Failed to serialize export: {}", e)))
}

/// Quote-doubling and newline flattening for one CSV text cell
pub fn escape_csv(text: &str) -> String {
    text.replace('"', "\"\"").replace('\n', " ")
}

pub fn render_csv(data: &ExportData<'_>) -> String {
    let mut csv =
        String::from("Scene,TimeRange,ShotType,ImagePrompt,VideoPrompt,VoiceoverLanguage,VoiceoverScript\n");

    for prompt in data.prompts {
        let script = data
            .voiceover_for(prompt.scene_index)
            .map(|v| v.script.as_str())
            .unwrap_or("");
        let _ = writeln!(
            csv,
            "{},{},{},\"{}\",\"{}\",{},\"{}\"",
            prompt.scene_index + 1,
            prompt.time_range,
            prompt.shot_type,
            escape_csv(&prompt.image_prompt),
            escape_csv(&prompt.video_prompt),
            data.voiceover_language.name(),
            escape_csv(script),
        );
    }

    csv
}

/// Render and write the export into `out_dir`, replacing any previous file.
///
/// Content goes to a temp file in the same directory first, so a failed write
/// never leaves a truncated export behind.
pub fn export(data: &ExportData<'_>, options: ExportOptions, out_dir: &Path) -> Result<ExportedFile> {
    let content = render(data, options.format, Utc::now())?;
    let path = out_dir.join(export_file_name(data.source, options.format));

    let write = || -> std::io::Result<()> {
        std::fs::create_dir_all(out_dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(out_dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    };
    write().map_err(|e| {
        ReplicatorError::Export(format!("Failed to write {}: {}", path.display(), e))
    })?;

    tracing::info!("Exported {} scenes to {}", data.prompts.len(), path.display());
    Ok(ExportedFile {
        path,
        mime_type: options.format.mime_type(),
        bytes: content.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::style::{default_fidelity_elements, fill_style_defaults, RawStyleResponse};
    use crate::model::{scene_time_range, Tone};
    use chrono::TimeZone;

    fn prompt(i: usize, image: &str) -> GeneratedPrompt {
        GeneratedPrompt {
            scene_index: i,
            time_range: scene_time_range(i),
            image_prompt: image.to_string(),
            video_prompt: "Slow push in.".to_string(),
            shot_type: "Wide Shot".to_string(),
            ocr_text: Vec::new(),
            quality_score: 0,
            missing_factors: Vec::new(),
        }
    }

    fn voiceover(i: usize, script: &str) -> VoiceoverScript {
        VoiceoverScript {
            scene_index: i,
            time_range: scene_time_range(i),
            language: LanguageCode::En,
            script: script.to_string(),
            word_count: crate::model::count_words(script),
            estimated_duration: 8.0,
            tone: Tone::Dramatic,
        }
    }

    fn token() -> GlobalStyleToken {
        let mut token = fill_style_defaults(RawStyleResponse::default());
        token.token_string = "noir, grainy".to_string();
        token.fidelity_elements = default_fidelity_elements();
        token
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn file_names_drop_one_extension() {
        assert_eq!(export_file_name("clip.mp4", ExportFormat::Json), "clip.json");
        assert_eq!(export_file_name("a.b.mov", ExportFormat::Csv), "a.b.csv");
        assert_eq!(export_file_name("noext", ExportFormat::Txt), "noext.txt");
        assert_eq!(export_file_name("", ExportFormat::Txt), "veo3_prompts.txt");
        assert_eq!(export_file_name(".mp4", ExportFormat::Txt), "veo3_prompts.txt");
    }

    #[test]
    fn csv_quotes_and_flattens() {
        let prompts = [prompt(0, "He said \"go\"\nnow")];
        let voiceovers = [voiceover(0, "Line one\nline \"two\"")];
        let token = token();
        let data = ExportData {
            prompts: &prompts,
            voiceovers: &voiceovers,
            style_token: &token,
            source: "clip.mp4",
            duration: 8.0,
            total_scenes: 1,
            voiceover_language: LanguageCode::En,
        };

        let csv = render_csv(&data);
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "Scene,TimeRange,ShotType,ImagePrompt,VideoPrompt,VoiceoverLanguage,VoiceoverScript"
        );
        assert_eq!(
            lines[1],
            "1,00:00-00:08,Wide Shot,\"He said \"\"go\"\" now\",\"Slow push in.\",English,\"Line one line \"\"two\"\"\""
        );
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn txt_marks_missing_voiceovers() {
        let prompts = [prompt(0, "First."), prompt(1, "Second.")];
        let voiceovers = [voiceover(1, "Only the second scene speaks.")];
        let token = token();
        let data = ExportData {
            prompts: &prompts,
            voiceovers: &voiceovers,
            style_token: &token,
            source: "clip.mp4",
            duration: 16.0,
            total_scenes: 2,
            voiceover_language: LanguageCode::Ja,
        };

        let txt = render_txt(&data, at());
        assert!(txt.contains("Duration: 16s\n"));
        assert!(txt.contains("Voiceover Language: Japanese (日本語)"));
        assert!(txt.contains("Global Style Token: noir, grainy"));
        assert!(txt.contains("Generated: 2025-01-02T03:04:05.000Z"));
        assert!(txt.contains("--- SCENE 1 | 00:00-00:08 | Wide Shot ---"));
        assert!(txt.contains("[VOICEOVER - 日本語]\n(No voiceover)\n"));
        assert!(txt.contains("[VOICEOVER - 日本語]\nOnly the second scene speaks.\n"));
    }

    #[test]
    fn json_has_one_entry_per_prompt() {
        let prompts: Vec<_> = (0..5).map(|i| prompt(i, "Still.")).collect();
        let voiceovers: Vec<_> = (0..5).map(|i| voiceover(i, "Words here.")).collect();
        let token = token();
        let data = ExportData {
            prompts: &prompts,
            voiceovers: &voiceovers,
            style_token: &token,
            source: "clip.mp4",
            duration: 40.0,
            total_scenes: 5,
            voiceover_language: LanguageCode::En,
        };

        let value: serde_json::Value =
            serde_json::from_str(&render_json(&data, at()).unwrap()).unwrap();
        assert_eq!(value["version"], "3.7");
        assert_eq!(value["metadata"]["voiceoverLanguage"], "en");
        assert_eq!(value["globalStyleToken"]["tokenString"], "noir, grainy");
        let scenes = value["scenes"].as_array().unwrap();
        assert_eq!(scenes.len(), 5);
        assert_eq!(scenes[0]["index"], 1);
        assert_eq!(scenes[4]["voiceover"]["tone"], "dramatic");
        assert_eq!(scenes[4]["voiceover"]["wordCount"], 2);
        assert!(scenes.iter().all(|s| !s["voiceover"].is_null()));
    }

    #[test]
    fn formats_parse_leniently() {
        assert_eq!("JSON".parse::<ExportFormat>(), Ok(ExportFormat::Json));
        assert_eq!("text".parse::<ExportFormat>(), Ok(ExportFormat::Txt));
        assert!("xml".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::Csv.mime_type(), "text/csv");
    }
}
