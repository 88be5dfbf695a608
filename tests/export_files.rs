use scene_replicator::agents::style::{default_fidelity_elements, fill_style_defaults, RawStyleResponse};
use scene_replicator::export::{export, ExportData, ExportFormat, ExportOptions};
use scene_replicator::languages::LanguageCode;
use scene_replicator::model::{
    count_words, scene_time_range, GeneratedPrompt, GlobalStyleToken, Tone, VoiceoverScript,
};
use scene_replicator::{ReplicatorError, Session};

fn prompts() -> Vec<GeneratedPrompt> {
    (0..2)
        .map(|i| GeneratedPrompt {
            scene_index: i,
            time_range: scene_time_range(i),
            image_prompt: format!("Scene {} at dusk", i + 1),
            video_prompt: "Camera drifts left.".to_string(),
            shot_type: "Wide Shot".to_string(),
            ocr_text: Vec::new(),
            quality_score: 0,
            missing_factors: Vec::new(),
        })
        .collect()
}

fn voiceovers() -> Vec<VoiceoverScript> {
    (0..2)
        .map(|i| {
            let script = format!("Chapter {} begins.", i + 1);
            VoiceoverScript {
                scene_index: i,
                time_range: scene_time_range(i),
                language: LanguageCode::En,
                word_count: count_words(&script),
                script,
                estimated_duration: 8.0,
                tone: Tone::Narrative,
            }
        })
        .collect()
}

fn token() -> GlobalStyleToken {
    let mut token = fill_style_defaults(RawStyleResponse::default());
    token.token_string = "warm film, soft grain".to_string();
    token.fidelity_elements = default_fidelity_elements();
    token
}

#[test]
fn writes_named_file_in_each_format() {
    let dir = tempfile::tempdir().unwrap();
    let prompts = prompts();
    let voiceovers = voiceovers();
    let token = token();
    let data = ExportData {
        prompts: &prompts,
        voiceovers: &voiceovers,
        style_token: &token,
        source: "holiday.mp4",
        duration: 16.0,
        total_scenes: 2,
        voiceover_language: LanguageCode::En,
    };

    let txt = export(&data, ExportOptions { format: ExportFormat::Txt }, dir.path()).unwrap();
    assert_eq!(txt.path, dir.path().join("holiday.txt"));
    assert_eq!(txt.mime_type, "text/plain");
    let content = std::fs::read_to_string(&txt.path).unwrap();
    assert_eq!(content.len(), txt.bytes);
    assert!(content.contains("Scene 1 at dusk"));
    assert!(content.contains("Chapter 2 begins."));

    let json = export(&data, ExportOptions { format: ExportFormat::Json }, dir.path()).unwrap();
    assert_eq!(json.path, dir.path().join("holiday.json"));
    let parsed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json.path).unwrap()).unwrap();
    assert!(parsed.is_object());

    let csv = export(&data, ExportOptions { format: ExportFormat::Csv }, dir.path()).unwrap();
    assert_eq!(csv.path, dir.path().join("holiday.csv"));
    let rows = std::fs::read_to_string(&csv.path).unwrap();
    assert_eq!(rows.lines().count(), 3);
}

#[test]
fn second_export_replaces_first() {
    let dir = tempfile::tempdir().unwrap();
    let mut prompts = prompts();
    let voiceovers = voiceovers();
    let token = token();

    let first = {
        let data = ExportData {
            prompts: &prompts,
            voiceovers: &voiceovers,
            style_token: &token,
            source: "holiday.mp4",
            duration: 16.0,
            total_scenes: 2,
            voiceover_language: LanguageCode::En,
        };
        export(&data, ExportOptions::default(), dir.path()).unwrap()
    };

    prompts[0].image_prompt = "Scene 1 rewritten".to_string();
    let data = ExportData {
        prompts: &prompts,
        voiceovers: &voiceovers,
        style_token: &token,
        source: "holiday.mp4",
        duration: 16.0,
        total_scenes: 2,
        voiceover_language: LanguageCode::En,
    };
    let second = export(&data, ExportOptions::default(), dir.path()).unwrap();

    assert_eq!(first.path, second.path);
    let content = std::fs::read_to_string(&second.path).unwrap();
    assert!(content.contains("Scene 1 rewritten"));
    assert!(!content.contains("Scene 1 at dusk"));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn empty_session_has_nothing_to_export() {
    let session = Session::default();
    assert!(matches!(
        ExportData::from_session(&session),
        Err(ReplicatorError::Export(_))
    ));
}
