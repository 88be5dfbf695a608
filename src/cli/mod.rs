pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use scene_replicator::export::ExportFormat;
use scene_replicator::languages::LanguageCode;
use scene_replicator::model::VoiceoverMode;

#[derive(Parser)]
#[command(name = "scene-replicator")]
#[command(about = "Turn a video into per-scene image, motion and voiceover prompts")]
#[command(version)]
pub struct Cli {
    /// Use alternate config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Human-readable output instead of JSON
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check ffmpeg, ffprobe and API key setup
    Doctor,

    /// Show a video's metadata and scene plan
    Probe(ProbeArgs),

    /// Analyze a video into scene prompts and voiceovers
    Analyze(AnalyzeArgs),

    /// Manage the Gemini API key pool
    Keys {
        #[command(subcommand)]
        command: KeysCommands,
    },

    /// List supported voiceover languages
    Languages,

    /// Run the local Gemini proxy
    Serve(ServeArgs),
}

#[derive(Args)]
pub struct ProbeArgs {
    /// Video file
    pub video: PathBuf,
}

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Video file
    pub video: PathBuf,

    /// Skip the confirmation prompt
    #[arg(long, short)]
    pub yes: bool,

    /// Voiceover language code or name (default from config)
    #[arg(long)]
    pub language: Option<LanguageCode>,

    /// Voiceover mode: global or per-scene
    #[arg(long)]
    pub mode: Option<VoiceoverMode>,

    /// Narrate one scene in another language, e.g. 3=en (scenes count from 1)
    #[arg(long = "scene-language", value_name = "SCENE=LANG", value_parser = parse_scene_language)]
    pub scene_languages: Vec<(usize, LanguageCode)>,

    /// Export format: txt, json or csv (default from config)
    #[arg(long)]
    pub format: Option<ExportFormat>,

    /// Directory for the export file (default from config, else the current directory)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Do not write an export file
    #[arg(long)]
    pub no_save: bool,
}

#[derive(Subcommand)]
pub enum KeysCommands {
    /// List configured keys (masked)
    List,
    /// Add a key to the pool
    Add {
        /// Gemini API key
        key: String,
    },
    /// Remove a key by its position in `keys list`
    Remove {
        /// 1-based position
        position: usize,
    },
}

#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(long, default_value_t = 8787)]
    pub port: u16,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
}

/// `3=en` -> scene index 2 in English
fn parse_scene_language(raw: &str) -> Result<(usize, LanguageCode), String> {
    let (scene, language) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SCENE=LANG, got '{}'", raw))?;
    let scene: usize = scene
        .trim()
        .parse()
        .map_err(|_| format!("invalid scene number '{}'", scene.trim()))?;
    if scene == 0 {
        return Err("scene numbers start at 1".to_string());
    }
    let language: LanguageCode = language.parse()?;
    Ok((scene - 1, language))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_language_is_one_based() {
        assert_eq!(parse_scene_language("3=en"), Ok((2, LanguageCode::En)));
        assert_eq!(parse_scene_language("1 = Japanese"), Ok((0, LanguageCode::Ja)));
        assert!(parse_scene_language("0=en").is_err());
        assert!(parse_scene_language("en").is_err());
        assert!(parse_scene_language("2=klingon").is_err());
    }

    #[test]
    fn analyze_flags_parse() {
        let cli = Cli::try_parse_from([
            "scene-replicator",
            "analyze",
            "clip.mp4",
            "--yes",
            "--language",
            "fr",
            "--mode",
            "per-scene",
            "--scene-language",
            "2=en",
            "--format",
            "csv",
        ])
        .unwrap();

        let Commands::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert!(args.yes);
        assert_eq!(args.language, Some(LanguageCode::Fr));
        assert_eq!(args.mode, Some(VoiceoverMode::PerScene));
        assert_eq!(args.scene_languages, [(1, LanguageCode::En)]);
        assert_eq!(args.format, Some(ExportFormat::Csv));
    }
}
