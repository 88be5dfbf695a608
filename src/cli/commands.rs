use anyhow::{Context, Result};
use serde_json::json;
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use scene_replicator::export::{self, ExportData, ExportOptions, ExportedFile};
use scene_replicator::gateway::{self, GeminiGateway};
use scene_replicator::keys::mask_key;
use scene_replicator::languages::SUPPORTED_LANGUAGES;
use scene_replicator::media::{FfmpegFrameSource, FrameSource};
use scene_replicator::model::{batch_count, scene_count, VideoMetadata};
use scene_replicator::pipeline::{AnalysisOutcome, CancelFlag, Orchestrator};
use scene_replicator::session::Session;
use scene_replicator::{server, Config};

use super::{AnalyzeArgs, Commands, KeysCommands, ServeArgs};

pub async fn dispatch(config: &mut Config, command: Commands, pretty: bool) -> Result<()> {
    match command {
        Commands::Doctor => doctor(config, pretty).await,
        Commands::Probe(args) => probe(config, &args.video, pretty).await,
        Commands::Analyze(args) => analyze(config, args, pretty).await,
        Commands::Keys { command } => keys(config, command, pretty),
        Commands::Languages => languages(pretty),
        Commands::Serve(args) => serve(config, args).await,
    }
}

fn print_checks(checks: &[serde_json::Value]) {
    println!("Scene Replicator Doctor\n");
    for check in checks {
        let status = check["status"].as_str().unwrap_or("unknown");
        let icon = match status {
            "ok" => "\u{2714}",      // ✔
            "warning" => "\u{26A0}", // ⚠
            "error" => "\u{2718}",   // ✘
            _ => "?",
        };
        println!(
            "{} {}: {}",
            icon,
            check["name"].as_str().unwrap_or(""),
            check["message"].as_str().unwrap_or("")
        );
        if let Some(path) = check["path"].as_str() {
            println!("    Path: {}", path);
        }
    }
}

/// Doctor command - check external tools and key setup
pub async fn doctor(config: &Config, pretty: bool) -> Result<()> {
    let mut checks = vec![];

    for (name, binary) in [
        ("ffmpeg", config.media.ffmpeg_path()),
        ("ffprobe", config.media.ffprobe_path()),
    ] {
        let check = match FfmpegFrameSource::check_binary(binary).await {
            Ok(version) => json!({
                "name": name,
                "status": "ok",
                "message": version,
                "path": binary
            }),
            Err(e) => json!({
                "name": name,
                "status": "error",
                "message": e.to_string(),
                "path": binary
            }),
        };
        checks.push(check);
    }

    let configured = config.gemini.api_keys.len();
    let from_env = config.gemini.env_keys.len();
    let key_check = if configured > 0 {
        json!({
            "name": "api_keys",
            "status": "ok",
            "message": format!("{} key(s) configured", configured)
        })
    } else if from_env > 0 {
        json!({
            "name": "api_keys",
            "status": "ok",
            "message": format!("{} key(s) from environment", from_env)
        })
    } else {
        json!({
            "name": "api_keys",
            "status": "warning",
            "message": "No API keys. Run `scene-replicator keys add <KEY>` or set GEMINI_API_KEY"
        })
    };
    checks.push(key_check);

    let endpoint = if config.gemini.transport == "proxy" {
        config.gemini.proxy_url()
    } else {
        config.gemini.base_url()
    };
    let transport_check = match gateway::from_config(&config.gemini) {
        Ok(gateway) => json!({
            "name": "transport",
            "status": "ok",
            "message": format!("{} ({})", config.gemini.transport, gateway.model()),
            "path": endpoint
        }),
        Err(e) => json!({
            "name": "transport",
            "status": "error",
            "message": e.to_string()
        }),
    };
    checks.push(transport_check);

    let config_path = config.path();
    let (status, message) = if config_path.exists() {
        ("ok", "Found")
    } else {
        ("warning", "Not found, using defaults")
    };
    checks.push(json!({
        "name": "config",
        "status": status,
        "message": message,
        "path": config_path.to_string_lossy()
    }));

    if pretty {
        print_checks(&checks);
    } else {
        println!("{}", serde_json::to_string(&json!({ "checks": checks }))?);
    }

    Ok(())
}

fn print_metadata(metadata: &VideoMetadata) {
    let scenes = scene_count(metadata.duration);
    println!("File: {}", metadata.file_name);
    println!(
        "Duration: {:.1}s | {}x{} @ {:.2} fps | {}",
        metadata.duration, metadata.width, metadata.height, metadata.fps, metadata.format
    );
    println!("Size: {:.1} MB", metadata.file_size as f64 / (1024.0 * 1024.0));
    println!(
        "Plan: {} scenes of 8s in {} batches",
        scenes,
        batch_count(scenes)
    );
}

/// Probe command - metadata and scene plan without calling the model
pub async fn probe(config: &Config, video: &Path, pretty: bool) -> Result<()> {
    let source = FfmpegFrameSource::from_config(&config.media);
    let metadata = source
        .probe(video)
        .await
        .with_context(|| format!("Failed to probe {}", video.display()))?;

    if pretty {
        print_metadata(&metadata);
    } else {
        let scenes = scene_count(metadata.duration);
        println!(
            "{}",
            json!({
                "metadata": metadata,
                "totalScenes": scenes,
                "totalBatches": batch_count(scenes)
            })
        );
    }
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N]: ", question);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Analyze command - run the whole pipeline and export the result
pub async fn analyze(config: &Config, args: AnalyzeArgs, pretty: bool) -> Result<()> {
    let format = match args.format {
        Some(format) => format,
        None => config.output.format()?,
    };

    let mut settings = config.voiceover_settings();
    if let Some(language) = args.language {
        settings.default_language = language;
    }
    if let Some(mode) = args.mode {
        settings.mode = mode;
    }
    settings.scene_overrides.extend(args.scene_languages.iter().copied());

    let gateway = gateway::from_config(&config.gemini)?;
    let frame_source = Arc::new(FfmpegFrameSource::from_config(&config.media));
    let mut orchestrator = Orchestrator::new(gateway, frame_source, config.key_pool(), settings)
        .with_batch_delay(config.analysis.batch_delay());

    let metadata = orchestrator
        .load_video(args.video.clone())
        .await
        .with_context(|| format!("Failed to read {}", args.video.display()))?;

    if pretty {
        print_metadata(&metadata);
        println!();
    }

    if !args.yes {
        let scenes = scene_count(metadata.duration);
        let question = format!(
            "Analyze {} scenes with {} API call(s)?",
            scenes,
            1 + 2 * batch_count(scenes)
        );
        if !confirm(&question)? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let cancel = CancelFlag::new();
    let ctrl_c_flag = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Stopping after the current step...");
            ctrl_c_flag.cancel();
        }
    });

    let mut progress = orchestrator.subscribe();
    let watcher = tokio::spawn(async move {
        let initial = progress.borrow().clone();
        let mut last = (initial.state, initial.current_batch);
        while progress.changed().await.is_ok() {
            let snapshot = progress.borrow_and_update().clone();
            let key = (snapshot.state, snapshot.current_batch);
            if key == last {
                continue;
            }
            last = key;
            if snapshot.total_batches > 0 && snapshot.current_batch > 0 {
                tracing::info!(
                    "{}: batch {}/{} (scene {}/{})",
                    snapshot.state,
                    snapshot.current_batch,
                    snapshot.total_batches,
                    snapshot.current_scene,
                    snapshot.total_scenes
                );
            } else {
                tracing::info!("{}", snapshot.state);
            }
        }
    });

    let outcome = orchestrator.start_analysis(&cancel).await;
    ctrl_c.abort();
    watcher.abort();

    match outcome.context("Analysis failed")? {
        AnalysisOutcome::Completed { scenes } => {
            let session = orchestrator.session();
            let exported = if args.no_save || !(config.output.auto_save || args.out.is_some()) {
                None
            } else {
                let out_dir = args
                    .out
                    .clone()
                    .or_else(|| config.output.dir.clone())
                    .unwrap_or_else(|| PathBuf::from("."));
                save_export(session, format, &out_dir)
            };

            if pretty {
                print_session(session, exported.as_ref());
            } else {
                println!(
                    "{}",
                    json!({
                        "status": "complete",
                        "scenes": scenes,
                        "styleToken": session.style_token(),
                        "prompts": session.prompts(),
                        "voiceovers": session.voiceovers(),
                        "export": exported
                    })
                );
            }
            Ok(())
        }
        AnalysisOutcome::Cancelled => {
            let progress = orchestrator.session().progress();
            if pretty {
                println!("Cancelled during {}.", progress.state);
            } else {
                println!("{}", json!({ "status": "cancelled", "progress": progress }));
            }
            Ok(())
        }
        AnalysisOutcome::Rejected(reason) => Err(anyhow::anyhow!(reason)),
    }
}

/// Export failures are reported, never fatal to a finished analysis
fn save_export(session: &Session, format: export::ExportFormat, out_dir: &Path) -> Option<ExportedFile> {
    let result = ExportData::from_session(session)
        .and_then(|data| export::export(&data, ExportOptions { format }, out_dir));
    match result {
        Ok(file) => Some(file),
        Err(e) => {
            tracing::error!("{}", e);
            None
        }
    }
}

fn print_session(session: &Session, exported: Option<&ExportedFile>) {
    if let Some(token) = session.style_token() {
        println!("Style: {}\n", token.token_string);
    }

    for prompt in session.prompts() {
        println!(
            "--- Scene {} | {} | {} ---",
            prompt.scene_index + 1,
            prompt.time_range,
            prompt.shot_type
        );
        println!("Image: {}", prompt.image_prompt);
        println!("Video: {}", prompt.video_prompt);
        match session.voiceover_for(prompt.scene_index) {
            Some(voiceover) => println!(
                "Voiceover [{}, {}]: {}",
                voiceover.language.native(),
                voiceover.tone.as_str(),
                voiceover.script
            ),
            None => println!("Voiceover: (none)"),
        }
        println!();
    }

    match exported {
        Some(file) => println!("\u{2714} Saved {}", file.path.display()),
        None => println!("No export written."),
    }
}

/// Keys command - manage the persisted key pool
pub fn keys(config: &mut Config, command: KeysCommands, pretty: bool) -> Result<()> {
    match command {
        KeysCommands::List => {
            let source = if config.gemini.api_keys.is_empty() && !config.gemini.env_keys.is_empty()
            {
                "environment"
            } else {
                "config"
            };
            let masked: Vec<String> = config
                .gemini
                .effective_keys()
                .iter()
                .map(|k| mask_key(k))
                .collect();

            if pretty {
                if masked.is_empty() {
                    println!("No API keys configured.");
                    println!("\nAdd one with:\n   scene-replicator keys add <KEY>");
                } else {
                    println!("API keys ({}):\n", source);
                    for (i, key) in masked.iter().enumerate() {
                        println!("  {}. {}", i + 1, key);
                    }
                }
            } else {
                println!(
                    "{}",
                    json!({ "source": source, "keys": masked, "count": masked.len() })
                );
            }
        }
        KeysCommands::Add { key } => {
            let added = config.add_key(&key);
            if added {
                config.write()?;
            }
            if pretty {
                if added {
                    println!("\u{2714} Added {}", mask_key(key.trim()));
                    println!("\n\u{1F4DD} Configuration saved to:");
                    println!("   {}", config.path().display());
                } else {
                    println!("Key already present or empty; nothing changed.");
                }
            } else {
                println!(
                    "{}",
                    json!({ "added": added, "count": config.gemini.api_keys.len() })
                );
            }
        }
        KeysCommands::Remove { position } => {
            let removed = config.remove_key(position)?;
            config.write()?;
            if pretty {
                println!("\u{2714} Removed {}", mask_key(&removed));
            } else {
                println!(
                    "{}",
                    json!({ "removed": mask_key(&removed), "count": config.gemini.api_keys.len() })
                );
            }
        }
    }
    Ok(())
}

/// Languages command
pub fn languages(pretty: bool) -> Result<()> {
    if pretty {
        println!("Voiceover languages:\n");
        for lang in SUPPORTED_LANGUAGES {
            println!("  {}  {:12} {}", lang.code, lang.name, lang.native);
        }
    } else {
        let list: Vec<_> = SUPPORTED_LANGUAGES
            .iter()
            .map(|l| json!({ "code": l.code, "name": l.name, "native": l.native }))
            .collect();
        println!("{}", serde_json::to_string(&list)?);
    }
    Ok(())
}

/// Serve command - local proxy for the Gemini API
pub async fn serve(config: &Config, args: ServeArgs) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", args.host, args.port))?;
    let gateway = Arc::new(GeminiGateway::from_config(&config.gemini));
    server::serve(addr, gateway)
        .await
        .context("Proxy server stopped")
}
