//! Drives one video through frame extraction, style detection, prompt
//! batches and narration batches, recording everything in a [`Session`].

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::agents::{scene_prompts, style, voiceover};
use crate::error::{ReplicatorError, Result};
use crate::gateway::ModelGateway;
use crate::keys::{mask_key, KeyPool};
use crate::media::FrameSource;
use crate::model::{
    batch_count, batch_window, AnalysisState, VideoMetadata, VoiceoverSettings, BATCH_SIZE,
    SAMPLING_INTERVAL_SECS,
};
use crate::session::{Progress, Session};

pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(2000);

/// Shared stop request. Checked between steps; never interrupts a call in flight.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Completed { scenes: usize },
    /// Stopped by the cancel flag; the session keeps its last state
    Cancelled,
    /// Preconditions not met; nothing was started
    Rejected(String),
}

pub struct Orchestrator {
    gateway: Arc<dyn ModelGateway>,
    frame_source: Arc<dyn FrameSource>,
    keys: KeyPool,
    session: Session,
    batch_delay: Duration,
}

impl Orchestrator {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        frame_source: Arc<dyn FrameSource>,
        keys: KeyPool,
        voiceover_settings: VoiceoverSettings,
    ) -> Self {
        Self {
            gateway,
            frame_source,
            keys,
            session: Session::new(voiceover_settings),
            batch_delay: DEFAULT_BATCH_DELAY,
        }
    }

    /// Pause between batches and before a retry on a new key
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.session.subscribe()
    }

    pub fn keys(&self) -> &KeyPool {
        &self.keys
    }

    pub fn keys_mut(&mut self) -> &mut KeyPool {
        &mut self.keys
    }

    /// Select a video and read its metadata, ending in AWAITING_CONFIRMATION
    pub async fn load_video(&mut self, path: impl Into<PathBuf>) -> Result<VideoMetadata> {
        let path = path.into();
        tracing::info!("Loading {}", path.display());

        self.session.set_video(path.clone());
        self.session.set_state(AnalysisState::ExtractingMetadata);

        match self.frame_source.probe(&path).await {
            Ok(metadata) => {
                tracing::info!(
                    "{}: {:.1}s, {}x{}, {} scenes",
                    metadata.file_name,
                    metadata.duration,
                    metadata.width,
                    metadata.height,
                    crate::model::scene_count(metadata.duration)
                );
                self.session.set_metadata(metadata.clone());
                self.session.set_state(AnalysisState::AwaitingConfirmation);
                Ok(metadata)
            }
            Err(e) => {
                self.session.fail(e.to_string());
                Err(e)
            }
        }
    }

    /// Run the whole pipeline on the loaded video.
    ///
    /// Errors are recorded on the session (state ERROR) and also returned.
    pub async fn start_analysis(&mut self, cancel: &CancelFlag) -> Result<AnalysisOutcome> {
        if self.session.video_path().is_none() {
            tracing::warn!("No video loaded");
            return Ok(AnalysisOutcome::Rejected(
                "Please load a video first".to_string(),
            ));
        }
        if self.keys.is_empty() {
            tracing::warn!("No API keys configured");
            return Ok(AnalysisOutcome::Rejected(
                "Please add at least one API key".to_string(),
            ));
        }
        if self.session.state() == AnalysisState::Error {
            return Ok(AnalysisOutcome::Rejected(
                "The previous run failed; reset before starting again".to_string(),
            ));
        }

        cancel.clear();
        self.session.clear_results();

        match self.run(cancel).await {
            Ok(Some(scenes)) => Ok(AnalysisOutcome::Completed { scenes }),
            Ok(None) => {
                tracing::info!("Analysis cancelled in {}", self.session.state());
                Ok(AnalysisOutcome::Cancelled)
            }
            Err(e) => {
                self.session.fail(e.to_string());
                Err(e)
            }
        }
    }

    /// Back to IDLE, dropping the video and all results
    pub fn reset(&mut self) {
        self.session.reset();
        self.keys.first();
    }

    async fn run(&mut self, cancel: &CancelFlag) -> Result<Option<usize>> {
        let Some(path) = self.session.video_path().map(|p| p.to_path_buf()) else {
            return Err(ReplicatorError::invalid_input("no video loaded"));
        };

        if let Some(key) = self.keys.first() {
            self.gateway.activate_key(key);
        }

        // Frames
        if cancel.is_cancelled() {
            return Ok(None);
        }
        self.session.set_state(AnalysisState::ExtractingFrames);
        let frames = {
            let source = Arc::clone(&self.frame_source);
            let report = self.session.extraction_reporter();
            source
                .extract_frames(&path, SAMPLING_INTERVAL_SECS, &report)
                .await?
        };
        if cancel.is_cancelled() {
            return Ok(None);
        }
        self.session.set_extraction_progress(100);
        if frames.is_empty() {
            return Err(ReplicatorError::invalid_input(format!(
                "video is shorter than one {}-second scene",
                SAMPLING_INTERVAL_SECS
            )));
        }
        let images: Vec<String> = frames.iter().map(|f| f.image.clone()).collect();
        let total_scenes = images.len();
        self.session.set_frames(frames);
        tracing::info!("Extracted {} frames", total_scenes);

        // Style
        if cancel.is_cancelled() {
            return Ok(None);
        }
        self.session.set_state(AnalysisState::DetectingStyle);
        let sample = &images[..total_scenes.min(BATCH_SIZE)];
        let token = style::extract_style(self.gateway.as_ref(), sample).await?;
        let token_string = token.token_string.clone();
        self.session.set_style_token(token);

        // Prompts
        let total_batches = batch_count(total_scenes);
        if cancel.is_cancelled() {
            return Ok(None);
        }
        self.session.set_state(AnalysisState::GeneratingPrompts);
        self.session.set_batch_progress(0, 0);
        for batch in 0..total_batches {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            let window = batch_window(batch, total_scenes);
            let batch_images = &images[window.clone()];
            let start = window.start;

            let prompts = with_rotation(
                &mut self.keys,
                &self.gateway,
                self.batch_delay,
                cancel,
                |gateway| {
                    let batch_images = batch_images.to_vec();
                    let token_string = token_string.clone();
                    async move {
                        scene_prompts::generate_batch(
                            gateway.as_ref(),
                            &batch_images,
                            batch,
                            &token_string,
                            start,
                        )
                        .await
                    }
                },
            )
            .await?;
            let Some(prompts) = prompts else {
                return Ok(None);
            };

            self.session.push_prompts(prompts);
            self.session.set_batch_progress(batch + 1, window.end);
            if batch + 1 < total_batches {
                tokio::time::sleep(self.batch_delay).await;
            }
        }

        // Narration
        if cancel.is_cancelled() {
            return Ok(None);
        }
        self.session.set_state(AnalysisState::GeneratingVoiceovers);
        self.session.set_batch_progress(0, 0);
        let settings = self.session.voiceover_settings().clone();
        let language = settings.default_language;
        for batch in 0..total_batches {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            let window = batch_window(batch, total_scenes);
            let batch_images = &images[window.clone()];
            let start = window.start;

            let scripts = with_rotation(
                &mut self.keys,
                &self.gateway,
                self.batch_delay,
                cancel,
                |gateway| {
                    let batch_images = batch_images.to_vec();
                    async move {
                        voiceover::generate_batch(gateway.as_ref(), &batch_images, language, start)
                            .await
                    }
                },
            )
            .await?;
            let Some(scripts) = scripts else {
                return Ok(None);
            };

            self.session.push_voiceovers(scripts);
            self.session.set_batch_progress(batch + 1, window.end);
            if batch + 1 < total_batches {
                tokio::time::sleep(self.batch_delay).await;
            }
        }

        // Always empty in global mode
        let overridden: Vec<_> = settings
            .scene_overrides
            .keys()
            .copied()
            .filter(|&scene| scene < total_scenes)
            .map(|scene| (scene, settings.effective_language(scene)))
            .filter(|&(_, scene_language)| scene_language != language)
            .collect();

        for (scene_index, scene_language) in overridden {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            tokio::time::sleep(self.batch_delay).await;

            let frame = images[scene_index].clone();
            let previous = scene_index
                .checked_sub(1)
                .and_then(|prev| self.session.voiceover_for(prev))
                .map(|v| v.script.clone());

            let script = with_rotation(
                &mut self.keys,
                &self.gateway,
                self.batch_delay,
                cancel,
                |gateway| {
                    let frame = frame.clone();
                    let previous = previous.clone();
                    async move {
                        voiceover::generate_single(
                            gateway.as_ref(),
                            &frame,
                            scene_language,
                            scene_index,
                            previous.as_deref(),
                        )
                        .await
                    }
                },
            )
            .await?;
            let Some(script) = script else {
                return Ok(None);
            };
            self.session.replace_voiceover(script);
        }

        self.session.set_state(AnalysisState::Complete);
        tracing::info!(
            "Analysis complete: {} prompts, {} voiceovers",
            self.session.prompts().len(),
            self.session.voiceovers().len()
        );
        Ok(Some(total_scenes))
    }
}

/// Run `call`, moving to the next API key after each transport failure.
///
/// Gives up with the last error once every key has failed since the streak
/// began. `Ok(None)` means the cancel flag was raised between attempts.
async fn with_rotation<T, F, Fut>(
    keys: &mut KeyPool,
    gateway: &Arc<dyn ModelGateway>,
    retry_delay: Duration,
    cancel: &CancelFlag,
    mut call: F,
) -> Result<Option<T>>
where
    F: FnMut(Arc<dyn ModelGateway>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    loop {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        match call(Arc::clone(gateway)).await {
            Ok(value) => {
                keys.mark_success();
                return Ok(Some(value));
            }
            Err(e) if e.is_retryable() => {
                let total = keys.len();
                let Some(next) = keys.rotate() else {
                    tracing::error!("All {} API keys failed", total);
                    return Err(e);
                };
                tracing::warn!("{}; retrying with key {}", e, mask_key(next));
                gateway.activate_key(next);
                tokio::time::sleep(retry_delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
