use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::watch;

use crate::languages::LanguageCode;
use crate::model::{
    batch_count, count_words, scene_count, AnalysisState, ExtractedFrame, GeneratedPrompt,
    GlobalStyleToken, VideoMetadata, VoiceoverScript, VoiceoverSettings,
};

/// Snapshot published to observers after every mutation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub state: AnalysisState,
    pub current_batch: usize,
    pub total_batches: usize,
    pub current_scene: usize,
    pub total_scenes: usize,
    /// Frame extraction percentage, 0 to 100
    pub extraction: u8,
    pub prompts_ready: usize,
    pub voiceovers_ready: usize,
    pub error: Option<String>,
}

/// Everything one analysis run produces.
///
/// The orchestrator is the only writer. Readers either borrow it between runs
/// or follow [`Session::subscribe`].
#[derive(Debug)]
pub struct Session {
    state: AnalysisState,
    video_path: Option<PathBuf>,
    metadata: Option<VideoMetadata>,
    frames: Vec<ExtractedFrame>,
    style_token: Option<GlobalStyleToken>,
    prompts: Vec<GeneratedPrompt>,
    voiceovers: Vec<VoiceoverScript>,
    voiceover_settings: VoiceoverSettings,
    current_batch: usize,
    total_batches: usize,
    current_scene: usize,
    total_scenes: usize,
    extraction: u8,
    error: Option<String>,
    tx: watch::Sender<Progress>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(VoiceoverSettings::default())
    }
}

impl Session {
    pub fn new(voiceover_settings: VoiceoverSettings) -> Self {
        let (tx, _) = watch::channel(Progress::default());
        Self {
            state: AnalysisState::Idle,
            video_path: None,
            metadata: None,
            frames: Vec::new(),
            style_token: None,
            prompts: Vec::new(),
            voiceovers: Vec::new(),
            voiceover_settings,
            current_batch: 0,
            total_batches: 0,
            current_scene: 0,
            total_scenes: 0,
            extraction: 0,
            error: None,
            tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.tx.subscribe()
    }

    pub fn progress(&self) -> Progress {
        Progress {
            state: self.state,
            current_batch: self.current_batch,
            total_batches: self.total_batches,
            current_scene: self.current_scene,
            total_scenes: self.total_scenes,
            extraction: self.extraction,
            prompts_ready: self.prompts.len(),
            voiceovers_ready: self.voiceovers.len(),
            error: self.error.clone(),
        }
    }

    fn publish(&self) {
        self.tx.send_replace(self.progress());
    }

    pub fn state(&self) -> AnalysisState {
        self.state
    }

    pub fn video_path(&self) -> Option<&Path> {
        self.video_path.as_deref()
    }

    pub fn metadata(&self) -> Option<&VideoMetadata> {
        self.metadata.as_ref()
    }

    pub fn frames(&self) -> &[ExtractedFrame] {
        &self.frames
    }

    pub fn style_token(&self) -> Option<&GlobalStyleToken> {
        self.style_token.as_ref()
    }

    pub fn prompts(&self) -> &[GeneratedPrompt] {
        &self.prompts
    }

    pub fn voiceovers(&self) -> &[VoiceoverScript] {
        &self.voiceovers
    }

    pub fn voiceover_settings(&self) -> &VoiceoverSettings {
        &self.voiceover_settings
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn voiceover_for(&self, scene_index: usize) -> Option<&VoiceoverScript> {
        self.voiceovers.iter().find(|v| v.scene_index == scene_index)
    }

    /// A new file was selected; drops everything from the previous video
    pub fn set_video(&mut self, path: impl Into<PathBuf>) {
        self.clear_results();
        self.metadata = None;
        self.total_scenes = 0;
        self.total_batches = 0;
        self.error = None;
        self.video_path = Some(path.into());
        self.state = AnalysisState::Uploading;
        self.publish();
    }

    /// Store probe results and derive the scene and batch totals
    pub fn set_metadata(&mut self, metadata: VideoMetadata) {
        self.total_scenes = scene_count(metadata.duration);
        self.total_batches = batch_count(self.total_scenes);
        self.metadata = Some(metadata);
        self.publish();
    }

    pub fn set_state(&mut self, state: AnalysisState) {
        tracing::debug!("State {} -> {}", self.state, state);
        self.state = state;
        self.publish();
    }

    /// Enter ERROR with a message kept for the caller
    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("Analysis failed: {}", message);
        self.error = Some(message);
        self.state = AnalysisState::Error;
        self.publish();
    }

    /// Publishes extraction percentages while the session is only borrowed
    pub fn extraction_reporter(&self) -> impl Fn(u8) + Send + Sync + '_ {
        move |percent| {
            self.tx.send_modify(|p| p.extraction = percent.min(100));
        }
    }

    pub fn set_extraction_progress(&mut self, percent: u8) {
        self.extraction = percent.min(100);
        self.publish();
    }

    pub fn set_frames(&mut self, frames: Vec<ExtractedFrame>) {
        self.frames = frames;
        self.publish();
    }

    pub fn set_style_token(&mut self, token: GlobalStyleToken) {
        self.style_token = Some(token);
        self.publish();
    }

    pub fn set_batch_progress(&mut self, current_batch: usize, current_scene: usize) {
        self.current_batch = current_batch;
        self.current_scene = current_scene;
        self.publish();
    }

    /// Append a batch of prompts; a scene already present is replaced in place
    pub fn push_prompts(&mut self, prompts: Vec<GeneratedPrompt>) {
        for prompt in prompts {
            match self
                .prompts
                .iter_mut()
                .find(|p| p.scene_index == prompt.scene_index)
            {
                Some(existing) => *existing = prompt,
                None => self.prompts.push(prompt),
            }
        }
        self.publish();
    }

    pub fn push_voiceovers(&mut self, voiceovers: Vec<VoiceoverScript>) {
        for voiceover in voiceovers {
            self.replace_or_push_voiceover(voiceover);
        }
        self.publish();
    }

    pub fn replace_voiceover(&mut self, voiceover: VoiceoverScript) {
        self.replace_or_push_voiceover(voiceover);
        self.publish();
    }

    fn replace_or_push_voiceover(&mut self, voiceover: VoiceoverScript) {
        match self
            .voiceovers
            .iter_mut()
            .find(|v| v.scene_index == voiceover.scene_index)
        {
            Some(existing) => *existing = voiceover,
            None => self.voiceovers.push(voiceover),
        }
    }

    /// Edit a scene's prompt text; `None` leaves that field as it is.
    /// Returns false when the scene has no prompt.
    pub fn update_prompt(
        &mut self,
        scene_index: usize,
        image_prompt: Option<String>,
        video_prompt: Option<String>,
    ) -> bool {
        let Some(prompt) = self.prompts.iter_mut().find(|p| p.scene_index == scene_index) else {
            return false;
        };
        if let Some(text) = image_prompt {
            prompt.image_prompt = text;
        }
        if let Some(text) = video_prompt {
            prompt.video_prompt = text;
        }
        self.publish();
        true
    }

    /// Replace a scene's script and recount its words
    pub fn update_voiceover(&mut self, scene_index: usize, script: impl Into<String>) -> bool {
        let Some(voiceover) = self
            .voiceovers
            .iter_mut()
            .find(|v| v.scene_index == scene_index)
        else {
            return false;
        };
        voiceover.script = script.into();
        voiceover.word_count = count_words(&voiceover.script);
        self.publish();
        true
    }

    pub fn set_voiceover_settings(&mut self, settings: VoiceoverSettings) {
        self.voiceover_settings = settings;
        self.publish();
    }

    pub fn set_scene_language(&mut self, scene_index: usize, language: LanguageCode) {
        self.voiceover_settings
            .scene_overrides
            .insert(scene_index, language);
        self.publish();
    }

    /// Forget results of the previous run, keeping the loaded video
    pub fn clear_results(&mut self) {
        self.frames.clear();
        self.style_token = None;
        self.prompts.clear();
        self.voiceovers.clear();
        self.current_batch = 0;
        self.current_scene = 0;
        self.extraction = 0;
        self.error = None;
    }

    /// Back to IDLE with nothing loaded; voiceover settings are kept
    pub fn reset(&mut self) {
        self.clear_results();
        self.video_path = None;
        self.metadata = None;
        self.total_scenes = 0;
        self.total_batches = 0;
        self.state = AnalysisState::Idle;
        self.publish();
    }
}
