pub mod agents;
pub mod config;
pub mod data_url;
pub mod error;
pub mod export;
pub mod gateway;
pub mod keys;
pub mod languages;
pub mod media;
pub mod model;
pub mod pipeline;
pub mod server;
pub mod session;

pub use config::Config;
pub use error::{ReplicatorError, Result};
pub use gateway::{GeminiGateway, ModelGateway, ProxyGateway};
pub use keys::KeyPool;
pub use languages::{LanguageCode, SUPPORTED_LANGUAGES};
pub use media::{FfmpegFrameSource, FrameSource};
pub use pipeline::{AnalysisOutcome, CancelFlag, Orchestrator};
pub use session::{Progress, Session};
