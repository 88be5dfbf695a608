use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReplicatorError>;

#[derive(Error, Debug)]
pub enum ReplicatorError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("API key not set: {0}")]
    Auth(String),

    #[error("Model request failed: {0}")]
    Transport(String),

    #[error("Failed to parse model response as JSON: {message}")]
    MalformedResponse { message: String, text: String },

    #[error("Media error: {0}")]
    Media(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReplicatorError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn media(msg: impl Into<String>) -> Self {
        Self::Media(msg.into())
    }

    /// Error code for JSON output
    pub fn code(&self) -> &'static str {
        match self {
            ReplicatorError::InvalidInput(_) => "INVALID_INPUT",
            ReplicatorError::Auth(_) => "AUTH_ERROR",
            ReplicatorError::Transport(_) => "TRANSPORT_ERROR",
            ReplicatorError::MalformedResponse { .. } => "MALFORMED_RESPONSE",
            ReplicatorError::Media(_) => "MEDIA_ERROR",
            ReplicatorError::Export(_) => "EXPORT_FAILED",
            ReplicatorError::Config(_) => "CONFIG_ERROR",
            ReplicatorError::Io(_) => "IO_ERROR",
        }
    }

    /// Only provider/network failures are worth retrying on another API key.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReplicatorError::Transport(_))
    }
}
