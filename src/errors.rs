use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScreenLoopError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Planning request failed: {0}")]
    Planning(String),

    #[error("Planning request rejected ({status}): {body}")]
    PlanningStatus { status: u16, body: String },

    #[error("Surface unavailable: {0}")]
    SurfaceUnavailable(String),

    #[error("Action execution failed: {0}")]
    ActionExecution(String),

    #[error("Unrecognized action: {0}")]
    UnrecognizedAction(String),

    #[error("Safety check rejected: {0}")]
    SafetyViolation(String),

    #[error("Container command failed: {0}")]
    Container(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),


    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Task cancelled")]
    Cancelled,
}

impl ScreenLoopError {
    /// Per-action failures stay local to the executor; everything else ends the loop.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ScreenLoopError::ActionExecution(_) | ScreenLoopError::UnrecognizedAction(_)
        )
    }

    /// Whether a planning round trip that failed this way may be sent again.
    pub fn is_retryable(&self) -> bool {
        match self {
            ScreenLoopError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.status().is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
            }
            ScreenLoopError::PlanningStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type ScreenLoopResult<T> = Result<T, ScreenLoopError>;
