use slant_core::{ConfigurationError, RenderError};
use slant_sensor::SensorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("record i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("every record name for {label} session {session} is taken")]
    NamesExhausted { label: String, session: u32 },
}

/// Anything that ends a running session early.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Sensor(#[from] SensorError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Recorder(#[from] RecorderError),
}
