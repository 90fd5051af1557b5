use thiserror::Error;

/// Failures talking to the tilt sensor. All of them end the running session.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("sensor i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sensor output ended while waiting for a reply to `{command}`")]
    UnexpectedEof { command: &'static str },

    #[error("malformed reply to `{command}`: {line:?}")]
    Malformed { command: &'static str, line: String },

    #[error("sensor process exited ({status})")]
    Exited { status: String },

    #[error("sensor connection already closed")]
    Closed,
}
