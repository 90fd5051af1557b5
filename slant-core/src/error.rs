use std::path::PathBuf;

use thiserror::Error;

/// Setup-time failures. Raised before anything is shown to the subject and
/// never retried.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error(
        "stimulus asset sets differ in size: {colormaps} colormaps, {heightmaps} heightmaps, {normalmaps} normalmaps"
    )]
    MismatchedAssets {
        colormaps: usize,
        heightmaps: usize,
        normalmaps: usize,
    },

    #[error("empty trial design: {0}")]
    EmptyDesign(String),

    #[error("required resource is missing: {path}")]
    MissingResource { path: PathBuf },

    #[error("sensor executable not found: {path}")]
    MissingSensorExecutable { path: PathBuf },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigurationError {
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    #[must_use]
    pub fn missing(path: impl Into<PathBuf>) -> Self {
        Self::MissingResource { path: path.into() }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("texture {path}: {message}")]
    Texture { path: PathBuf, message: String },

    #[error("font error: {0}")]
    Font(String),

    #[error("canvas error: {0}")]
    Canvas(String),
}
