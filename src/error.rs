//! Error types for facerig

use thiserror::Error;

/// Main error type for facerig
#[derive(Error, Debug)]
pub enum FacerigError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Avatar error: {0}")]
    Avatar(#[from] AvatarError),

    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {field} - {message}")]
    InvalidValue { field: String, message: String },
}

/// Avatar asset errors. Any of these means the avatar never loads and the
/// render loop does not start.
#[derive(Error, Debug)]
pub enum AvatarError {
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Failed to import glTF asset: {0}")]
    Import(String),

    #[error("Asset contains no scene: {0}")]
    EmptyScene(String),
}

/// Face tracking errors (helper process, UDP feed, replay, inference)
#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("Invalid landmarker options: {0}")]
    InvalidOptions(String),

    #[error("Tracking helper subprocess error: {0}")]
    Subprocess(String),

    #[error("Tracking receiver error: {0}")]
    Receiver(String),

    #[error("Tracking packet parse error: {0}")]
    Parse(String),

    #[error("Replay error: {0}")]
    Replay(String),

    #[error("No tracking data for frame at {0} ms")]
    FrameUnavailable(f64),

    #[error("Landmark detection failed: {0}")]
    Detect(String),

    #[error("Tracking collaborator panicked: {0}")]
    Panicked(String),
}

/// Renderer errors
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Render failed: {0}")]
    Frame(String),
}

/// Result type alias for facerig operations
pub type Result<T> = std::result::Result<T, FacerigError>;
