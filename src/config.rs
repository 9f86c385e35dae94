//! Configuration parsing and management for facerig

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, FacerigError};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub avatar: AvatarConfig,
    pub tracking: TrackingConfig,
    pub camera: CameraConfig,
    pub render: RenderConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FacerigError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::ReadFile(format!("{}: {}", path.as_ref().display(), e))
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, FacerigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }

    /// Load configuration from default paths
    pub fn load() -> Result<Self, FacerigError> {
        let paths = [
            PathBuf::from("config.toml"),
            PathBuf::from("config/default.toml"),
            dirs_path().join("config.toml"),
        ];

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), FacerigError> {
        if self.avatar.model_path.as_os_str().is_empty() {
            return Err(invalid("avatar.model_path", "Model path must not be empty"));
        }

        if self.avatar.target_size.is_nan() || self.avatar.target_size <= 0.0 {
            return Err(invalid(
                "avatar.target_size",
                "Target size must be greater than 0",
            ));
        }

        // Multi-face tracking is not supported
        if self.tracking.num_faces != 1 {
            return Err(invalid("tracking.num_faces", "Exactly one face is tracked"));
        }

        if self.tracking.port == 0 {
            return Err(invalid("tracking.port", "Port must be greater than 0"));
        }

        if self.tracking.auto_launch {
            let path = Path::new(&self.tracking.tracker_script);
            if !path.exists() {
                tracing::warn!(
                    "Tracking auto_launch enabled but helper script not found at: {}",
                    self.tracking.tracker_script
                );
            }
        }

        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(invalid("camera", "Capture size must be non-zero"));
        }

        if self.camera.frame_rate > self.camera.max_frame_rate {
            return Err(invalid(
                "camera.frame_rate",
                "Ideal frame rate must not exceed max_frame_rate",
            ));
        }

        if self.render.refresh_hz == 0 {
            return Err(invalid("render.refresh_hz", "Refresh rate must be greater than 0"));
        }

        if self.render.width == 0 || self.render.height == 0 {
            return Err(invalid("render", "Viewport size must be non-zero"));
        }

        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> FacerigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
    .into()
}

/// Avatar asset configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarConfig {
    /// Path to the glTF/GLB head model
    pub model_path: PathBuf,
    /// Largest bounding-box dimension after normalization
    pub target_size: f32,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("assets/head.glb"),
            target_size: 0.45,
        }
    }
}

/// Inference compute delegate preference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delegate {
    /// CPU inference (more stable on low-end devices)
    #[default]
    Cpu,
    /// GPU inference
    Gpu,
}

impl std::fmt::Display for Delegate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Delegate::Cpu => write!(f, "CPU"),
            Delegate::Gpu => write!(f, "GPU"),
        }
    }
}

/// Face landmarker + helper transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Start face tracking at all
    pub enabled: bool,
    /// Landmarker model asset location (path or URL)
    pub model_asset_path: String,
    /// Compute delegate
    pub delegate: Delegate,
    /// Emit per-category expression scores
    pub output_face_blendshapes: bool,
    /// Emit the facial transformation matrix
    pub output_transformation_matrixes: bool,
    /// Maximum tracked faces (must be 1)
    pub num_faces: u32,
    /// UDP port to receive helper packets on
    pub port: u16,
    /// Listen address for the UDP socket
    pub listen_address: String,
    /// Launch the helper subprocess automatically
    pub auto_launch: bool,
    /// Path to the helper script
    pub tracker_script: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model_asset_path: "https://storage.googleapis.com/mediapipe-models/face_landmarker/face_landmarker/float16/1/face_landmarker.task".to_string(),
            delegate: Delegate::Cpu,
            output_face_blendshapes: true,
            output_transformation_matrixes: true,
            num_faces: 1,
            port: 12346,
            listen_address: "127.0.0.1".to_string(),
            auto_launch: true,
            tracker_script: "scripts/face_landmarker.py".to_string(),
        }
    }
}

/// Camera stream request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Camera device index
    pub device: u32,
    /// Ideal capture width
    pub width: u32,
    /// Ideal capture height
    pub height: u32,
    /// Ideal capture frame rate
    pub frame_rate: u32,
    /// Upper bound on capture frame rate
    pub max_frame_rate: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: 0,
            width: 640,
            height: 480,
            frame_rate: 30,
            max_frame_rate: 30,
        }
    }
}

/// Render loop, viewport and scene camera
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Display refresh rate driving the loop
    pub refresh_hz: u32,
    /// Initial viewport width
    pub width: u32,
    /// Initial viewport height
    pub height: u32,
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// Camera position [x, y, z]
    pub camera_position: [f32; 3],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            refresh_hz: 60,
            width: 1280,
            height: 720,
            fov_degrees: 45.0,
            near: 0.1,
            far: 100.0,
            camera_position: [0.0, 0.0, 0.5],
        }
    }
}

/// Get the platform-specific configuration directory
fn dirs_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        if let Some(config_dir) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(config_dir).join("facerig");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config/facerig");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join("Library/Application Support/facerig");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("facerig");
        }
    }

    PathBuf::from(".")
}
