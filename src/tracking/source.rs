//! Capabilities consumed by the render loop: a video stream and a landmark
//! detector.

use crate::config::{Delegate, TrackingConfig};
use crate::error::TrackingError;

use super::types::{ReadyState, TrackingResult, VideoFrame};

/// A live video stream whose position and readiness can be polled.
pub trait VideoSource: Send {
    /// Poll the stream and report how much data is available.
    fn ready_state(&mut self) -> Result<ReadyState, TrackingError>;

    /// The frame at the current stream position.
    fn current_frame(&mut self) -> Result<VideoFrame, TrackingError>;
}

/// Face landmark inference. Given a frame and its timestamp, yields at most
/// one pose and at most one expression set.
pub trait LandmarkSource: Send {
    fn detect(&mut self, frame: &VideoFrame, timestamp_ms: f64)
        -> Result<TrackingResult, TrackingError>;
}

/// Options passed to the landmark inference engine at initialization.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkerOptions {
    pub model_asset_path: String,
    pub delegate: Delegate,
    pub output_face_blendshapes: bool,
    pub output_transformation_matrixes: bool,
    pub num_faces: u32,
}

impl LandmarkerOptions {
    pub fn from_config(config: &TrackingConfig) -> Self {
        Self {
            model_asset_path: config.model_asset_path.clone(),
            delegate: config.delegate,
            output_face_blendshapes: config.output_face_blendshapes,
            output_transformation_matrixes: config.output_transformation_matrixes,
            num_faces: config.num_faces,
        }
    }

    pub fn validate(&self) -> Result<(), TrackingError> {
        if self.model_asset_path.is_empty() {
            return Err(TrackingError::InvalidOptions(
                "model_asset_path is empty".to_string(),
            ));
        }
        if self.num_faces != 1 {
            return Err(TrackingError::InvalidOptions(format!(
                "num_faces must be 1, got {}",
                self.num_faces
            )));
        }
        if !self.output_face_blendshapes && !self.output_transformation_matrixes {
            return Err(TrackingError::InvalidOptions(
                "at least one of blendshapes or transformation matrixes must be enabled"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// An initialized tracking capability: camera stream + detector, plus
/// whatever must stay alive alongside them (e.g. a helper process).
pub struct TrackingSession {
    pub video: Box<dyn VideoSource>,
    pub landmarker: Box<dyn LandmarkSource>,
    _keepalive: Option<Box<dyn Send>>,
}

impl TrackingSession {
    pub fn new(video: Box<dyn VideoSource>, landmarker: Box<dyn LandmarkSource>) -> Self {
        Self {
            video,
            landmarker,
            _keepalive: None,
        }
    }

    /// Keep `resource` alive for as long as the session exists.
    pub fn with_keepalive<T: Send + 'static>(mut self, resource: T) -> Self {
        self._keepalive = Some(Box::new(resource));
        self
    }
}

impl std::fmt::Debug for TrackingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingSession").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_default_config() {
        let options = LandmarkerOptions::from_config(&TrackingConfig::default());
        assert_eq!(options.num_faces, 1);
        assert_eq!(options.delegate, Delegate::Cpu);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_reject_multi_face() {
        let mut options = LandmarkerOptions::from_config(&TrackingConfig::default());
        options.num_faces = 3;
        assert!(matches!(
            options.validate(),
            Err(TrackingError::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_options_require_an_output() {
        let mut options = LandmarkerOptions::from_config(&TrackingConfig::default());
        options.output_face_blendshapes = false;
        options.output_transformation_matrixes = false;
        assert!(options.validate().is_err());
    }
}
