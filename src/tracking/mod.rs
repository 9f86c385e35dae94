//! Tracking module
//!
//! Face tracking capabilities feeding the render loop:
//! - MediaPipe Face Landmarker helper (JSON over UDP)
//! - Recorded packet replay
//!
//! Both expose the same [`VideoSource`] + [`LandmarkSource`] pair, bundled
//! into a [`TrackingSession`] once initialization succeeds.

pub mod init;
pub mod mediapipe;
pub mod replay;
pub mod source;
pub mod subprocess;
pub mod types;

pub use init::{initialize_replay, initialize_tracking};
pub use source::{LandmarkSource, LandmarkerOptions, TrackingSession, VideoSource};
pub use types::{Category, FrameHandle, ReadyState, TrackingResult, VideoFrame};
