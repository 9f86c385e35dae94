//! Facerig - Real-time face tracking to 3D avatar head retargeting
//!
//! Drives a loaded glTF head from a live face landmarker:
//! - Deduplicates camera frames by timestamp
//! - Converts the facial transformation matrix into mirrored head rotation
//! - Maps expression scores onto every morph-target mesh by name
//! - Renders once per display refresh, tracking or not

pub mod avatar;
pub mod config;
pub mod error;
pub mod render;
pub mod retarget;
pub mod tracking;

pub use config::Config;
pub use error::{FacerigError, Result};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Application name
pub const NAME: &str = env!("CARGO_PKG_NAME");
