//! Retargeting core
//!
//! Frame deduplication, head pose conversion, and expression → morph target
//! mapping, plus the state they mutate.

pub mod expression;
pub mod frame_gate;
pub mod pose;
pub mod state;

pub use expression::ExpressionRetargeter;
pub use frame_gate::FrameGate;
pub use pose::{EulerRotation, PoseMatrix, PoseRetargeter};
pub use state::{FrameUpdate, RetargetState};
