//! Per-avatar retargeting state.

use super::expression::ExpressionRetargeter;
use super::frame_gate::FrameGate;
use super::pose::{EulerRotation, PoseRetargeter};
use crate::avatar::{AvatarScene, MeshRegistry};
use crate::tracking::TrackingResult;

/// What a single tracking result changed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameUpdate {
    /// New head rotation, if a pose was present
    pub rotation: Option<EulerRotation>,
    /// Number of morph influences written
    pub influences_written: usize,
}

/// Everything the render loop mutates: the avatar (head transform), its
/// morph-target meshes, and the frame gate.
///
/// Created when an avatar finishes loading; dropped on avatar swap or
/// session end.
#[derive(Debug, Clone, PartialEq)]
pub struct RetargetState {
    avatar: AvatarScene,
    meshes: MeshRegistry,
    gate: FrameGate,
}

impl RetargetState {
    /// Take ownership of a (normalized) avatar and build its mesh registry.
    pub fn new(avatar: AvatarScene) -> Self {
        let meshes = MeshRegistry::build(&avatar);
        Self {
            avatar,
            meshes,
            gate: FrameGate::new(),
        }
    }

    pub fn avatar(&self) -> &AvatarScene {
        &self.avatar
    }

    pub fn meshes(&self) -> &MeshRegistry {
        &self.meshes
    }

    pub fn head_rotation(&self) -> EulerRotation {
        self.avatar.head.rotation
    }

    pub fn last_processed_timestamp(&self) -> Option<f64> {
        self.gate.last_processed()
    }

    pub fn gate_mut(&mut self) -> &mut FrameGate {
        &mut self.gate
    }

    /// Apply one tracking result: pose if present, expressions if present and
    /// there is at least one registered mesh.
    pub fn apply(&mut self, result: &TrackingResult) -> FrameUpdate {
        let mut update = FrameUpdate::default();

        if let Some(pose) = &result.pose {
            let rotation = PoseRetargeter::retarget(pose);
            self.avatar.head.rotation = rotation;
            update.rotation = Some(rotation);
        }

        if let Some(expressions) = &result.expressions {
            if !self.meshes.is_empty() {
                update.influences_written = ExpressionRetargeter::apply(expressions, &mut self.meshes);
            }
        }

        update
    }
}
