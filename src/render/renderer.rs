//! Scene camera and the renderer capability
//!
//! Drawing is out of scope for the retargeting core: the loop hands the
//! current [`RetargetState`] and [`Camera`] to a [`Renderer`] once per tick.
//! [`HeadlessRenderer`] computes the per-frame transforms and traces them.

use glam::{Mat4, Vec3, Vec4};

use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::retarget::RetargetState;

/// Perspective camera looking at the origin, where the normalized head sits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
}

impl Camera {
    pub fn from_config(config: &RenderConfig) -> Self {
        let mut camera = Self {
            fov_degrees: config.fov_degrees,
            aspect: 1.0,
            near: config.near,
            far: config.far,
            position: Vec3::from_array(config.camera_position),
        };
        camera.set_aspect(config.width, config.height);
        camera
    }

    /// Update the aspect ratio for a new viewport size. Zero sizes are ignored.
    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.aspect = width as f32 / height as f32;
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_degrees.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, Vec3::ZERO, Vec3::Y)
    }

    /// Project a world-space point to normalized device coordinates.
    pub fn project(&self, point: Vec3) -> Vec3 {
        let clip = self.projection_matrix() * self.view_matrix() * Vec4::from((point, 1.0));
        clip.truncate() / clip.w
    }
}

/// Presents the scene once per tick
pub trait Renderer {
    fn render(&mut self, state: &RetargetState, camera: &Camera) -> Result<(), RenderError>;

    /// Viewport resized
    fn set_size(&mut self, width: u32, height: u32);
}

/// Renderer without a display: computes the head transform and projected
/// position, traces them, and counts frames.
#[derive(Debug, Clone, Default)]
pub struct HeadlessRenderer {
    frames: u64,
    size: (u32, u32),
}

impl HeadlessRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            frames: 0,
            size: (width, height),
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }
}

impl Renderer for HeadlessRenderer {
    fn render(&mut self, state: &RetargetState, camera: &Camera) -> Result<(), RenderError> {
        let head = state.avatar().head;
        let center = head.matrix().transform_point3(Vec3::ZERO);
        let ndc = camera.project(center);
        if !ndc.is_finite() {
            return Err(RenderError::Frame(format!(
                "head projects to non-finite position {:?}",
                ndc
            )));
        }

        self.frames += 1;

        if tracing::enabled!(tracing::Level::TRACE) {
            let active: usize = state
                .meshes()
                .iter()
                .map(|m| m.influences().iter().filter(|w| **w > 0.0).count())
                .sum();
            tracing::trace!(
                frame = self.frames,
                rx = head.rotation.x,
                ry = head.rotation.y,
                rz = head.rotation.z,
                active_influences = active,
                "Rendered head at ndc ({:.3}, {:.3})",
                ndc.x,
                ndc.y
            );
        }

        Ok(())
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        tracing::debug!("Viewport resized to {}x{}", width, height);
    }
}
