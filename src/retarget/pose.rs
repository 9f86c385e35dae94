//! Head pose retargeting.
//!
//! The landmarker reports head orientation in camera space with Y and Z
//! rotation senses mirrored relative to the avatar's local axes. Negating
//! those two Euler components makes the avatar mirror the tracked head.

use glam::{Mat3, Mat4};

/// Euler angles in radians, applied in XYZ order (R = Rx * Ry * Rz).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EulerRotation {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl EulerRotation {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Decompose the rotational part of a matrix (assumed unscaled).
    ///
    /// No normalization and no singularity handling beyond the standard
    /// gimbal branch; degenerate input yields whatever the formulas give.
    pub fn from_mat3(m: &Mat3) -> Self {
        // glam is column-major: m.col(c)[r]
        let m11 = m.x_axis.x;
        let m12 = m.y_axis.x;
        let m13 = m.z_axis.x;
        let m22 = m.y_axis.y;
        let m23 = m.z_axis.y;
        let m32 = m.y_axis.z;
        let m33 = m.z_axis.z;

        let y = m13.clamp(-1.0, 1.0).asin();
        if m13.abs() < 0.999_999_9 {
            Self {
                x: (-m23).atan2(m33),
                y,
                z: (-m12).atan2(m11),
            }
        } else {
            Self {
                x: m32.atan2(m22),
                y,
                z: 0.0,
            }
        }
    }

    pub fn to_mat3(&self) -> Mat3 {
        Mat3::from_rotation_x(self.x) * Mat3::from_rotation_y(self.y) * Mat3::from_rotation_z(self.z)
    }
}

/// A 4x4 head transformation matrix in camera space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseMatrix(Mat4);

impl PoseMatrix {
    pub const IDENTITY: Self = Self(Mat4::IDENTITY);

    /// Build from 16 values in row-major order.
    pub fn from_row_major(data: &[f32; 16]) -> Self {
        Self(Mat4::from_cols_array(data).transpose())
    }

    /// Build from a slice of 16 row-major values.
    pub fn from_row_major_slice(data: &[f32]) -> Option<Self> {
        let arr: &[f32; 16] = data.try_into().ok()?;
        Some(Self::from_row_major(arr))
    }

    pub fn from_mat4(m: Mat4) -> Self {
        Self(m)
    }

    pub fn as_mat4(&self) -> &Mat4 {
        &self.0
    }

    /// Rotation-only matrix from Euler angles.
    pub fn from_rotation(rotation: EulerRotation) -> Self {
        Self(Mat4::from_mat3(rotation.to_mat3()))
    }
}

/// Converts camera-space head matrices into avatar rotations.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoseRetargeter;

impl PoseRetargeter {
    /// Decompose to Euler XYZ and apply the axis-sign correction `(x, -y, -z)`.
    pub fn retarget(matrix: &PoseMatrix) -> EulerRotation {
        let raw = EulerRotation::from_mat3(&Mat3::from_mat4(matrix.0));
        Self::correct_axes(raw)
    }

    /// Map camera-space Euler angles onto the avatar's forward-facing space.
    pub fn correct_axes(raw: EulerRotation) -> EulerRotation {
        EulerRotation {
            x: raw.x,
            y: -raw.y,
            z: -raw.z,
        }
    }
}
