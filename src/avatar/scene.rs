//! Avatar scene graph.
//!
//! A loaded avatar is a tree of [`SceneNode`]s. Nodes may carry a mesh; a mesh
//! may expose morph targets. Geometry itself is owned by the renderer, the
//! scene only keeps what retargeting and normalization need: local transforms,
//! local-space bounds, and morph target names/weights.

use glam::{Mat4, Quat, Vec3};

use crate::retarget::EulerRotation;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Bounds of this box after transforming all eight corners.
    pub fn transformed(&self, m: &Mat4) -> Aabb {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            let p = m.transform_point3(corner);
            min = min.min(p);
            max = max.max(p);
        }
        Aabb { min, max }
    }
}

/// Morph targets exposed by a mesh: target names in index order plus the
/// current influence weights.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MorphTargets {
    /// Target name per index. Unnamed targets are `None`.
    pub names: Vec<Option<String>>,
    /// One weight per target
    pub weights: Vec<f32>,
}

impl MorphTargets {
    /// Build from target names, all weights at rest (0.0).
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<Option<String>> = names.into_iter().map(|n| Some(n.into())).collect();
        let weights = vec![0.0; names.len()];
        Self { names, weights }
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// A mesh attached to a scene node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshNode {
    pub name: String,
    /// Local-space bounds of all primitives
    pub bounds: Option<Aabb>,
    pub morph_targets: Option<MorphTargets>,
}

impl MeshNode {
    /// Whether this mesh exposes a non-empty influence array.
    pub fn has_morph_targets(&self) -> bool {
        self.morph_targets.as_ref().is_some_and(|m| !m.is_empty())
    }
}

/// A node in the avatar hierarchy
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub mesh: Option<MeshNode>,
    pub children: Vec<SceneNode>,
}

impl Default for SceneNode {
    fn default() -> Self {
        Self {
            name: String::new(),
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            mesh: None,
            children: Vec::new(),
        }
    }
}

impl SceneNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_mesh(mut self, mesh: MeshNode) -> Self {
        self.mesh = Some(mesh);
        self
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Depth-first pre-order traversal of this node and all descendants.
    pub fn traverse<'a>(&'a self, visit: &mut impl FnMut(&'a SceneNode)) {
        visit(self);
        for child in &self.children {
            child.traverse(visit);
        }
    }

    fn accumulate_bounds(&self, parent: &Mat4, acc: &mut Option<Aabb>) {
        let world = *parent * self.local_matrix();
        if let Some(bounds) = self.mesh.as_ref().and_then(|m| m.bounds) {
            let b = bounds.transformed(&world);
            *acc = Some(match acc {
                Some(a) => a.union(&b),
                None => b,
            });
        }
        for child in &self.children {
            child.accumulate_bounds(&world, acc);
        }
    }
}

/// Root transform of the avatar head. Retargeting writes `rotation`;
/// normalization writes `translation` and `scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadTransform {
    pub translation: Vec3,
    pub rotation: EulerRotation,
    pub scale: f32,
}

impl Default for HeadTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: EulerRotation::default(),
            scale: 1.0,
        }
    }
}

impl HeadTransform {
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_translation(self.translation)
            * Mat4::from_mat3(self.rotation.to_mat3())
            * Mat4::from_scale(Vec3::splat(self.scale))
    }
}

/// A loaded avatar: the node hierarchy plus its root transform.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AvatarScene {
    pub name: String,
    pub roots: Vec<SceneNode>,
    pub head: HeadTransform,
}

impl AvatarScene {
    pub fn new(name: &str, roots: Vec<SceneNode>) -> Self {
        Self {
            name: name.to_string(),
            roots,
            head: HeadTransform::default(),
        }
    }

    /// Visit every node in the hierarchy.
    pub fn traverse<'a>(&'a self, mut visit: impl FnMut(&'a SceneNode)) {
        for root in &self.roots {
            root.traverse(&mut visit);
        }
    }

    /// World-space bounds including the head transform.
    pub fn bounds(&self) -> Option<Aabb> {
        let head = self.head.matrix();
        let mut acc = None;
        for root in &self.roots {
            root.accumulate_bounds(&head, &mut acc);
        }
        acc
    }

    /// Scale uniformly so the largest dimension equals `target_size`, then
    /// translate so the bounds are centered on the origin.
    ///
    /// Returns the applied scale, or `None` if the scene has no geometry.
    pub fn normalize(&mut self, target_size: f32) -> Option<f32> {
        let bounds = self.bounds()?;
        let size = bounds.size();
        let max_dim = size.x.max(size.y).max(size.z);
        if max_dim <= 0.0 {
            return None;
        }

        let scale = target_size / max_dim;
        self.head.scale *= scale;

        // Recompute after scaling, then shift the center to the origin
        let center = self.bounds()?.center();
        self.head.translation -= center;

        tracing::debug!(
            scale,
            center = ?center,
            "Avatar normalized to {:.3} units",
            target_size
        );
        Some(scale)
    }
}
