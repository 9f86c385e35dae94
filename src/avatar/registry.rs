//! Registry of morph-target-bearing meshes.
//!
//! Built once per avatar. Each [`AvatarMesh`] owns its own name → index
//! mapping; two meshes may map the same expression name to different indices,
//! or not at all.

use std::collections::HashMap;

use super::scene::{AvatarScene, MeshNode};

/// A mesh whose morph target influences are driven by expression scores.
#[derive(Debug, Clone, PartialEq)]
pub struct AvatarMesh {
    name: String,
    /// Morph target name → index into `influences`. Fixed after construction.
    name_to_index: HashMap<String, usize>,
    influences: Vec<f32>,
}

impl AvatarMesh {
    /// Create a mesh from an explicit mapping and initial influences.
    ///
    /// Mapping entries pointing past the end of `influences` are dropped so
    /// that every mapped index is writable.
    pub fn new(name: &str, name_to_index: HashMap<String, usize>, influences: Vec<f32>) -> Self {
        let len = influences.len();
        let name_to_index = name_to_index
            .into_iter()
            .filter(|(target, idx)| {
                if *idx >= len {
                    tracing::warn!(
                        "Mesh '{}': morph target '{}' index {} out of range ({} targets)",
                        name,
                        target,
                        idx,
                        len
                    );
                    false
                } else {
                    true
                }
            })
            .collect();

        Self {
            name: name.to_string(),
            name_to_index,
            influences,
        }
    }

    /// Build from a scene mesh. Returns `None` unless the mesh has morph targets.
    pub fn from_mesh(mesh: &MeshNode) -> Option<Self> {
        if !mesh.has_morph_targets() {
            return None;
        }
        let targets = mesh.morph_targets.as_ref()?;

        let mut name_to_index = HashMap::new();
        for (i, name) in targets.names.iter().enumerate() {
            if let Some(name) = name {
                // First occurrence wins on duplicate names
                name_to_index.entry(name.clone()).or_insert(i);
            }
        }

        Some(Self::new(&mesh.name, name_to_index, targets.weights.clone()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index_of(&self, target: &str) -> Option<usize> {
        self.name_to_index.get(target).copied()
    }

    pub fn influences(&self) -> &[f32] {
        &self.influences
    }

    /// Set the influence for a named target. Unknown names are ignored.
    ///
    /// Returns whether a weight was written.
    pub fn set_influence(&mut self, target: &str, value: f32) -> bool {
        match self.name_to_index.get(target) {
            Some(&idx) => {
                self.influences[idx] = value;
                true
            }
            None => false,
        }
    }
}

/// All retargetable meshes of the currently loaded avatar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshRegistry {
    meshes: Vec<AvatarMesh>,
}

impl MeshRegistry {
    /// Walk the full avatar hierarchy and collect every mesh that exposes
    /// morph targets.
    pub fn build(scene: &AvatarScene) -> Self {
        let mut meshes = Vec::new();
        scene.traverse(|node| {
            if let Some(mesh) = node.mesh.as_ref().and_then(AvatarMesh::from_mesh) {
                tracing::info!(
                    "Mesh with blendshapes added: {} ({} targets)",
                    mesh.name(),
                    mesh.influences().len()
                );
                meshes.push(mesh);
            }
        });
        Self { meshes }
    }

    pub fn from_meshes(meshes: Vec<AvatarMesh>) -> Self {
        Self { meshes }
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AvatarMesh> {
        self.meshes.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, AvatarMesh> {
        self.meshes.iter_mut()
    }

    pub fn get(&self, name: &str) -> Option<&AvatarMesh> {
        self.meshes.iter().find(|m| m.name == name)
    }
}
