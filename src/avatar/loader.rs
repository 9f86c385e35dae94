//! glTF/GLB avatar loader using the `gltf` crate.
//!
//! Builds an [`AvatarScene`] from the default scene of the asset: node
//! hierarchy, local transforms, primitive bounds, and morph target names and
//! default weights per mesh.

use glam::{Quat, Vec3};
use std::path::Path;

use super::scene::{Aabb, AvatarScene, MeshNode, MorphTargets, SceneNode};
use crate::error::{AvatarError, FacerigError};

/// Load a glTF or GLB file into an avatar scene.
pub fn load_avatar<P: AsRef<Path>>(path: P) -> Result<AvatarScene, FacerigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(AvatarError::AssetNotFound(path.display().to_string()).into());
    }

    let (document, _buffers, _images) = gltf::import(path)
        .map_err(|e| AvatarError::Import(format!("{}: {}", path.display(), e)))?;

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| AvatarError::EmptyScene(path.display().to_string()))?;

    let roots: Vec<SceneNode> = scene.nodes().map(|n| convert_node(&n)).collect();

    let name = scene
        .name()
        .map(String::from)
        .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_default();

    let avatar = AvatarScene::new(&name, roots);

    let mut node_count = 0;
    let mut morph_meshes = 0;
    avatar.traverse(|n| {
        node_count += 1;
        if n.mesh.as_ref().is_some_and(MeshNode::has_morph_targets) {
            morph_meshes += 1;
        }
    });
    tracing::info!(
        "Avatar loaded from {}: {} nodes, {} meshes with morph targets",
        path.display(),
        node_count,
        morph_meshes
    );

    Ok(avatar)
}

fn convert_node(node: &gltf::Node) -> SceneNode {
    let (t, r, s) = node.transform().decomposed();

    let mesh = node.mesh().map(|mesh| convert_mesh(node, &mesh));

    SceneNode {
        name: node
            .name()
            .map(String::from)
            .unwrap_or_else(|| format!("node_{}", node.index())),
        translation: Vec3::from(t),
        rotation: Quat::from_array(r),
        scale: Vec3::from(s),
        mesh,
        children: node.children().map(|c| convert_node(&c)).collect(),
    }
}

fn convert_mesh(node: &gltf::Node, mesh: &gltf::Mesh) -> MeshNode {
    let name = mesh
        .name()
        .or_else(|| node.name())
        .map(String::from)
        .unwrap_or_else(|| format!("mesh_{}", mesh.index()));

    let mut bounds: Option<Aabb> = None;
    for prim in mesh.primitives() {
        let bb = prim.bounding_box();
        let b = Aabb::new(Vec3::from(bb.min), Vec3::from(bb.max));
        bounds = Some(match bounds {
            Some(acc) => acc.union(&b),
            None => b,
        });
    }

    // All primitives of a mesh share the same morph target count
    let target_count = mesh
        .primitives()
        .next()
        .map(|p| p.morph_targets().count())
        .unwrap_or(0);

    let morph_targets = if target_count > 0 {
        let mut names: Vec<Option<String>> =
            parse_morph_target_names(mesh).into_iter().map(Some).collect();
        names.resize(target_count, None);

        // Node weights override mesh weights
        let mut weights: Vec<f32> = node
            .weights()
            .or_else(|| mesh.weights())
            .map(|w| w.to_vec())
            .unwrap_or_default();
        weights.resize(target_count, 0.0);

        Some(MorphTargets { names, weights })
    } else {
        None
    };

    MeshNode {
        name,
        bounds,
        morph_targets,
    }
}

/// Parse morph target names from mesh extras JSON, stripping any shared prefix.
fn parse_morph_target_names(mesh: &gltf::Mesh) -> Vec<String> {
    if let Some(extras) = mesh.extras().as_ref() {
        if let Ok(val) = serde_json::from_str::<serde_json::Value>(extras.get()) {
            if let Some(names) = val.get("targetNames").and_then(|v| v.as_array()) {
                let raw: Vec<String> = names
                    .iter()
                    .filter_map(|n| n.as_str().map(String::from))
                    .collect();
                return strip_morph_prefixes(raw);
            }
        }
    }
    Vec::new()
}

/// Strip a shared dot-delimited prefix from morph target names.
///
/// Exporters often write names as `"Face_Blendshape.jawOpen"`; expression
/// categories are bare (`"jawOpen"`), so the mesh-level prefix has to go.
/// Only stripped when *all* names share the same `<something>.` prefix.
fn strip_morph_prefixes(names: Vec<String>) -> Vec<String> {
    if names.len() < 2 {
        return names;
    }

    let first_dot = match names[0].find('.') {
        Some(pos) => pos,
        None => return names,
    };
    let prefix_len = first_dot + 1;

    let prefix = &names[0][..prefix_len];
    if !names.iter().all(|n| n.starts_with(prefix)) {
        return names;
    }

    names
        .into_iter()
        .map(|n| n[prefix_len..].to_string())
        .collect()
}
