//! Avatar module
//!
//! Scene graph of the loaded head model, glTF loading, and the registry of
//! meshes whose morph targets are driven by expression scores.

pub mod loader;
pub mod registry;
pub mod scene;

pub use loader::load_avatar;
pub use registry::{AvatarMesh, MeshRegistry};
pub use scene::{Aabb, AvatarScene, HeadTransform, MeshNode, MorphTargets, SceneNode};
