//! Expression retargeting: category scores → morph target influences.

use crate::avatar::MeshRegistry;
use crate::tracking::Category;

/// Writes expression scores into every registered mesh.
///
/// Names are matched exactly (case-sensitive) against each mesh's own
/// mapping. Scores overwrite the previous influence directly; targets that
/// receive no score this frame keep their value.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionRetargeter;

impl ExpressionRetargeter {
    /// Apply `expressions` to all meshes. Returns the number of influences
    /// written.
    pub fn apply(expressions: &[Category], meshes: &mut MeshRegistry) -> usize {
        let mut written = 0;
        for mesh in meshes.iter_mut() {
            for category in expressions {
                if mesh.set_influence(&category.name, category.score) {
                    written += 1;
                }
            }
        }
        written
    }
}
