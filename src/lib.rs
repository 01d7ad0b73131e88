//! # MACE
//!
//! **M.A.C.E. - Mesh Atlas Combine Engine**
//!
//! Batches the renderers under a scene root into a handful of draw
//! calls: textures are packed into per-slot atlases, UVs remapped into
//! the assigned atlas rectangles, and geometries folded into combined
//! meshes under a vertex budget. Skinned renderers keep working through
//! a duplicated, merged bone hierarchy.
//!
//! ## Features
//!
//! - **Atlasing**: multi-slot texture atlases (diffuse, normal,
//!   specular, emission, custom shader slots) sharing one layout
//! - **UV remapping**: bounding-box normalization with tiling support
//!   for UVs outside [0, 1]
//! - **Mesh folding**: vertex-budgeted accumulation that never splits
//!   an object
//! - **Skinning**: bone hierarchy merging, bind pose and bone weight
//!   rewriting, blend-shape carryover
//! - **Sessions**: progress reporting, cancellation, undo, instance
//!   removal from combined meshes
//! - **Export**: PNG atlases, JSON material descriptors, OBJ meshes
//!
//! ## Example
//!
//! ```rust
//! use mace_combine::prelude::*;
//!
//! let mut scene = Scene::new();
//! // ... fill the scene with materials and renderable objects ...
//!
//! let mut session = CombineSession::new(CombineSettings::default());
//! let mut progress = |phase: CombinePhase, done: f32| {
//!     log::debug!("{}: {:.0}%", phase.label(), done * 100.0);
//!     true
//! };
//! match session.combine(&mut scene, &mut progress) {
//!     Ok(()) => println!("{} meshes", session.result().meshes.len()),
//!     Err(CombineError::NoMeshes) => println!("nothing to combine"),
//!     Err(e) => eprintln!("combine failed: {e}"),
//! }
//! ```
//!
//! ## Author
//!
//! Moroya Sakamoto

#![warn(missing_docs)]

pub mod atlas;
pub mod bones;
pub mod combine;
pub mod export;
pub mod geometry;
pub mod material;
pub mod progress;
pub mod result;
pub mod scene;
pub mod session;
pub mod types;
pub mod uv;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude - commonly used types and functions
pub mod prelude {
    pub use crate::atlas::TexturePacker;
    pub use crate::bones::{bone_roots, merge_bone_hierarchies, BoneMergeResult};
    pub use crate::combine::{MeshCombiner, SkinnedData};
    pub use crate::export::{ExportError, ExportOptions, Exporter};
    pub use crate::geometry::{BlendShapeFrame, BoneWeight, GeometryBuffer};
    pub use crate::material::{MaterialDescriptor, Texture, MAIN_TEX};
    pub use crate::progress::{silent, CombinePhase};
    pub use crate::result::{CombinedMesh, CombinedResult, InstanceRecord};
    pub use crate::scene::{
        RenderableObject, RendererKind, Scene, TransformHierarchy, TransformNode,
    };
    pub use crate::session::{
        CombineError, CombineSession, CombineSettings, CombineState, TEXTURE_ATLAS_SIZES,
    };
    pub use crate::types::{Aabb, MaterialId, ObjectId, Rect, Rgba};
    pub use crate::uv::{remap_uvs, shrink_for_tiling, uv_bounds};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
