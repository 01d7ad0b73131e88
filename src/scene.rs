//! Host-facing scene input model
//!
//! The host engine supplies a tree of renderable objects below a chosen
//! root: geometry handles, ordered material lists, transforms, enabled
//! flags and bone references. Transforms live in an index-based arena
//! (`TransformHierarchy`), so bone merging can clone subtrees and build
//! old-to-new correspondence tables without graph mutation.
//!
//! Author: Moroya Sakamoto

use crate::geometry::GeometryBuffer;
use crate::material::MaterialDescriptor;
use crate::types::{MaterialId, ObjectId};
use glam::{Mat4, Quat, Vec3};
use std::collections::HashMap;

/// Animator settings carried when duplicating bone hierarchies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimatorDesc {
    /// Avatar asset name
    pub avatar: String,
    /// Runtime controller asset name
    pub controller: String,
    /// Culling mode identifier
    pub culling_mode: u8,
    /// Update mode identifier
    pub update_mode: u8,
    /// Whether root motion is applied
    pub apply_root_motion: bool,
}

/// One transform node in the arena
#[derive(Debug, Clone)]
pub struct TransformNode {
    /// Stable identity of the host transform
    pub id: ObjectId,
    /// Node name
    pub name: String,
    /// Local translation
    pub local_position: Vec3,
    /// Local rotation
    pub local_rotation: Quat,
    /// Local scale
    pub local_scale: Vec3,
    /// Parent index in the arena, `None` for roots
    pub parent: Option<usize>,
    /// Child indices in the arena
    pub children: Vec<usize>,
    /// Animator attached to this node, if any
    pub animator: Option<AnimatorDesc>,
}

impl TransformNode {
    /// Local TRS matrix
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            self.local_scale,
            self.local_rotation,
            self.local_position,
        )
    }
}

/// Index-based transform arena
#[derive(Debug, Clone, Default)]
pub struct TransformHierarchy {
    /// All nodes; indices are stable for the arena's lifetime
    pub nodes: Vec<TransformNode>,
    id_to_index: HashMap<ObjectId, usize>,
}

impl TransformHierarchy {
    /// Empty arena
    pub fn new() -> Self {
        TransformHierarchy::default()
    }

    /// Add a node under an optional parent, returning its index
    pub fn add_node(
        &mut self,
        id: ObjectId,
        name: impl Into<String>,
        local_position: Vec3,
        local_rotation: Quat,
        local_scale: Vec3,
        parent: Option<usize>,
    ) -> usize {
        let index = self.nodes.len();
        self.nodes.push(TransformNode {
            id,
            name: name.into(),
            local_position,
            local_rotation,
            local_scale,
            parent,
            children: Vec::new(),
            animator: None,
        });
        if let Some(p) = parent {
            self.nodes[p].children.push(index);
        }
        self.id_to_index.insert(id, index);
        index
    }

    /// Look up a node index by its stable id
    pub fn index_of(&self, id: ObjectId) -> Option<usize> {
        self.id_to_index.get(&id).copied()
    }

    /// Node count
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// World (root-relative) matrix of a node
    pub fn world_matrix(&self, index: usize) -> Mat4 {
        let node = &self.nodes[index];
        match node.parent {
            Some(p) => self.world_matrix(p) * node.local_matrix(),
            None => node.local_matrix(),
        }
    }

    /// Indices of a node's entire subtree, the node itself first,
    /// children in depth-first declaration order
    pub fn subtree(&self, index: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![index];
        while let Some(i) = stack.pop() {
            out.push(i);
            // Reverse push keeps declaration order in depth-first output
            for &child in self.nodes[i].children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Ancestor chain of a node, nearest parent first
    pub fn ancestors(&self, index: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut current = self.nodes[index].parent;
        while let Some(i) = current {
            out.push(i);
            current = self.nodes[i].parent;
        }
        out
    }
}

/// The kind of renderer an object carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererKind {
    /// Static mesh renderer
    Mesh,
    /// Skinned mesh renderer with bones and bind poses
    SkinnedMesh,
}

/// One renderable object discovered under the scope root
#[derive(Debug, Clone)]
pub struct RenderableObject {
    /// Stable identity
    pub id: ObjectId,
    /// Object name
    pub name: String,
    /// Geometry snapshot
    pub geometry: GeometryBuffer,
    /// Ordered material references, one per submesh
    pub materials: Vec<MaterialId>,
    /// Local-to-world transform
    pub transform: Mat4,
    /// Whether the renderer is enabled
    pub enabled: bool,
    /// Renderer kind
    pub kind: RendererKind,
    /// Bone node indices into the scene's transform arena (skinned only)
    pub bones: Vec<usize>,
}

impl RenderableObject {
    /// Whether this object is skinned
    pub fn is_skinned(&self) -> bool {
        self.kind == RendererKind::SkinnedMesh
    }
}

/// Snapshot of the scope root's subtree handed to a combine session
#[derive(Debug, Clone, Default)]
pub struct Scene {
    /// All renderable objects in discovery order
    pub objects: Vec<RenderableObject>,
    /// Material snapshots by id
    pub materials: HashMap<MaterialId, MaterialDescriptor>,
    /// Transform arena holding bone hierarchies
    pub hierarchy: TransformHierarchy,
}

impl Scene {
    /// Empty scene
    pub fn new() -> Self {
        Scene::default()
    }

    /// Register a material snapshot
    pub fn add_material(&mut self, material: MaterialDescriptor) {
        self.materials.insert(material.id, material);
    }

    /// Add a renderable object
    pub fn add_object(&mut self, object: RenderableObject) {
        self.objects.push(object);
    }

    /// Enabled static meshes with geometry and at least one material,
    /// in discovery order
    pub fn enabled_meshes(&self) -> Vec<&RenderableObject> {
        self.objects
            .iter()
            .filter(|o| {
                o.enabled
                    && o.kind == RendererKind::Mesh
                    && !o.geometry.vertices.is_empty()
                    && !o.materials.is_empty()
            })
            .collect()
    }

    /// Enabled skinned meshes with geometry and at least one material,
    /// in discovery order
    pub fn enabled_skinned_meshes(&self) -> Vec<&RenderableObject> {
        self.objects
            .iter()
            .filter(|o| {
                o.enabled
                    && o.kind == RendererKind::SkinnedMesh
                    && !o.geometry.vertices.is_empty()
                    && !o.materials.is_empty()
            })
            .collect()
    }

    /// Count of currently enabled renderers
    pub fn enabled_count(&self) -> usize {
        self.objects.iter().filter(|o| o.enabled).count()
    }

    /// Flip the enabled flag of every object in `ids`
    pub fn set_enabled(&mut self, ids: &[ObjectId], enabled: bool) {
        for object in &mut self.objects {
            if ids.contains(&object.id) {
                object.enabled = enabled;
            }
        }
    }
}
