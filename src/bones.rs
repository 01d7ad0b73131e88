//! Bone hierarchy merging for skinned combines
//!
//! A combined skinned mesh needs one bone set covering every source
//! renderer. This module discovers the topmost bone roots across the
//! sources, duplicates those subtrees into a fresh transform arena, and
//! keeps an old-to-new correspondence so renderer bone lists and bind
//! poses can be rewritten against the duplicated skeleton.
//!
//! Author: Moroya Sakamoto

use crate::scene::{AnimatorDesc, RenderableObject, TransformHierarchy};
use crate::types::ObjectId;
use glam::{Mat4, Vec3};
use std::collections::{HashMap, HashSet};

/// Duplicated skeleton plus the mapping back to the source arena
#[derive(Debug, Clone, Default)]
pub struct BoneMergeResult {
    /// Fresh arena holding the duplicated bone subtrees
    pub merged: TransformHierarchy,
    /// Source node id to index in `merged`
    pub correspondence: HashMap<ObjectId, usize>,
    /// Indices of the duplicated roots in `merged`
    pub roots: Vec<usize>,
    /// World positions of the source roots, for re-anchoring the
    /// duplicated skeleton under the combined object
    pub root_pivots: Vec<Vec3>,
    /// Per root, the animator found on the source root or its nearest
    /// ancestor, for the host to attach to the duplicated root's parent;
    /// at most one copy per root
    pub root_animators: Vec<Option<AnimatorDesc>>,
}

/// Topmost bone roots across a set of skinned renderers.
///
/// Every referenced bone is walked up its ancestor chain as long as the
/// ancestor is itself referenced as a bone; the highest such node is a
/// candidate root. Candidates that sit inside another candidate's subtree
/// are dropped, so the result is a minimal, non-overlapping cover of all
/// bones, in first-seen order.
pub fn bone_roots(hierarchy: &TransformHierarchy, objects: &[&RenderableObject]) -> Vec<usize> {
    let mut bone_set: HashSet<usize> = HashSet::new();
    let mut bone_order: Vec<usize> = Vec::new();
    let mut shared = 0usize;
    for object in objects {
        for &bone in &object.bones {
            if bone_set.insert(bone) {
                bone_order.push(bone);
            } else {
                shared += 1;
            }
        }
    }
    if shared > 0 {
        log::warn!(
            "{} bone references are shared between multiple skinned renderers; each bone is registered once",
            shared
        );
    }

    let mut roots: Vec<usize> = Vec::new();
    for &bone in &bone_order {
        let mut top = bone;
        for ancestor in hierarchy.ancestors(bone) {
            if bone_set.contains(&ancestor) {
                top = ancestor;
            }
        }
        if !roots.contains(&top) {
            roots.push(top);
        }
    }

    // Drop roots living inside another root's subtree
    let mut minimal: Vec<usize> = Vec::new();
    for &root in &roots {
        let inside_other = roots
            .iter()
            .any(|&other| other != root && hierarchy.subtree(other).contains(&root));
        if inside_other {
            log::warn!(
                "bone root '{}' sits inside another discovered root's subtree; collapsing into one hierarchy",
                hierarchy.nodes[root].name
            );
        } else {
            minimal.push(root);
        }
    }
    minimal
}

/// Duplicate the subtrees under `roots` into a fresh arena.
///
/// Names, local transforms and animator settings are carried over; the
/// correspondence table maps every copied source node's id to its index
/// in the new arena. The animator governing each root (on the root
/// itself or the nearest ancestor above it) is recorded so the host can
/// re-attach one copy per duplicated root's parent.
pub fn merge_bone_hierarchies(
    hierarchy: &TransformHierarchy,
    roots: &[usize],
) -> BoneMergeResult {
    let mut result = BoneMergeResult::default();

    for &root in roots {
        result
            .root_pivots
            .push(hierarchy.world_matrix(root).transform_point3(Vec3::ZERO));
        let animator = std::iter::once(root)
            .chain(hierarchy.ancestors(root))
            .find_map(|i| hierarchy.nodes[i].animator.clone());
        result.root_animators.push(animator);

        let subtree = hierarchy.subtree(root);
        let mut local: HashMap<usize, usize> = HashMap::new();
        for (position, &old_index) in subtree.iter().enumerate() {
            let node = &hierarchy.nodes[old_index];
            let new_parent = node.parent.and_then(|p| local.get(&p).copied());
            let new_index = result.merged.add_node(
                node.id,
                node.name.clone(),
                node.local_position,
                node.local_rotation,
                node.local_scale,
                new_parent,
            );
            result.merged.nodes[new_index].animator = node.animator.clone();
            local.insert(old_index, new_index);
            result.correspondence.insert(node.id, new_index);
            if position == 0 {
                result.roots.push(new_index);
            }
        }
    }
    result
}

impl BoneMergeResult {
    /// Rewrite a renderer's bone list against the duplicated skeleton.
    ///
    /// Bones whose subtree was not duplicated (stale references in the
    /// source renderer) are dropped with a warning.
    pub fn remap_bones(
        &self,
        source: &TransformHierarchy,
        bones: &[usize],
        object_name: &str,
    ) -> Vec<usize> {
        let mut out = Vec::with_capacity(bones.len());
        for &bone in bones {
            let id = source.nodes[bone].id;
            match self.correspondence.get(&id) {
                Some(&new_index) => out.push(new_index),
                None => log::warn!(
                    "bone '{}' of object '{}' is outside every duplicated hierarchy; dropping it",
                    source.nodes[bone].name,
                    object_name
                ),
            }
        }
        out
    }

    /// Bind pose of a duplicated bone for a combined renderer sitting at
    /// `renderer_world`: the bone's world-to-local times the renderer's
    /// local-to-world.
    pub fn bind_pose(&self, bone_index: usize, renderer_world: Mat4) -> Mat4 {
        self.merged.world_matrix(bone_index).inverse() * renderer_world
    }
}
