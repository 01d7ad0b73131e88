//! Combine session output and per-instance bookkeeping
//!
//! `CombinedResult` accumulates everything a session produces: the ordered
//! list of source materials with their widened UV bounds, the atlas
//! rectangles and tiling factors the packer assigned, the combined and
//! per-source transformed materials, and the combined meshes with enough
//! per-instance index bookkeeping to carve a single object back out later.
//!
//! Author: Moroya Sakamoto

use crate::geometry::GeometryBuffer;
use crate::material::MaterialDescriptor;
use crate::types::{MaterialId, ObjectId, Rect};
use std::collections::HashMap;
use std::time::Duration;

/// One source material registered with the session, with the union of the
/// UV bounds of every mesh that references it
#[derive(Debug, Clone)]
pub struct MaterialBinding {
    /// Source material identity
    pub id: MaterialId,
    /// Source material name
    pub name: String,
    /// Union of widened mesh UV bounds across referencing meshes
    pub uv_bounds: Rect,
}

/// Vertex and index span of one source object inside a combined mesh
#[derive(Debug, Clone)]
pub struct InstanceRecord {
    /// Source object identity
    pub id: ObjectId,
    /// Source object name
    pub name: String,
    /// First vertex of this object in the combined buffer
    pub first_vertex: usize,
    /// Number of vertices contributed
    pub vertex_count: usize,
    /// Number of indices contributed
    pub index_count: usize,
}

/// One combined mesh plus the records needed to remove a source object
/// from it again
#[derive(Debug, Clone, Default)]
pub struct CombinedMesh {
    /// Output mesh name
    pub name: String,
    /// Combined geometry
    pub geometry: GeometryBuffer,
    /// Per-source spans, in combine order
    pub instances: Vec<InstanceRecord>,
    /// Bone node indices into the merged skeleton, aligned with the
    /// geometry's bind poses; empty for static meshes
    pub bones: Vec<usize>,
    /// Source material per submesh, for resolving transformed materials
    /// when material combining is off; empty when every submesh is bound
    /// to the single combined material
    pub submesh_materials: Vec<MaterialId>,
}

impl CombinedMesh {
    /// Position of a source object's record, if it is part of this mesh
    pub fn instance_index(&self, id: ObjectId) -> Option<usize> {
        self.instances.iter().position(|r| r.id == id)
    }

    /// Stable identity for save deduplication: the first source instance
    /// folded into this mesh
    pub fn source_id(&self) -> ObjectId {
        self.instances.first().map(|r| r.id).unwrap_or(ObjectId(0))
    }

    /// Remove one source object's vertices and triangles from the
    /// combined geometry, renumbering everything behind it so the buffer
    /// stays contiguous. Returns `false` when the object is not part of
    /// this mesh.
    pub fn remove_instance(&mut self, id: ObjectId) -> bool {
        let Some(pos) = self.instance_index(id) else {
            return false;
        };
        let first = self.instances[pos].first_vertex;
        let count = self.instances[pos].vertex_count;
        let end = first + count;

        let g = &mut self.geometry;
        drain_range(&mut g.vertices, first, end);
        drain_range(&mut g.normals, first, end);
        drain_range(&mut g.tangents, first, end);
        drain_range(&mut g.colors, first, end);
        drain_range(&mut g.uv, first, end);
        drain_range(&mut g.uv2, first, end);
        drain_range(&mut g.uv3, first, end);
        drain_range(&mut g.uv4, first, end);
        drain_range(&mut g.bone_weights, first, end);

        // Vertices are never shared across instances, so an index inside
        // the removed vertex range identifies a removed triangle
        for submesh in &mut g.submeshes {
            let mut kept = Vec::with_capacity(submesh.len());
            let mut triangle = [0u32; 3];
            for chunk in submesh.chunks_exact(3) {
                triangle.copy_from_slice(chunk);
                let removed = triangle
                    .iter()
                    .any(|&i| (i as usize) >= first && (i as usize) < end);
                if removed {
                    continue;
                }
                for &i in &triangle {
                    if (i as usize) >= end {
                        kept.push(i - count as u32);
                    } else {
                        kept.push(i);
                    }
                }
            }
            *submesh = kept;
        }

        // Frames recorded inside the removed vertex range belong to the
        // removed instance; keeping them would scatter their deltas onto
        // the successor's vertices after renumbering
        g.blend_shapes
            .retain(|f| f.vertex_offset < first || f.vertex_offset >= end);
        for frame in &mut g.blend_shapes {
            if frame.vertex_offset >= end {
                frame.vertex_offset -= count;
            }
        }

        g.recalculate_bounds();

        self.instances.remove(pos);
        for record in &mut self.instances[pos..] {
            if record.first_vertex >= end {
                record.first_vertex -= count;
            }
        }
        true
    }
}

fn drain_range<T>(v: &mut Vec<T>, first: usize, end: usize) {
    if first < v.len() {
        v.drain(first..end.min(v.len()));
    }
}

/// Everything a combine session produced
#[derive(Debug, Clone, Default)]
pub struct CombinedResult {
    /// Source materials in discovery order
    pub materials: Vec<MaterialBinding>,
    /// Per-material atlas rectangle for the primary slot
    pub uvs: Vec<Rect>,
    /// Per-material atlas rectangle for the lightmap slot (empty when no
    /// material carries a lightmap)
    pub uvs2: Vec<Rect>,
    /// Per-material tiling factor applied when packing
    pub scale_factors: Vec<f32>,
    /// The single material the combined meshes use
    pub combined_material: Option<MaterialDescriptor>,
    /// Atlas-backed stand-ins for each source material, keyed by the
    /// source material's name
    pub transformed_materials: HashMap<String, MaterialDescriptor>,
    /// Combined output meshes
    pub meshes: Vec<CombinedMesh>,
    /// Number of source renderers folded in
    pub combined_object_count: usize,
    /// Wall-clock time the combine took
    pub elapsed: Duration,
}

impl CombinedResult {
    /// Empty result
    pub fn new() -> Self {
        CombinedResult::default()
    }

    /// Register a source material, widening its UV bounds when it is
    /// already known. Returns the material's position.
    pub fn register_material(
        &mut self,
        id: MaterialId,
        name: impl Into<String>,
        uv_bounds: Rect,
    ) -> usize {
        if let Some(index) = self.material_index(id) {
            let merged = self.materials[index].uv_bounds.union(&uv_bounds);
            self.materials[index].uv_bounds = merged;
            return index;
        }
        self.materials.push(MaterialBinding {
            id,
            name: name.into(),
            uv_bounds,
        });
        self.materials.len() - 1
    }

    /// Position of a material in the registration order
    pub fn material_index(&self, id: MaterialId) -> Option<usize> {
        self.materials.iter().position(|m| m.id == id)
    }

    /// Widened mesh UV bounds, one entry per registered material
    pub fn mesh_uv_bounds(&self) -> Vec<Rect> {
        self.materials.iter().map(|m| m.uv_bounds).collect()
    }
}
