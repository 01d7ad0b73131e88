//! Budgeted mesh accumulation
//!
//! `MeshCombiner` folds prepared source geometries into combined meshes
//! under a vertex budget. An object is never split: when adding it would
//! push the accumulator past the budget and the accumulator already holds
//! something, the accumulator is flushed first and the object starts the
//! next mesh. An object larger than the budget therefore becomes a mesh
//! of its own.
//!
//! Skinning data rides along: bone weights are re-indexed against the
//! concatenated bone list, bind poses and bone references are appended,
//! and blend-shape frames are scattered to their source's vertex offset
//! with name collisions resolved by suffixing the source id.
//!
//! Author: Moroya Sakamoto

use crate::geometry::{BoneWeight, GeometryBuffer};
use crate::result::{CombinedMesh, InstanceRecord};
use crate::types::{MaterialId, ObjectId};
use glam::Mat4;

/// Skinning payload accompanying one source geometry
#[derive(Debug, Clone, Default)]
pub struct SkinnedData {
    /// Bone node indices into the merged skeleton, in the source
    /// renderer's bone order
    pub bones: Vec<usize>,
    /// Bind poses aligned with `bones`
    pub bind_poses: Vec<Mat4>,
}

/// Accumulates prepared geometries into combined meshes under a budget
#[derive(Debug)]
pub struct MeshCombiner {
    base_name: String,
    vertex_budget: usize,
    merge_submeshes: bool,
    pending: GeometryBuffer,
    pending_records: Vec<InstanceRecord>,
    pending_bones: Vec<usize>,
    pending_materials: Vec<MaterialId>,
    outputs: Vec<CombinedMesh>,
}

impl MeshCombiner {
    /// New accumulator. `merge_submeshes` collapses each flushed mesh to
    /// a single submesh (one draw call against the combined material).
    pub fn new(base_name: impl Into<String>, vertex_budget: usize, merge_submeshes: bool) -> Self {
        MeshCombiner {
            base_name: base_name.into(),
            vertex_budget,
            merge_submeshes,
            pending: GeometryBuffer::default(),
            pending_records: Vec::new(),
            pending_bones: Vec::new(),
            pending_materials: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Number of meshes flushed so far
    pub fn flushed_count(&self) -> usize {
        self.outputs.len()
    }

    /// Add one prepared geometry (already transformed and UV-remapped).
    /// `materials` carries the source material per submesh; extra
    /// submeshes reuse the last entry.
    ///
    /// Zero-vertex geometries still get an instance record so removal
    /// bookkeeping stays aligned with the source list.
    pub fn add(
        &mut self,
        id: ObjectId,
        name: &str,
        geometry: &GeometryBuffer,
        materials: &[MaterialId],
        skin: Option<&SkinnedData>,
    ) {
        let incoming = geometry.vertex_count();
        if self.pending.vertex_count() + incoming > self.vertex_budget
            && self.pending.vertex_count() > 0
        {
            self.flush();
        }

        let first_vertex = self.pending.vertex_count();
        let bone_offset = self.pending.bind_poses.len();
        self.pending.append(geometry);
        for s in 0..geometry.submesh_count() {
            if let Some(&m) = materials.get(s).or(materials.last()) {
                self.pending_materials.push(m);
            }
        }

        if let Some(skin) = skin {
            self.append_skinning(geometry, skin, first_vertex, bone_offset, incoming);
        }

        for frame in &geometry.blend_shapes {
            let mut frame = frame.clone();
            if self
                .pending
                .blend_shapes
                .iter()
                .any(|existing| existing.name == frame.name)
            {
                frame.name = format!("{}_{}", frame.name, id.0);
            }
            frame.vertex_offset = first_vertex;
            self.pending.blend_shapes.push(frame);
        }

        self.pending_records.push(InstanceRecord {
            id,
            name: name.to_string(),
            first_vertex,
            vertex_count: incoming,
            index_count: geometry.index_count(),
        });
    }

    fn append_skinning(
        &mut self,
        geometry: &GeometryBuffer,
        skin: &SkinnedData,
        first_vertex: usize,
        bone_offset: usize,
        incoming: usize,
    ) {
        self.pending
            .bone_weights
            .resize(first_vertex, BoneWeight::default());

        // Sources with a short weight array repeat their first entry so
        // every vertex stays bound to the skeleton
        let pad = geometry
            .bone_weights
            .first()
            .copied()
            .unwrap_or_default()
            .offset_indices(bone_offset);
        for i in 0..incoming {
            let weight = match geometry.bone_weights.get(i) {
                Some(w) => w.offset_indices(bone_offset),
                None => pad,
            };
            self.pending.bone_weights.push(weight);
        }

        self.pending.bind_poses.extend_from_slice(&skin.bind_poses);
        self.pending_bones.extend_from_slice(&skin.bones);
    }

    /// Flush the accumulator into a finished combined mesh
    fn flush(&mut self) {
        if self.pending.vertex_count() == 0 && self.pending_records.is_empty() {
            return;
        }
        let index = self.outputs.len();
        let name = format!("{}_mesh_{}", self.base_name, index);

        let mut geometry = std::mem::take(&mut self.pending);
        let submesh_materials = if self.merge_submeshes {
            // One submesh bound to the single combined material
            geometry.merge_submeshes();
            self.pending_materials.clear();
            Vec::new()
        } else {
            std::mem::take(&mut self.pending_materials)
        };
        geometry.recalculate_bounds();
        geometry.name = name.clone();

        log::info!(
            "combined mesh '{}': {} vertices, {} triangles from {} sources",
            name,
            geometry.vertex_count(),
            geometry.triangle_count(),
            self.pending_records.len()
        );

        self.outputs.push(CombinedMesh {
            name,
            geometry,
            instances: std::mem::take(&mut self.pending_records),
            bones: std::mem::take(&mut self.pending_bones),
            submesh_materials,
        });
    }

    /// Flush the remainder and take the finished meshes
    pub fn finish(mut self) -> Vec<CombinedMesh> {
        self.flush();
        self.outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec3};

    fn geometry(n: usize) -> GeometryBuffer {
        GeometryBuffer {
            name: "g".into(),
            vertices: vec![Vec3::ZERO; n],
            uv: vec![Vec2::ZERO; n],
            submeshes: vec![(0..n as u32).collect()],
            ..GeometryBuffer::default()
        }
    }

    #[test]
    fn budget_splits_without_splitting_objects() {
        // 100 + 200 exceeds 250, so the first mesh closes at 100 and the
        // second takes 200 + 50
        let mut combiner = MeshCombiner::new("batch", 250, true);
        combiner.add(ObjectId(1), "a", &geometry(100), &[], None);
        combiner.add(ObjectId(2), "b", &geometry(200), &[], None);
        combiner.add(ObjectId(3), "c", &geometry(50), &[], None);
        let meshes = combiner.finish();

        assert_eq!(meshes.len(), 2);
        assert_eq!(meshes[0].geometry.vertex_count(), 100);
        assert_eq!(meshes[1].geometry.vertex_count(), 250);
        assert_eq!(meshes[0].instances.len(), 1);
        assert_eq!(meshes[1].instances.len(), 2);
        assert_eq!(meshes[1].instances[0].first_vertex, 0);
        assert_eq!(meshes[1].instances[1].first_vertex, 200);
    }

    #[test]
    fn oversized_object_becomes_its_own_mesh() {
        let mut combiner = MeshCombiner::new("batch", 250, true);
        combiner.add(ObjectId(1), "big", &geometry(400), &[], None);
        combiner.add(ObjectId(2), "small", &geometry(10), &[], None);
        let meshes = combiner.finish();
        assert_eq!(meshes.len(), 2);
        assert_eq!(meshes[0].geometry.vertex_count(), 400);
        assert_eq!(meshes[1].geometry.vertex_count(), 10);
    }

    #[test]
    fn vertex_conservation() {
        let counts = [100usize, 200, 50, 400, 10];
        let mut combiner = MeshCombiner::new("batch", 250, true);
        for (i, &n) in counts.iter().enumerate() {
            combiner.add(ObjectId(i as u64), "o", &geometry(n), &[], None);
        }
        let meshes = combiner.finish();
        let total: usize = meshes.iter().map(|m| m.geometry.vertex_count()).sum();
        assert_eq!(total, counts.iter().sum::<usize>());
    }

    #[test]
    fn skinning_reindexes_against_concatenated_bones() {
        let mut a = geometry(3);
        a.bone_weights = vec![
            BoneWeight {
                indices: [0, 1, 0, 0],
                weights: [0.5, 0.5, 0.0, 0.0],
            };
            3
        ];
        let skin_a = SkinnedData {
            bones: vec![7, 8],
            bind_poses: vec![Mat4::IDENTITY; 2],
        };
        let mut b = geometry(3);
        b.bone_weights = vec![
            BoneWeight {
                indices: [1, 0, 0, 0],
                weights: [1.0, 0.0, 0.0, 0.0],
            };
            3
        ];
        let skin_b = SkinnedData {
            bones: vec![9, 10],
            bind_poses: vec![Mat4::IDENTITY; 2],
        };

        let mut combiner = MeshCombiner::new("skin", 1000, true);
        combiner.add(ObjectId(1), "a", &a, &[], Some(&skin_a));
        combiner.add(ObjectId(2), "b", &b, &[], Some(&skin_b));
        let meshes = combiner.finish();

        assert_eq!(meshes.len(), 1);
        let mesh = &meshes[0];
        assert_eq!(mesh.bones, vec![7, 8, 9, 10]);
        assert_eq!(mesh.geometry.bind_poses.len(), 4);
        // Second source's bone 1 became bone 3
        assert_eq!(mesh.geometry.bone_weights[3].indices[0], 3);
        assert_eq!(mesh.geometry.bone_weights.len(), 6);
    }

    #[test]
    fn blend_shape_names_deduplicate_by_source() {
        use crate::geometry::BlendShapeFrame;
        let frame = |name: &str| BlendShapeFrame {
            name: name.into(),
            frame_weight: 100.0,
            delta_vertices: vec![Vec3::ZERO; 3],
            delta_normals: Vec::new(),
            delta_tangents: Vec::new(),
            vertex_offset: 0,
        };
        let mut a = geometry(3);
        a.blend_shapes.push(frame("smile"));
        let mut b = geometry(3);
        b.blend_shapes.push(frame("smile"));

        let mut combiner = MeshCombiner::new("faces", 1000, true);
        combiner.add(ObjectId(1), "a", &a, &[], None);
        combiner.add(ObjectId(2), "b", &b, &[], None);
        let meshes = combiner.finish();

        let shapes = &meshes[0].geometry.blend_shapes;
        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[0].name, "smile");
        assert_eq!(shapes[1].name, "smile_2");
        assert_eq!(shapes[1].vertex_offset, 3);
    }
}
