//! In-memory mesh representation for the combine pipeline
//!
//! `GeometryBuffer` is a pure value type: it owns every vertex attribute
//! array, per-submesh index lists, skinning data and blend-shape frames,
//! and holds no handles into the host scene graph. Copies recompute
//! normals and bounds rather than trusting the source, so geometry stays
//! consistent after matrix transforms.
//!
//! Author: Moroya Sakamoto

use crate::types::Aabb;
use glam::{Mat4, Vec2, Vec3, Vec4};

/// Up to four bone influences for one vertex
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoneWeight {
    /// Bone indices into the renderer's bone list
    pub indices: [usize; 4],
    /// Influence weights (sum ~1.0)
    pub weights: [f32; 4],
}

impl BoneWeight {
    /// Return a copy with all bone indices shifted by `offset`.
    ///
    /// Used when concatenating bone lists of several skinned sources.
    pub fn offset_indices(&self, offset: usize) -> BoneWeight {
        BoneWeight {
            indices: [
                self.indices[0] + offset,
                self.indices[1] + offset,
                self.indices[2] + offset,
                self.indices[3] + offset,
            ],
            weights: self.weights,
        }
    }
}

/// One named blend-shape frame with per-vertex deltas
///
/// `vertex_offset` is the position of the owning source's vertices inside
/// the combined vertex array; deltas are scattered there when the combined
/// mesh is finalized.
#[derive(Debug, Clone)]
pub struct BlendShapeFrame {
    /// Shape name (dedup key together with the source id)
    pub name: String,
    /// Frame weight
    pub frame_weight: f32,
    /// Per-vertex position deltas
    pub delta_vertices: Vec<Vec3>,
    /// Per-vertex normal deltas
    pub delta_normals: Vec<Vec3>,
    /// Per-vertex tangent deltas
    pub delta_tangents: Vec<Vec3>,
    /// First vertex of the owning source in the combined mesh
    pub vertex_offset: usize,
}

/// Copyable mesh data: vertices, attributes, submesh indices, skinning
#[derive(Debug, Clone, Default)]
pub struct GeometryBuffer {
    /// Mesh name (carried into exports)
    pub name: String,
    /// Vertex positions
    pub vertices: Vec<Vec3>,
    /// Vertex normals (same length as `vertices` or empty)
    pub normals: Vec<Vec3>,
    /// Vertex tangents, w holds handedness
    pub tangents: Vec<Vec4>,
    /// Vertex colors (8-bit RGBA)
    pub colors: Vec<[u8; 4]>,
    /// Primary UV channel
    pub uv: Vec<Vec2>,
    /// Lightmap UV channel
    pub uv2: Vec<Vec2>,
    /// Third UV channel
    pub uv3: Vec<Vec2>,
    /// Fourth UV channel
    pub uv4: Vec<Vec2>,
    /// Triangle index lists, one per submesh
    pub submeshes: Vec<Vec<u32>>,
    /// Inverse rest transforms, one per bone
    pub bind_poses: Vec<Mat4>,
    /// Per-vertex bone influences (skinned meshes only)
    pub bone_weights: Vec<BoneWeight>,
    /// Object-space bounds
    pub bounds: Aabb,
    /// Blend-shape frames owned by this mesh
    pub blend_shapes: Vec<BlendShapeFrame>,
}

impl GeometryBuffer {
    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of submeshes
    pub fn submesh_count(&self) -> usize {
        self.submeshes.len()
    }

    /// Total triangle count across submeshes
    pub fn triangle_count(&self) -> usize {
        self.index_count() / 3
    }

    /// Total index count across submeshes
    pub fn index_count(&self) -> usize {
        self.submeshes.iter().map(|s| s.len()).sum()
    }

    /// All triangle indices flattened in submesh order
    pub fn flat_indices(&self) -> Vec<u32> {
        let mut out = Vec::with_capacity(self.index_count());
        for submesh in &self.submeshes {
            out.extend_from_slice(submesh);
        }
        out
    }

    /// Deep-copy the buffer, recomputing normals and bounds.
    ///
    /// A zero-vertex source yields an empty buffer; the caller's vertex
    /// budget accounting treats it as a zero-cost contributor.
    pub fn copy(&self) -> GeometryBuffer {
        if self.vertices.is_empty() {
            return GeometryBuffer {
                name: self.name.clone(),
                ..GeometryBuffer::default()
            };
        }
        let mut out = self.clone();
        out.recalculate_normals();
        out.recalculate_bounds();
        out
    }

    /// Recompute smooth per-vertex normals from triangle geometry
    pub fn recalculate_normals(&mut self) {
        let mut normals = vec![Vec3::ZERO; self.vertices.len()];
        for submesh in &self.submeshes {
            for tri in submesh.chunks_exact(3) {
                let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
                if a >= self.vertices.len() || b >= self.vertices.len() || c >= self.vertices.len()
                {
                    continue;
                }
                let face = (self.vertices[b] - self.vertices[a])
                    .cross(self.vertices[c] - self.vertices[a]);
                // Area-weighted accumulation, normalized at the end
                normals[a] += face;
                normals[b] += face;
                normals[c] += face;
            }
        }
        for n in &mut normals {
            *n = n.normalize_or_zero();
        }
        self.normals = normals;
    }

    /// Recompute object-space bounds from vertex positions
    pub fn recalculate_bounds(&mut self) {
        self.bounds = Aabb::from_points(&self.vertices);
    }

    /// Transform positions, normals and tangents by a matrix, then refresh
    /// bounds. Normals use the matrix's rotation/scale part and are
    /// re-normalized.
    pub fn transform(&mut self, matrix: &Mat4) {
        for v in &mut self.vertices {
            *v = matrix.transform_point3(*v);
        }
        for n in &mut self.normals {
            *n = matrix.transform_vector3(*n).normalize_or_zero();
        }
        for t in &mut self.tangents {
            let dir = matrix.transform_vector3(Vec3::new(t.x, t.y, t.z)).normalize_or_zero();
            *t = Vec4::new(dir.x, dir.y, dir.z, t.w);
        }
        self.recalculate_bounds();
    }

    /// Append another buffer's data, offsetting indices into the grown
    /// vertex array. Submeshes of `other` are appended as new submeshes.
    ///
    /// Attribute channels missing on either side are padded with defaults
    /// so channel lengths stay equal to the vertex count.
    pub fn append(&mut self, other: &GeometryBuffer) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);

        pad_and_extend(&mut self.normals, &other.normals, base as usize, other.vertices.len(), Vec3::ZERO);
        pad_and_extend(&mut self.tangents, &other.tangents, base as usize, other.vertices.len(), Vec4::ZERO);
        pad_and_extend(&mut self.colors, &other.colors, base as usize, other.vertices.len(), [255; 4]);
        pad_and_extend(&mut self.uv, &other.uv, base as usize, other.vertices.len(), Vec2::ZERO);
        pad_and_extend(&mut self.uv2, &other.uv2, base as usize, other.vertices.len(), Vec2::ZERO);
        pad_and_extend(&mut self.uv3, &other.uv3, base as usize, other.vertices.len(), Vec2::ZERO);
        pad_and_extend(&mut self.uv4, &other.uv4, base as usize, other.vertices.len(), Vec2::ZERO);

        for submesh in &other.submeshes {
            self.submeshes
                .push(submesh.iter().map(|i| i + base).collect());
        }
    }

    /// Collapse all submeshes into a single triangle list
    pub fn merge_submeshes(&mut self) {
        if self.submeshes.len() <= 1 {
            return;
        }
        let merged = self.flat_indices();
        self.submeshes = vec![merged];
    }
}

/// Extend `dst` with `src`, first padding `dst` to `dst_len` and then
/// padding the extension to `count` entries, so optional channels stay
/// aligned with the vertex array.
fn pad_and_extend<T: Copy>(dst: &mut Vec<T>, src: &[T], dst_len: usize, count: usize, fill: T) {
    if src.is_empty() && dst.is_empty() {
        return;
    }
    dst.resize(dst_len, fill);
    dst.extend_from_slice(src);
    dst.resize(dst_len + count, fill);
}
