//! UV-space transformation into atlas rectangles
//!
//! Remaps a mesh's primary UV channel so each submesh lands inside the
//! atlas rectangle assigned to its material: normalize against the mesh's
//! UV bounding box, then scale and translate into the target rectangle,
//! shrinking concentrically first when a tiling factor was applied
//! upstream. Out-of-bounds UV components are preserved through the
//! bounding-box normalization, never clamped, so wrapped textures keep
//! referencing the tiled copy in the atlas.
//!
//! The lightmap channel (uv2) is transformed by the first submesh's
//! rectangle only, a single global offset/scale. That simplification is
//! deliberate; see the crate docs before "improving" it.
//!
//! Author: Moroya Sakamoto

use crate::geometry::GeometryBuffer;
use crate::types::Rect;
use glam::Vec2;

/// Bounding box of a UV set, widened from the unit rectangle.
///
/// The box starts at [0,1]×[0,1] and only grows when coordinates fall
/// outside it; UVs inside the unit square therefore report unit bounds.
pub fn uv_bounds(uvs: &[Vec2]) -> Rect {
    let mut bounds = Rect::UNIT;
    for uv in uvs {
        if uv.x < 0.0 && uv.x < bounds.x_min() {
            bounds.set_x_min(uv.x);
        }
        if uv.x > 1.0 && uv.x > bounds.x_max() {
            bounds.set_x_max(uv.x);
        }
        if uv.y < 0.0 && uv.y < bounds.y_min() {
            bounds.set_y_min(uv.y);
        }
        if uv.y > 1.0 && uv.y > bounds.y_max() {
            bounds.set_y_max(uv.y);
        }
    }
    bounds
}

/// Shrink an atlas rectangle concentrically by `1/factor`.
///
/// Applied when a tiling factor > 1 grew the packed texture: the mesh's
/// unit UV box then only spans the central `1/factor` portion of it.
pub fn shrink_for_tiling(rect: &Rect, factor: f32) -> Rect {
    if factor <= 1.0 {
        return *rect;
    }
    Rect::new(
        rect.x + rect.width * (1.0 - 1.0 / factor) / 2.0,
        rect.y + rect.height * (1.0 - 1.0 / factor) / 2.0,
        rect.width / factor,
        rect.height / factor,
    )
}

/// Remap a mesh's UVs into its materials' atlas rectangles.
///
/// * `texture_indexes` — per submesh, the material's index in the packed
///   material list (also indexes `atlas_rects`, `scale_factors` and
///   `mesh_uv_bounds`).
/// * `atlas_rects` — per material, the placement rectangle in atlas space.
/// * `atlas_rects2` — per material, lightmap placement (may be empty).
/// * `scale_factors` — per material, the tiling factor recorded upstream.
/// * `mesh_uv_bounds` — per material, the widened UV bounds of the meshes
///   using it.
///
/// Returns `false` when a submesh references a material index outside the
/// packed rectangle list (bookkeeping bug upstream); the mesh is left
/// partially remapped and the caller is expected to revert.
pub fn remap_uvs(
    mesh: &mut GeometryBuffer,
    texture_indexes: &[usize],
    atlas_rects: &[Rect],
    atlas_rects2: &[Rect],
    scale_factors: &[f32],
    mesh_uv_bounds: &[Rect],
    object_name: &str,
) -> bool {
    let submesh_count = mesh.submesh_count();
    let uv = mesh.uv.clone();
    let mut new_uv = vec![Vec2::ZERO; uv.len()];

    if uv.is_empty() {
        log::warn!(
            "object '{}' has no uv channel, combine result may be incorrect; add a uv map in a modeling tool",
            object_name
        );
    } else {
        for submesh in 0..submesh_count {
            let index = texture_indexes.get(submesh).copied().unwrap_or(0);
            if index >= atlas_rects.len() {
                log::error!(
                    "object '{}': material index {} exceeds packed rectangle count {}",
                    object_name,
                    index,
                    atlas_rects.len()
                );
                return false;
            }

            let factor = scale_factors.get(index).copied().unwrap_or(1.0);
            let target = shrink_for_tiling(&atlas_rects[index], factor);
            let bounds = mesh_uv_bounds.get(index).copied().unwrap_or(Rect::UNIT);

            for &vertex in &mesh.submeshes[submesh] {
                let i = vertex as usize;
                let mut p = uv[i];

                // Translate so the bounds minimum sits at (0, 0)
                p.x -= bounds.x_min();
                p.y -= bounds.y_min();

                // Normalize into a unit box when the bounds are not unit
                if bounds.width != 0.0 && bounds.width != 1.0 {
                    p.x /= bounds.width;
                }
                if bounds.height != 0.0 && bounds.height != 1.0 {
                    p.y /= bounds.height;
                }

                // Place into the atlas rectangle
                new_uv[i] = p * target.size() + target.position();
            }
        }
    }

    mesh.uv = new_uv;

    // Lightmap channel: single global transform by the first submesh's
    // rectangle. Not per-submesh accurate.
    if !mesh.uv2.is_empty() && !atlas_rects2.is_empty() {
        let index = texture_indexes.first().copied().unwrap_or(0);
        if let Some(rect2) = atlas_rects2.get(index) {
            for p in &mut mesh.uv2 {
                *p = *p * rect2.size() + rect2.position();
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec3};

    fn mesh_with_uvs(uvs: Vec<Vec2>, indices: Vec<u32>) -> GeometryBuffer {
        GeometryBuffer {
            name: "m".into(),
            vertices: vec![Vec3::ZERO; uvs.len()],
            uv: uvs,
            submeshes: vec![indices],
            ..GeometryBuffer::default()
        }
    }

    #[test]
    fn unit_uvs_report_unit_bounds() {
        let b = uv_bounds(&[Vec2::new(0.2, 0.3), Vec2::new(0.9, 0.8)]);
        assert_eq!(b, Rect::UNIT);
    }

    #[test]
    fn bounds_widen_beyond_unit_only() {
        let b = uv_bounds(&[Vec2::new(-0.5, 0.5), Vec2::new(2.0, 1.0)]);
        assert_eq!(b.x_min(), -0.5);
        assert_eq!(b.x_max(), 2.0);
        assert_eq!(b.y_min(), 0.0);
        assert_eq!(b.y_max(), 1.0);
    }

    #[test]
    fn center_maps_to_rect_center() {
        // A UV at the exact center of the mesh's bounding box must land at
        // the exact center of the assigned atlas rectangle.
        let mut mesh = mesh_with_uvs(
            vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(0.5, 0.5)],
            vec![0, 1, 2],
        );
        let rect = Rect::new(0.25, 0.5, 0.5, 0.25);
        let ok = remap_uvs(
            &mut mesh,
            &[0],
            &[rect],
            &[],
            &[1.0],
            &[Rect::UNIT],
            "center",
        );
        assert!(ok);
        let center = mesh.uv[2];
        assert!((center - rect.center()).length() < 1e-6, "{:?}", center);
    }

    #[test]
    fn wide_bounds_map_far_corner_without_wrap() {
        // UV bounds [0,2]x[0,1]: a vertex at (2,1) lands exactly at the far
        // corner of the full rectangle, because normalization divides by
        // the box width before atlas placement. Out-of-bounds UVs widen
        // the packed copy upstream; they do not shrink the target here.
        let mut mesh = mesh_with_uvs(
            vec![Vec2::new(0.0, 0.0), Vec2::new(2.0, 1.0), Vec2::new(2.0, 0.0)],
            vec![0, 1, 2],
        );
        let bounds = uv_bounds(&mesh.uv);
        assert_eq!(bounds, Rect::new(0.0, 0.0, 2.0, 1.0));

        let rect = Rect::new(0.0, 0.0, 0.5, 0.5);
        let ok = remap_uvs(&mut mesh, &[0], &[rect], &[], &[1.0], &[bounds], "wide");
        assert!(ok);

        let far = mesh.uv[1];
        assert!((far.x - rect.x_max()).abs() < 1e-6, "{:?}", far);
        assert!((far.y - rect.y_max()).abs() < 1e-6, "{:?}", far);
        let near = mesh.uv[0];
        assert!(near.length() < 1e-6, "{:?}", near);
    }

    #[test]
    fn tiling_factor_shrinks_the_target_concentrically() {
        // A configured tiling factor of 2 grew the packed copy, so the
        // unit UV box only spans the central half of the rectangle.
        let mut mesh = mesh_with_uvs(
            vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(1.0, 0.0)],
            vec![0, 1, 2],
        );
        let rect = Rect::new(0.0, 0.0, 0.5, 0.5);
        let factor = 2.0;
        let ok = remap_uvs(
            &mut mesh,
            &[0],
            &[rect],
            &[],
            &[factor],
            &[Rect::UNIT],
            "tiled",
        );
        assert!(ok);

        let expected = shrink_for_tiling(&rect, factor);
        assert_eq!(expected, Rect::new(0.125, 0.125, 0.25, 0.25));
        let far = mesh.uv[1];
        assert!((far.x - expected.x_max()).abs() < 1e-6, "{:?}", far);
        assert!((far.y - expected.y_max()).abs() < 1e-6, "{:?}", far);
    }

    #[test]
    fn missing_uv_channel_is_degraded_not_error() {
        let mut mesh = GeometryBuffer {
            name: "nouv".into(),
            vertices: vec![Vec3::ZERO; 3],
            submeshes: vec![vec![0, 1, 2]],
            ..GeometryBuffer::default()
        };
        let ok = remap_uvs(&mut mesh, &[0], &[Rect::UNIT], &[], &[1.0], &[Rect::UNIT], "nouv");
        assert!(ok);
        assert!(mesh.uv.is_empty());
    }

    #[test]
    fn out_of_range_material_index_fails() {
        let mut mesh = mesh_with_uvs(vec![Vec2::ZERO; 3], vec![0, 1, 2]);
        let ok = remap_uvs(&mut mesh, &[3], &[Rect::UNIT], &[], &[1.0], &[Rect::UNIT], "bad");
        assert!(!ok);
    }

    #[test]
    fn lightmap_uses_first_submesh_rect_only() {
        let mut mesh = mesh_with_uvs(
            vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)],
            vec![0, 1, 2],
        );
        mesh.uv2 = vec![Vec2::new(1.0, 1.0); 3];
        let rects2 = vec![Rect::new(0.5, 0.5, 0.5, 0.5)];
        remap_uvs(
            &mut mesh,
            &[0],
            &[Rect::UNIT],
            &rects2,
            &[1.0],
            &[Rect::UNIT],
            "lm",
        );
        for p in &mesh.uv2 {
            assert!((p.x - 1.0).abs() < 1e-6 && (p.y - 1.0).abs() < 1e-6);
        }
    }
}
