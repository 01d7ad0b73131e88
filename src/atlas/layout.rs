//! Shelf-based rectangle layout for atlas packing
//!
//! Places a list of pixel-sized images into a square atlas canvas using
//! shelf packing (tallest first), uniformly downscaling every entry until
//! the layout fits. Returned placements are in input order, in both pixel
//! and normalized [0,1] atlas coordinates.
//!
//! Author: Moroya Sakamoto

use crate::types::Rect;

/// One placed entry: pixel rectangle plus its normalized atlas rectangle
#[derive(Debug, Clone, Copy)]
pub struct Placement {
    /// X in pixels
    pub x: u32,
    /// Y in pixels
    pub y: u32,
    /// Width in pixels (after any downscale)
    pub width: u32,
    /// Height in pixels (after any downscale)
    pub height: u32,
    /// Normalized rectangle in [0,1] atlas space
    pub uv: Rect,
}

/// Pixel padding between packed entries
const PADDING: u32 = 0;

/// Lay out `sizes` inside an `atlas_size`² canvas.
///
/// Entries keep their aspect ratio; when the set does not fit at full
/// scale, all entries are scaled down together (halving steps) until the
/// shelf layout succeeds. Placements come back in input order and are
/// pairwise disjoint.
pub fn layout_rects(sizes: &[(u32, u32)], atlas_size: u32) -> Vec<Placement> {
    if sizes.is_empty() {
        return Vec::new();
    }

    let mut scale = 1.0f32;
    loop {
        if let Some(placements) = try_layout(sizes, atlas_size, scale) {
            return placements;
        }
        scale *= 0.5;
        if scale < 1.0 / 8192.0 {
            // Degenerate input; place everything as 1px entries
            return sizes
                .iter()
                .enumerate()
                .map(|(i, _)| Placement {
                    x: (i as u32) % atlas_size,
                    y: (i as u32) / atlas_size,
                    width: 1,
                    height: 1,
                    uv: Rect::new(
                        ((i as u32) % atlas_size) as f32 / atlas_size as f32,
                        ((i as u32) / atlas_size) as f32 / atlas_size as f32,
                        1.0 / atlas_size as f32,
                        1.0 / atlas_size as f32,
                    ),
                })
                .collect();
        }
    }
}

fn try_layout(sizes: &[(u32, u32)], atlas_size: u32, scale: f32) -> Option<Vec<Placement>> {
    let scaled: Vec<(u32, u32)> = sizes
        .iter()
        .map(|&(w, h)| {
            (
                ((w as f32 * scale).round() as u32).clamp(1, atlas_size),
                ((h as f32 * scale).round() as u32).clamp(1, atlas_size),
            )
        })
        .collect();

    // Tallest first gives tight shelves
    let mut order: Vec<usize> = (0..scaled.len()).collect();
    order.sort_by(|&a, &b| scaled[b].1.cmp(&scaled[a].1).then(scaled[b].0.cmp(&scaled[a].0)));

    let mut placements = vec![None; scaled.len()];
    let mut shelf_y = 0u32;
    let mut shelf_height = 0u32;
    let mut cursor_x = 0u32;

    for &i in &order {
        let (w, h) = scaled[i];
        if cursor_x + w > atlas_size {
            // Start a new shelf
            shelf_y += shelf_height + PADDING;
            shelf_height = 0;
            cursor_x = 0;
        }
        if cursor_x + w > atlas_size || shelf_y + h > atlas_size {
            return None;
        }
        placements[i] = Some(Placement {
            x: cursor_x,
            y: shelf_y,
            width: w,
            height: h,
            uv: Rect::new(
                cursor_x as f32 / atlas_size as f32,
                shelf_y as f32 / atlas_size as f32,
                w as f32 / atlas_size as f32,
                h as f32 / atlas_size as f32,
            ),
        });
        cursor_x += w + PADDING;
        shelf_height = shelf_height.max(h);
    }

    Some(placements.into_iter().map(|p| p.expect("all entries placed")).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_entry_fills_from_origin() {
        let p = layout_rects(&[(256, 256)], 512);
        assert_eq!(p.len(), 1);
        assert_eq!((p[0].x, p[0].y), (0, 0));
        assert_eq!(p[0].uv.size().x, 0.5);
    }

    #[test]
    fn placements_are_disjoint() {
        let sizes = vec![(128, 128), (256, 64), (64, 256), (128, 256), (256, 256)];
        let p = layout_rects(&sizes, 512);
        assert_eq!(p.len(), sizes.len());
        for i in 0..p.len() {
            for j in (i + 1)..p.len() {
                assert_eq!(
                    p[i].uv.intersection_area(&p[j].uv),
                    0.0,
                    "entries {} and {} overlap",
                    i,
                    j
                );
            }
        }
    }

    #[test]
    fn oversized_set_is_downscaled_to_fit() {
        let sizes = vec![(1024, 1024); 8];
        let p = layout_rects(&sizes, 512);
        assert_eq!(p.len(), 8);
        for e in &p {
            assert!(e.width < 1024);
            assert!(e.x + e.width <= 512 && e.y + e.height <= 512);
        }
    }

    #[test]
    fn order_is_input_order() {
        let sizes = vec![(16, 16), (64, 64)];
        let p = layout_rects(&sizes, 128);
        assert_eq!(p[0].width, 16, "first placement belongs to first input");
        assert_eq!(p[1].width, 64);
    }
}
