//! Pixel operations feeding the atlas packer
//!
//! Solid placeholder synthesis, bilinear resizing, size capping for tiled
//! textures, and the tiled/wrapped/tinted adjusted copy that turns a
//! source texture into its in-atlas representation. Row loops run on
//! rayon.
//!
//! Author: Moroya Sakamoto

use crate::material::Texture;
use crate::types::{Rect, Rgba};
use glam::Vec2;
use image::{imageops, Rgba as ImgRgba, RgbaImage};
use rayon::prelude::*;

/// The maximum texture dimension the pipeline will emit
pub const MAX_TEXTURE_SIZE: u32 = 16384;

/// Side length of synthesized color textures when a material has no
/// texture at all
pub const NO_TEXTURE_COLOR_SIZE: u32 = 256;

/// Create a solid single-color texture
pub fn solid_image(width: u32, height: u32, color: Rgba) -> RgbaImage {
    RgbaImage::from_pixel(width.max(1), height.max(1), ImgRgba(color.to_bytes()))
}

/// Bilinear resize
pub fn resize_bilinear(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    imageops::resize(image, width.max(1), height.max(1), imageops::FilterType::Triangle)
}

/// In-atlas size of a texture after UV-bounds tiling, with the integer
/// reducing factor applied when the tiled size exceeds
/// [`MAX_TEXTURE_SIZE`]. Returns `(width, height, reducing_factor)`.
pub fn texture_size_in_atlas(
    input_size: (u32, u32),
    scale_x: f32,
    scale_y: f32,
    material_name: &str,
) -> (u32, u32, u32) {
    let mut w = input_size.0 as f32 * scale_x;
    let mut h = input_size.1 as f32 * scale_y;
    let mut reducing = 1u32;

    if w >= MAX_TEXTURE_SIZE as f32 || h >= MAX_TEXTURE_SIZE as f32 {
        reducing = ((w / MAX_TEXTURE_SIZE as f32).ceil())
            .max((h / MAX_TEXTURE_SIZE as f32).ceil()) as u32;
        w /= reducing as f32;
        h /= reducing as f32;
        log::warn!(
            "textures in material '{}' are tiled beyond the maximum texture size ({}); \
             shrinking by {} to fit the atlas, which may lose quality",
            material_name,
            MAX_TEXTURE_SIZE,
            reducing
        );
    }
    (w.max(1.0) as u32, h.max(1.0) as u32, reducing)
}

/// Parameters for [`adjusted_copy`]
#[derive(Debug, Clone)]
pub struct CopyParams {
    /// Material UV bounds (mesh bounds × main-tex tiling + offset);
    /// signed width/height carry the mirror direction
    pub material_uv_bounds: Rect,
    /// Widened mesh UV bounds
    pub mesh_uv_bounds: Rect,
    /// Material tint, multiplied in for the primary slot only
    pub tint: Rgba,
    /// Primary slot tiling
    pub main_tex_scale: Vec2,
    /// Primary slot offset
    pub main_tex_offset: Vec2,
    /// Common size all textures of this material are resized to
    pub target_size: (u32, u32),
    /// In-atlas size plus reducing factor from [`texture_size_in_atlas`]
    pub atlas_size: (u32, u32, u32),
    /// Whether this is the primary color slot
    pub is_main: bool,
}

/// Produce the in-atlas representation of a source texture: resized to the
/// material's common size, tiled/wrapped when UV bounds leave the unit
/// rectangle, tinted for the primary slot.
///
/// An unreadable texture yields a flat white placeholder and a recoverable
/// error log entry; the batch continues.
pub fn adjusted_copy(texture: &Texture, material_name: &str, params: &CopyParams) -> RgbaImage {
    let (out_w, out_h, reducing) = params.atlas_size;

    let Some(source) = texture.image.as_ref() else {
        log::error!(
            "pixel data of texture '{}' (material '{}') cannot be read; \
             substituting a white placeholder. Enable read/write in the \
             texture's import settings or convert it to a readable format",
            texture.name,
            material_name
        );
        return solid_image(out_w, out_h, Rgba::WHITE);
    };

    let mut working = source.clone();

    if working.dimensions() != params.target_size {
        log::warn!(
            "texture '{}' is scaled from {}x{} to {}x{} to match the other textures in material '{}'",
            texture.name,
            working.width(),
            working.height(),
            params.target_size.0,
            params.target_size.1,
            material_name
        );
        working = resize_bilinear(&working, params.target_size.0, params.target_size.1);
    }

    if reducing > 1 {
        working = resize_bilinear(
            &working,
            (working.width() / reducing).max(1),
            (working.height() / reducing).max(1),
        );
    }

    let bounds = params.material_uv_bounds;
    let out_of_bounds = bounds.width.abs() != 1.0
        || bounds.height.abs() != 1.0
        || bounds.position() != Vec2::ZERO;
    let tinted = params.is_main && params.tint != Rgba::WHITE;

    if !out_of_bounds {
        if !tinted {
            return resize_bilinear(&working, out_w, out_h);
        }
        let mut copy = resize_bilinear(&working, out_w, out_h);
        modulate_in_place(&mut copy, params.tint);
        return copy;
    }

    if out_w.max(out_h) > working.width().max(working.height()) {
        log::info!(
            "texture '{}' is tiled in the atlas ({}x{}) because meshes using it have UVs outside [0, 1]",
            texture.name,
            out_w,
            out_h
        );
    }

    let x_sign: i64 = if bounds.width < 0.0 { -1 } else { 1 };
    let y_sign: i64 = if bounds.height < 0.0 { -1 } else { 1 };
    let src_w = working.width() as i64;
    let src_h = working.height() as i64;
    // Pixel offset of the mesh UV minimum inside the tiled source
    let x_offset = (params.mesh_uv_bounds.x_min() * src_w as f32 * params.main_tex_scale.x
        + params.main_tex_offset.x * src_w as f32) as i64;
    let y_offset = (params.mesh_uv_bounds.y_min() * src_h as f32 * params.main_tex_scale.y
        + params.main_tex_offset.y * src_h as f32) as i64;

    let tint = if tinted { params.tint } else { Rgba::WHITE };
    wrap_copy(&working, out_w, out_h, x_sign, y_sign, x_offset, y_offset, tint)
}

/// Tile `source` into an `out_w`×`out_h` image, sampling with wraparound
/// and direction signs, multiplying by `tint`.
fn wrap_copy(
    source: &RgbaImage,
    out_w: u32,
    out_h: u32,
    x_sign: i64,
    y_sign: i64,
    x_offset: i64,
    y_offset: i64,
    tint: Rgba,
) -> RgbaImage {
    let src_w = source.width() as i64;
    let src_h = source.height() as i64;
    let tint_bytes = tint.to_bytes();
    let stride = out_w as usize * 4;

    let mut out = RgbaImage::new(out_w, out_h);
    out.par_chunks_exact_mut(stride)
        .enumerate()
        .for_each(|(j, row)| {
            let sy = (y_sign * (j as i64 + y_offset)).rem_euclid(src_h) as u32;
            for i in 0..out_w as usize {
                let sx = (x_sign * (i as i64 + x_offset)).rem_euclid(src_w) as u32;
                let px = source.get_pixel(sx, sy).0;
                let dst = &mut row[i * 4..i * 4 + 4];
                for c in 0..4 {
                    dst[c] = ((px[c] as u16 * tint_bytes[c] as u16) / 255) as u8;
                }
            }
        });
    out
}

/// Multiply every pixel by a color in place
pub fn modulate_in_place(image: &mut RgbaImage, tint: Rgba) {
    let tint_bytes = tint.to_bytes();
    image.par_chunks_exact_mut(4).for_each(|px| {
        for c in 0..4 {
            px[c] = ((px[c] as u16 * tint_bytes[c] as u16) / 255) as u8;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            if (x + y) % 2 == 0 {
                ImgRgba([255, 255, 255, 255])
            } else {
                ImgRgba([0, 0, 0, 255])
            }
        })
    }

    fn unit_params(size: (u32, u32)) -> CopyParams {
        CopyParams {
            material_uv_bounds: Rect::UNIT,
            mesh_uv_bounds: Rect::UNIT,
            tint: Rgba::WHITE,
            main_tex_scale: Vec2::ONE,
            main_tex_offset: Vec2::ZERO,
            target_size: size,
            atlas_size: (size.0, size.1, 1),
            is_main: true,
        }
    }

    #[test]
    fn unreadable_becomes_white_placeholder() {
        let tex = Texture::unreadable("compressed");
        let out = adjusted_copy(&tex, "m", &unit_params((8, 8)));
        assert_eq!(out.dimensions(), (8, 8));
        assert_eq!(out.get_pixel(3, 3).0, [255, 255, 255, 255]);
    }

    #[test]
    fn in_bounds_untinted_is_plain_copy() {
        let tex = Texture::new("c", checker(4, 4));
        let out = adjusted_copy(&tex, "m", &unit_params((4, 4)));
        assert_eq!(out.get_pixel(0, 0).0, [255, 255, 255, 255]);
        assert_eq!(out.get_pixel(1, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn tint_applies_to_main_slot_only() {
        let tex = Texture::new("c", solid_image(4, 4, Rgba::WHITE));
        let mut params = unit_params((4, 4));
        params.tint = Rgba::new(0.5, 0.0, 1.0, 1.0);
        let out = adjusted_copy(&tex, "m", &params);
        let px = out.get_pixel(2, 2).0;
        assert!(px[0] > 120 && px[0] < 135);
        assert_eq!(px[1], 0);
        assert_eq!(px[2], 255);

        params.is_main = false;
        let out = adjusted_copy(&tex, "m", &params);
        assert_eq!(out.get_pixel(2, 2).0, [255, 255, 255, 255]);
    }

    #[test]
    fn out_of_bounds_tiles_the_source() {
        let tex = Texture::new("c", checker(2, 2));
        let mut params = unit_params((2, 2));
        // UV bounds [0,2]x[0,1]: atlas copy twice as wide, wrapping
        params.material_uv_bounds = Rect::new(0.0, 0.0, 2.0, 1.0);
        params.mesh_uv_bounds = Rect::new(0.0, 0.0, 2.0, 1.0);
        params.atlas_size = (4, 2, 1);
        let out = adjusted_copy(&tex, "m", &params);
        assert_eq!(out.dimensions(), (4, 2));
        // Period-2 wrap: column 0 equals column 2
        assert_eq!(out.get_pixel(0, 0).0, out.get_pixel(2, 0).0);
        assert_eq!(out.get_pixel(1, 1).0, out.get_pixel(3, 1).0);
    }

    #[test]
    fn oversize_cap_computes_reducing_factor() {
        let (w, h, f) = texture_size_in_atlas((8192, 8192), 4.0, 4.0, "m");
        assert!(f >= 2);
        assert!(w < MAX_TEXTURE_SIZE && h < MAX_TEXTURE_SIZE);
        let (_, _, f1) = texture_size_in_atlas((256, 256), 2.0, 2.0, "m");
        assert_eq!(f1, 1);
    }
}
