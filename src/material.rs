//! Material snapshots and the texture-slot registry
//!
//! A `MaterialDescriptor` is an immutable snapshot of a host material taken
//! at combine time: shader identity, named texture-slot bindings, tint and
//! emission. The slot registry mirrors the common engine conventions
//! (diffuse, normal, specular, ...) and supplies the per-slot default
//! colors used to synthesize placeholder textures.
//!
//! Author: Moroya Sakamoto

use crate::types::{MaterialId, Rgba};
use glam::Vec2;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Primary color slot name; every material contributes a texture here
pub const MAIN_TEX: &str = "_MainTex";
/// Tangent-space normal map slot
pub const BUMP_MAP: &str = "_BumpMap";
/// Specular/gloss slot
pub const SPEC_GLOSS_MAP: &str = "_SpecGlossMap";
/// Height/parallax slot
pub const PARALLAX_MAP: &str = "_ParallaxMap";
/// Ambient occlusion slot
pub const OCCLUSION_MAP: &str = "_OcclusionMap";
/// Emission slot
pub const EMISSION_MAP: &str = "_EmissionMap";
/// Detail mask slot
pub const DETAIL_MASK: &str = "_DetailMask";
/// Detail albedo slot
pub const DETAIL_ALBEDO_MAP: &str = "_DetailAlbedoMap";
/// Detail normal slot
pub const DETAIL_NORMAL_MAP: &str = "_DetailNormalMap";
/// Metallic/gloss slot
pub const METALLIC_GLOSS_MAP: &str = "_MetallicGlossMap";
/// Baked lightmap slot
pub const LIGHT_MAP: &str = "_LightMap";

/// The built-in slot names, in registration order
pub const BUILTIN_SLOTS: [&str; 11] = [
    MAIN_TEX,
    BUMP_MAP,
    SPEC_GLOSS_MAP,
    PARALLAX_MAP,
    OCCLUSION_MAP,
    EMISSION_MAP,
    DETAIL_MASK,
    DETAIL_ALBEDO_MAP,
    DETAIL_NORMAL_MAP,
    METALLIC_GLOSS_MAP,
    LIGHT_MAP,
];

/// Human-readable name for a slot, used in export file names
pub fn slot_display_name(slot: &str) -> &str {
    match slot {
        MAIN_TEX => "Diffuse",
        BUMP_MAP => "Normal",
        SPEC_GLOSS_MAP => "Specular",
        PARALLAX_MAP => "Height",
        OCCLUSION_MAP => "Occlusion",
        EMISSION_MAP => "Emission",
        DETAIL_MASK => "DetailMask",
        DETAIL_ALBEDO_MAP => "DetailDiffuse",
        DETAIL_NORMAL_MAP => "DetailNormal",
        METALLIC_GLOSS_MAP => "Metallic",
        LIGHT_MAP => "LightMap",
        other => other,
    }
}

/// Default fill color for a synthesized placeholder in a given slot.
///
/// Normal maps get the flat tangent-space normal, occlusion gets white,
/// masks and emission get transparent black.
pub fn default_slot_color(slot: &str) -> Rgba {
    match slot {
        BUMP_MAP | DETAIL_NORMAL_MAP => Rgba::FLAT_NORMAL,
        METALLIC_GLOSS_MAP => Rgba::BLACK,
        PARALLAX_MAP | EMISSION_MAP | DETAIL_MASK => Rgba::TRANSPARENT,
        OCCLUSION_MAP => Rgba::WHITE,
        _ => Rgba::WHITE,
    }
}

/// A texture as the packer sees it.
///
/// `image == None` models a texture whose pixel data could not be read
/// (non-readable import state); the packer substitutes a flat white
/// placeholder and reports a recoverable warning.
#[derive(Debug, Clone)]
pub struct Texture {
    /// Texture name (carried into logs and export file names)
    pub name: String,
    /// Pixel data, or `None` when unreadable
    pub image: Option<RgbaImage>,
}

impl Texture {
    /// Create a readable texture from pixel data
    pub fn new(name: impl Into<String>, image: RgbaImage) -> Self {
        Texture {
            name: name.into(),
            image: Some(image),
        }
    }

    /// Create a texture whose pixels cannot be read
    pub fn unreadable(name: impl Into<String>) -> Self {
        Texture {
            name: name.into(),
            image: None,
        }
    }

    /// Pixel dimensions, or `None` when unreadable
    pub fn size(&self) -> Option<(u32, u32)> {
        self.image.as_ref().map(|img| img.dimensions())
    }
}

/// Immutable material snapshot taken at combine time
#[derive(Debug, Clone)]
pub struct MaterialDescriptor {
    /// Stable identity used for deduplication
    pub id: MaterialId,
    /// Material name
    pub name: String,
    /// Shader identity (name only; the host resolves it back)
    pub shader: String,
    /// Texture bindings by slot name; a present key with an unreadable
    /// texture is distinct from an absent key
    pub textures: Vec<(String, Texture)>,
    /// Primary slot UV tiling
    pub main_tex_scale: Vec2,
    /// Primary slot UV offset
    pub main_tex_offset: Vec2,
    /// Uniform tint color, applied to the primary slot only
    pub color: Option<Rgba>,
    /// Whether emission is enabled
    pub emission_enabled: bool,
    /// Emission color (only meaningful when enabled)
    pub emission_color: Rgba,
}

impl MaterialDescriptor {
    /// Minimal descriptor with no bindings
    pub fn new(id: MaterialId, name: impl Into<String>, shader: impl Into<String>) -> Self {
        MaterialDescriptor {
            id,
            name: name.into(),
            shader: shader.into(),
            textures: Vec::new(),
            main_tex_scale: Vec2::ONE,
            main_tex_offset: Vec2::ZERO,
            color: None,
            emission_enabled: false,
            emission_color: Rgba::BLACK,
        }
    }

    /// Bind a texture to a slot (builder style)
    pub fn with_texture(mut self, slot: impl Into<String>, texture: Texture) -> Self {
        self.textures.push((slot.into(), texture));
        self
    }

    /// Set the tint color (builder style)
    pub fn with_color(mut self, color: Rgba) -> Self {
        self.color = Some(color);
        self
    }

    /// Look up a texture binding by slot name
    pub fn texture(&self, slot: &str) -> Option<&Texture> {
        self.textures
            .iter()
            .find(|(name, _)| name == slot)
            .map(|(_, tex)| tex)
    }

    /// Whether the material declares the primary color slot
    pub fn has_main_tex(&self) -> bool {
        self.texture(MAIN_TEX).is_some()
    }

    /// Tint color, defaulting to white
    pub fn tint(&self) -> Rgba {
        self.color.unwrap_or(Rgba::WHITE)
    }
}

/// Serializable descriptor written out by `save()`: texture bindings are
/// replaced by the exported atlas file names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialExport {
    /// Material name
    pub name: String,
    /// Shader identity
    pub shader: String,
    /// Slot name → exported texture file name
    pub textures: Vec<(String, String)>,
    /// Tint color
    pub color: Rgba,
    /// Whether emission is enabled
    pub emission_enabled: bool,
    /// Emission color
    pub emission_color: Rgba,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_defaults() {
        assert_eq!(default_slot_color(BUMP_MAP), Rgba::FLAT_NORMAL);
        assert_eq!(default_slot_color(OCCLUSION_MAP), Rgba::WHITE);
        assert_eq!(default_slot_color(EMISSION_MAP), Rgba::TRANSPARENT);
        assert_eq!(default_slot_color("_Custom"), Rgba::WHITE);
    }

    #[test]
    fn descriptor_lookup_and_tint() {
        let mat = MaterialDescriptor::new(MaterialId(1), "wood", "Standard")
            .with_texture(MAIN_TEX, Texture::new("wood_d", RgbaImage::new(4, 4)))
            .with_color(Rgba::new(1.0, 0.5, 0.5, 1.0));
        assert!(mat.has_main_tex());
        assert!(mat.texture(BUMP_MAP).is_none());
        assert_eq!(mat.tint().g, 0.5);

        let bare = MaterialDescriptor::new(MaterialId(2), "bare", "Standard");
        assert_eq!(bare.tint(), Rgba::WHITE);
    }

    #[test]
    fn unreadable_texture_has_no_size() {
        let tex = Texture::unreadable("compressed");
        assert!(tex.size().is_none());
    }
}
