//! Multi-slot texture atlas packing
//!
//! Collects one adjusted texture per material for every slot in use,
//! equalizes the slot lists with synthesized placeholders so every slot
//! covers every material, then lays out the primary slot once and renders
//! every slot's atlas against that shared layout. The shared layout is
//! what keeps a single remapped UV channel valid for diffuse, normal,
//! specular and friends at the same time.
//!
//! Author: Moroya Sakamoto

use crate::atlas::image_ops::{
    adjusted_copy, resize_bilinear, solid_image, texture_size_in_atlas, CopyParams,
    NO_TEXTURE_COLOR_SIZE,
};
use crate::atlas::layout::layout_rects;
use crate::material::{
    default_slot_color, MaterialDescriptor, Texture, BUILTIN_SLOTS, LIGHT_MAP, MAIN_TEX,
};
use crate::result::CombinedResult;
use crate::session::CombineError;
use crate::types::{Rect, Rgba};
use glam::Vec2;
use image::RgbaImage;

/// Collects per-material textures slot by slot and renders the atlases
#[derive(Debug, Default)]
pub struct TexturePacker {
    /// Slot names in packing order, built-ins first then custom slots
    slots: Vec<String>,
    /// Per slot, one optional adjusted texture per registered material
    collected: Vec<Vec<Option<RgbaImage>>>,
    /// Number of materials registered so far
    material_count: usize,
    /// Rendered atlases by slot name, filled by [`TexturePacker::pack`]
    packed: Vec<(String, RgbaImage)>,
    /// Whether any source material has emission enabled
    has_emission: bool,
    /// Emission color inherited by the combined material
    emission_color: Rgba,
}

impl TexturePacker {
    /// Packer over the built-in slot set
    pub fn new() -> Self {
        let slots: Vec<String> = BUILTIN_SLOTS.iter().map(|s| s.to_string()).collect();
        let collected = vec![Vec::new(); slots.len()];
        TexturePacker {
            slots,
            collected,
            material_count: 0,
            packed: Vec::new(),
            has_emission: false,
            emission_color: Rgba::BLACK,
        }
    }

    /// Register additional shader-specific slot names to pack alongside
    /// the built-ins. Duplicates of built-ins are ignored.
    pub fn set_custom_slots(&mut self, names: &[String]) {
        for name in names {
            if !self.slots.iter().any(|s| s == name) {
                self.slots.push(name.clone());
                self.collected.push(vec![None; self.material_count]);
            }
        }
    }

    /// Rendered atlases, by slot name
    pub fn atlases(&self) -> &[(String, RgbaImage)] {
        &self.packed
    }

    /// Common size the textures of one material are brought to: the
    /// smallest non-zero dimensions among its readable textures, or the
    /// synthesized-color size when it has none
    fn common_texture_size(material: &MaterialDescriptor) -> (u32, u32) {
        let mut best: Option<(u32, u32)> = None;
        for (_, texture) in &material.textures {
            if let Some((w, h)) = texture.size() {
                if w == 0 || h == 0 {
                    continue;
                }
                best = Some(match best {
                    Some((bw, bh)) if bw * bh <= w * h => (bw, bh),
                    _ => (w, h),
                });
            }
        }
        best.unwrap_or((NO_TEXTURE_COLOR_SIZE, NO_TEXTURE_COLOR_SIZE))
    }

    /// Collect one material's textures.
    ///
    /// `mesh_uv_bounds` is the union of widened UV bounds of the meshes
    /// using this material; the material UV bounds (mesh bounds times the
    /// primary slot's tiling, plus its offset) decide how many repetitions
    /// the adjusted copy holds. `tiling_factor > 1` grows the material
    /// bounds and re-centers the mesh bounds, packing extra repetitions on
    /// top of what the bounds demand; only that factor lands in
    /// `result.scale_factors` (1 otherwise), because the remap step shrinks
    /// atlas rectangles by it while bounds-driven repetitions are already
    /// covered by the bounding-box normalization.
    ///
    /// When `atlasing` is off only bookkeeping happens; no pixel work is
    /// done and the original material survives untouched.
    pub fn collect_material(
        &mut self,
        material: &MaterialDescriptor,
        atlasing: bool,
        mesh_uv_bounds: Rect,
        tiling_factor: f32,
        result: &mut CombinedResult,
    ) {
        let scale = material.main_tex_scale;
        let offset = material.main_tex_offset;
        let mut mesh_uv_bounds = mesh_uv_bounds;
        let mut material_uv_bounds = Rect::new(
            mesh_uv_bounds.x * scale.x + offset.x,
            mesh_uv_bounds.y * scale.y + offset.y,
            mesh_uv_bounds.width * scale.x,
            mesh_uv_bounds.height * scale.y,
        );
        if tiling_factor > 1.0 {
            result.scale_factors.push(tiling_factor);
            material_uv_bounds.width *= tiling_factor;
            material_uv_bounds.height *= tiling_factor;
            mesh_uv_bounds.x -= mesh_uv_bounds.width * (tiling_factor - 1.0) / 2.0;
            mesh_uv_bounds.y -= mesh_uv_bounds.height * (tiling_factor - 1.0) / 2.0;
        } else {
            result.scale_factors.push(1.0);
        }
        let scale_x = material_uv_bounds.width.abs();
        let scale_y = material_uv_bounds.height.abs();

        if material.emission_enabled && material.emission_color != Rgba::BLACK {
            self.has_emission = true;
            self.emission_color = material.emission_color;
        }

        if !atlasing {
            self.material_count += 1;
            for list in &mut self.collected {
                list.push(None);
            }
            return;
        }

        let target_size = Self::common_texture_size(material);
        let atlas_size = texture_size_in_atlas(target_size, scale_x, scale_y, &material.name);

        for (slot_index, slot) in self.slots.iter().enumerate() {
            let is_main = slot == MAIN_TEX;
            let entry = match material.texture(slot) {
                Some(texture) => {
                    let params = CopyParams {
                        material_uv_bounds,
                        mesh_uv_bounds,
                        tint: material.tint(),
                        main_tex_scale: scale,
                        main_tex_offset: offset,
                        target_size,
                        atlas_size,
                        is_main,
                    };
                    Some(adjusted_copy(texture, &material.name, &params))
                }
                // A material without a primary texture still contributes
                // its tint as a solid block
                None if is_main => Some(solid_image(atlas_size.0, atlas_size.1, material.tint())),
                // Emission synthesis: an emissive material without an
                // emission map contributes a white block; the color rides
                // on the combined material
                None if slot == crate::material::EMISSION_MAP
                    && material.emission_enabled
                    && material.emission_color != Rgba::BLACK =>
                {
                    Some(solid_image(atlas_size.0, atlas_size.1, Rgba::WHITE))
                }
                None => None,
            };
            self.collected[slot_index].push(entry);
        }
        self.material_count += 1;
    }

    /// Pad every slot that has at least one texture so it covers every
    /// material, synthesizing solid placeholders in the slot's default
    /// color sized like the material's primary entry.
    fn equalize(&mut self) -> Result<(), CombineError> {
        let main_index = self
            .slots
            .iter()
            .position(|s| s == MAIN_TEX)
            .ok_or(CombineError::MissingPrimarySlot)?;
        if self.collected[main_index].iter().all(|e| e.is_none()) {
            return Err(CombineError::MissingPrimarySlot);
        }

        let main_sizes: Vec<(u32, u32)> = self.collected[main_index]
            .iter()
            .map(|entry| match entry {
                Some(img) => img.dimensions(),
                None => (NO_TEXTURE_COLOR_SIZE, NO_TEXTURE_COLOR_SIZE),
            })
            .collect();
        // The primary slot itself gets white blocks for materials that
        // somehow contributed nothing
        for (i, entry) in self.collected[main_index].iter_mut().enumerate() {
            if entry.is_none() {
                *entry = Some(solid_image(main_sizes[i].0, main_sizes[i].1, Rgba::WHITE));
            }
        }

        for (slot_index, slot) in self.slots.iter().enumerate() {
            if slot_index == main_index {
                continue;
            }
            let list = &mut self.collected[slot_index];
            if list.iter().all(|e| e.is_none()) {
                continue;
            }
            let missing = list.iter().filter(|e| e.is_none()).count();
            if missing > 0 {
                log::warn!(
                    "texture slot '{}' is missing on {} of {} materials; padding the atlas with solid default-color blocks",
                    slot,
                    missing,
                    list.len()
                );
            }
            let fill = default_slot_color(slot);
            for (i, entry) in list.iter_mut().enumerate() {
                if entry.is_none() {
                    *entry = Some(solid_image(main_sizes[i].0, main_sizes[i].1, fill));
                }
            }
        }
        Ok(())
    }

    /// Lay out the primary slot and render every populated slot's atlas
    /// against that shared layout. Fills `result.uvs` (and `result.uvs2`
    /// when a lightmap slot is populated) and the per-source transformed
    /// materials. With `combine_materials` a single combined material is
    /// created on top; without it the transformed materials are the
    /// output, one per source, so the material count survives.
    pub fn pack(
        &mut self,
        atlas_size: u32,
        combine_materials: bool,
        session_name: &str,
        source_materials: &[MaterialDescriptor],
        result: &mut CombinedResult,
    ) -> Result<(), CombineError> {
        if source_materials.is_empty() {
            return Err(CombineError::NoMaterials);
        }

        if source_materials.len() == 1 {
            // Single-material shortcut: nothing to pack, every mesh keeps
            // its unit rectangle and the original material survives
            log::info!(
                "only one material found, skipping material combining and keeping '{}'",
                source_materials[0].name
            );
            result.uvs = vec![Rect::UNIT];
            result.combined_material = Some(source_materials[0].clone());
            return Ok(());
        }

        self.equalize()?;

        let main_index = self
            .slots
            .iter()
            .position(|s| s == MAIN_TEX)
            .ok_or(CombineError::MissingPrimarySlot)?;
        let sizes: Vec<(u32, u32)> = self.collected[main_index]
            .iter()
            .map(|e| e.as_ref().map(|img| img.dimensions()).unwrap_or((1, 1)))
            .collect();
        let placements = layout_rects(&sizes, atlas_size);

        result.uvs = placements.iter().map(|p| p.uv).collect();
        let has_lightmap = self
            .slots
            .iter()
            .zip(&self.collected)
            .any(|(slot, list)| slot == LIGHT_MAP && list.iter().any(|e| e.is_some()));
        if has_lightmap {
            result.uvs2 = result.uvs.clone();
        }

        self.packed.clear();
        for (slot_index, slot) in self.slots.iter().enumerate() {
            let list = &self.collected[slot_index];
            if list.iter().all(|e| e.is_none()) {
                continue;
            }
            let mut atlas = RgbaImage::new(atlas_size, atlas_size);
            for (material_index, entry) in list.iter().enumerate() {
                let Some(texture) = entry else { continue };
                let p = placements[material_index];
                let scaled = if texture.dimensions() == (p.width, p.height) {
                    texture.clone()
                } else {
                    resize_bilinear(texture, p.width, p.height)
                };
                image::imageops::replace(&mut atlas, &scaled, p.x as i64, p.y as i64);
            }
            self.packed.push((slot.clone(), atlas));
        }

        // One atlas-backed stand-in per source, keeping the source's
        // shader and emission; the tint is already baked into the atlas
        for source in source_materials {
            let mut transformed = MaterialDescriptor::new(
                source.id,
                format!("{}_{}", session_name, source.name),
                source.shader.clone(),
            );
            transformed.emission_enabled = source.emission_enabled;
            transformed.emission_color = source.emission_color;
            self.bind_atlases(&mut transformed, session_name);
            result
                .transformed_materials
                .insert(source.name.clone(), transformed);
        }

        result.combined_material = if combine_materials {
            let template = &source_materials[0];
            let mut combined = MaterialDescriptor::new(
                template.id,
                format!("{}_material", session_name),
                template.shader.clone(),
            );
            combined.emission_enabled = self.has_emission;
            combined.emission_color = if self.has_emission {
                self.emission_color
            } else {
                Rgba::BLACK
            };
            self.bind_atlases(&mut combined, session_name);
            Some(combined)
        } else {
            None
        };
        Ok(())
    }

    /// Bind the rendered atlases to a material, clearing the primary
    /// slot's tiling so the atlas rectangles are sampled as-is
    fn bind_atlases(&self, material: &mut MaterialDescriptor, session_name: &str) {
        material.main_tex_scale = Vec2::ONE;
        material.main_tex_offset = Vec2::ZERO;
        material.color = None;
        for (slot, atlas) in &self.packed {
            material.textures.push((
                slot.clone(),
                Texture::new(format!("{}_{}", session_name, slot), atlas.clone()),
            ));
        }
    }

    /// Drop collected textures and rendered atlases
    pub fn clear(&mut self) {
        for list in &mut self.collected {
            list.clear();
        }
        self.material_count = 0;
        self.packed.clear();
        self.has_emission = false;
        self.emission_color = Rgba::BLACK;
    }
}
