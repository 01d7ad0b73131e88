//! Combine session orchestration
//!
//! A `CombineSession` drives one combine over a scene snapshot: list the
//! materials under the scope root, pack the atlases, fold the geometries
//! into budgeted combined meshes (static and skinned separately), then
//! disable the source renderers. The session owns the result and can
//! undo itself by re-enabling what it disabled.
//!
//! Author: Moroya Sakamoto

use crate::atlas::TexturePacker;
use crate::bones::{bone_roots, merge_bone_hierarchies, BoneMergeResult};
use crate::combine::{MeshCombiner, SkinnedData};
use crate::material::MaterialDescriptor;
use crate::progress::{CombinePhase, ProgressFn};
use crate::result::{CombinedMesh, CombinedResult, InstanceRecord};
use crate::scene::{RendererKind, Scene};
use crate::types::{ObjectId, Rect};
use crate::uv::{remap_uvs, uv_bounds};
use glam::Mat4;
use thiserror::Error;

/// Atlas sizes the packer accepts
pub const TEXTURE_ATLAS_SIZES: [u32; 9] = [32, 64, 128, 256, 512, 1024, 2048, 4096, 8192];

/// Smallest permitted vertex budget
pub const MIN_VERTEX_BUDGET: usize = 32;
/// Largest permitted vertex budget (16-bit index limit minus reserve)
pub const MAX_VERTEX_BUDGET: usize = 65534;

/// Errors a combine session can report
#[derive(Debug, Error)]
pub enum CombineError {
    /// A mesh references a material the scene snapshot does not carry
    #[error("no usable materials found on the meshes to combine")]
    NoMaterials,
    /// Nothing enabled under the scope root
    #[error("no enabled meshes found under the scope root")]
    NoMeshes,
    /// The progress callback asked to stop
    #[error("combine was cancelled")]
    Cancelled,
    /// `combine` called while a combine is running or already applied
    #[error("a combine is already running or applied for this session")]
    AlreadyCombining,
    /// Material combining requested but no material contributes a
    /// primary color texture
    #[error("no material contributes a primary color slot texture")]
    MissingPrimarySlot,
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct CombineSettings {
    /// Name stamped on combined meshes, materials and export files
    pub session_name: String,
    /// Fold all materials into atlases and a single combined material.
    /// With a single distinct source material this is skipped and the
    /// original material is reused as-is.
    pub combine_materials: bool,
    /// Fold geometries into budgeted combined meshes. When off, every
    /// source keeps its own mesh but still gets remapped UVs and its
    /// transformed material.
    pub combine_meshes: bool,
    /// Atlas edge length, one of [`TEXTURE_ATLAS_SIZES`]
    pub atlas_size: u32,
    /// Extra texture repetitions packed per material, on top of what the
    /// mesh UV bounds demand; 1 packs no extra copies
    pub tiling_factor: f32,
    /// Shader-specific texture slots to pack besides the built-ins
    pub custom_slots: Vec<String>,
    /// Vertex budget per combined mesh; an object is never split, so a
    /// single object may exceed it
    pub vertex_budget: usize,
}

impl Default for CombineSettings {
    fn default() -> Self {
        CombineSettings {
            session_name: "combined".into(),
            combine_materials: true,
            combine_meshes: true,
            atlas_size: 1024,
            tiling_factor: 1.0,
            custom_slots: Vec::new(),
            vertex_budget: MAX_VERTEX_BUDGET,
        }
    }
}

impl CombineSettings {
    /// Check the settings.
    ///
    /// # Panics
    /// Panics when the atlas size is not one of [`TEXTURE_ATLAS_SIZES`],
    /// the vertex budget falls outside
    /// [`MIN_VERTEX_BUDGET`]..=[`MAX_VERTEX_BUDGET`], or the tiling
    /// factor is below 1.
    pub fn validate(&self) {
        assert!(
            TEXTURE_ATLAS_SIZES.contains(&self.atlas_size),
            "atlas size {} is not a supported power of two",
            self.atlas_size
        );
        assert!(
            self.tiling_factor >= 1.0,
            "tiling factor {} must be at least 1",
            self.tiling_factor
        );
        assert!(
            (MIN_VERTEX_BUDGET..=MAX_VERTEX_BUDGET).contains(&self.vertex_budget),
            "vertex budget {} outside {}..={}",
            self.vertex_budget,
            MIN_VERTEX_BUDGET,
            MAX_VERTEX_BUDGET
        );
    }
}

/// Where a session currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineState {
    /// No combine applied
    Uncombined,
    /// A combine is running
    Combining,
    /// A combine is applied; `uncombine` reverts it
    Combined,
}

/// One combine over one scene snapshot
#[derive(Debug)]
pub struct CombineSession {
    settings: CombineSettings,
    state: CombineState,
    result: CombinedResult,
    skeleton: Option<BoneMergeResult>,
    hidden: Vec<ObjectId>,
}

impl CombineSession {
    /// New idle session. Panics on invalid settings, see
    /// [`CombineSettings::validate`].
    pub fn new(settings: CombineSettings) -> Self {
        settings.validate();
        CombineSession {
            settings,
            state: CombineState::Uncombined,
            result: CombinedResult::new(),
            skeleton: None,
            hidden: Vec::new(),
        }
    }

    /// Session settings
    pub fn settings(&self) -> &CombineSettings {
        &self.settings
    }

    /// Current state
    pub fn state(&self) -> CombineState {
        self.state
    }

    /// The combine output; empty until a combine succeeded
    pub fn result(&self) -> &CombinedResult {
        &self.result
    }

    /// Mutable access to the output, for instance removal
    pub fn result_mut(&mut self) -> &mut CombinedResult {
        &mut self.result
    }

    /// The merged skeleton, when skinned meshes were combined
    pub fn skeleton(&self) -> Option<&BoneMergeResult> {
        self.skeleton.as_ref()
    }

    /// Run the combine. The source renderers that were folded in are
    /// disabled in the scene on success; on any error the scene is left
    /// untouched and the session returns to idle.
    pub fn combine(
        &mut self,
        scene: &mut Scene,
        progress: &mut ProgressFn<'_>,
    ) -> Result<(), CombineError> {
        if self.state != CombineState::Uncombined {
            return Err(CombineError::AlreadyCombining);
        }
        self.state = CombineState::Combining;
        let start = std::time::Instant::now();
        match self.run(scene, progress) {
            Ok(()) => {
                scene.set_enabled(&self.hidden, false);
                self.result.elapsed = start.elapsed();
                self.state = CombineState::Combined;
                log::info!(
                    "session '{}': combined {} renderers into {} meshes in {:.1?}",
                    self.settings.session_name,
                    self.result.combined_object_count,
                    self.result.meshes.len(),
                    self.result.elapsed
                );
                Ok(())
            }
            Err(e) => {
                self.result = CombinedResult::new();
                self.skeleton = None;
                self.hidden.clear();
                self.state = CombineState::Uncombined;
                Err(e)
            }
        }
    }

    /// Revert a combine: re-enable the disabled source renderers and
    /// drop the result. A no-op when nothing is applied.
    pub fn uncombine(&mut self, scene: &mut Scene) {
        if self.state != CombineState::Combined {
            return;
        }
        scene.set_enabled(&self.hidden, true);
        self.hidden.clear();
        self.result = CombinedResult::new();
        self.skeleton = None;
        self.state = CombineState::Uncombined;
    }

    fn run(
        &mut self,
        scene: &Scene,
        progress: &mut ProgressFn<'_>,
    ) -> Result<(), CombineError> {
        let static_indices = indices_of(scene, RendererKind::Mesh);
        let skinned_indices = indices_of(scene, RendererKind::SkinnedMesh);
        if static_indices.is_empty() && skinned_indices.is_empty() {
            return Err(CombineError::NoMeshes);
        }
        let all: Vec<usize> = static_indices
            .iter()
            .chain(skinned_indices.iter())
            .copied()
            .collect();

        // Phase 1: register every referenced material with the union of
        // the UV bounds of the submeshes that use it
        for (step, &i) in all.iter().enumerate() {
            let object = &scene.objects[i];
            for submesh in 0..object.geometry.submesh_count() {
                let id = material_for_submesh(object, submesh);
                let Some(material) = scene.materials.get(&id) else {
                    log::error!(
                        "object '{}' references material {} that is missing from the scene snapshot",
                        object.name,
                        id
                    );
                    return Err(CombineError::NoMaterials);
                };
                let bounds = submesh_uv_bounds(&object.geometry, submesh);
                self.result.register_material(id, &material.name, bounds);
            }
            if !progress(
                CombinePhase::MaterialListing,
                (step + 1) as f32 / all.len() as f32,
            ) {
                return Err(CombineError::Cancelled);
            }
        }
        if self.result.materials.is_empty() {
            return Err(CombineError::NoMaterials);
        }

        // A single distinct material needs no atlas; with several, the
        // pixel pipeline runs whether they fold into one combined
        // material or into per-source transformed materials
        let atlasing = self.result.materials.len() > 1;
        let merge_submeshes = atlasing && self.settings.combine_materials;

        // Phase 2: pack
        let sources: Vec<MaterialDescriptor> = {
            let mut out = Vec::with_capacity(self.result.materials.len());
            for binding in &self.result.materials {
                match scene.materials.get(&binding.id) {
                    Some(m) => out.push(m.clone()),
                    None => return Err(CombineError::NoMaterials),
                }
            }
            out
        };
        let bindings: Vec<Rect> = self.result.mesh_uv_bounds();
        let mut packer = TexturePacker::new();
        packer.set_custom_slots(&self.settings.custom_slots);
        for (i, source) in sources.iter().enumerate() {
            packer.collect_material(
                source,
                atlasing,
                bindings[i],
                self.settings.tiling_factor,
                &mut self.result,
            );
            if !progress(
                CombinePhase::TexturePacking,
                (i + 1) as f32 / (sources.len() + 1) as f32,
            ) {
                return Err(CombineError::Cancelled);
            }
        }
        packer.pack(
            self.settings.atlas_size,
            self.settings.combine_materials,
            &self.settings.session_name,
            &sources,
            &mut self.result,
        )?;
        if !progress(CombinePhase::TexturePacking, 1.0) {
            return Err(CombineError::Cancelled);
        }

        // Phase 3: fold geometries
        let mesh_bounds = self.result.mesh_uv_bounds();
        let mut hidden = Vec::new();

        let static_meshes = self.fold(
            scene,
            &static_indices,
            atlasing,
            merge_submeshes,
            &mesh_bounds,
            None,
            &self.settings.session_name.clone(),
            progress,
            &mut hidden,
        )?;
        self.result.meshes.extend(static_meshes);

        if !skinned_indices.is_empty() {
            let refs: Vec<&crate::scene::RenderableObject> =
                skinned_indices.iter().map(|&i| &scene.objects[i]).collect();
            let roots = bone_roots(&scene.hierarchy, &refs);
            let skeleton = merge_bone_hierarchies(&scene.hierarchy, &roots);
            let skinned_name = format!("{}_skinned", self.settings.session_name);
            let skinned_meshes = self.fold(
                scene,
                &skinned_indices,
                atlasing,
                merge_submeshes,
                &mesh_bounds,
                Some(&skeleton),
                &skinned_name,
                progress,
                &mut hidden,
            )?;
            self.result.meshes.extend(skinned_meshes);
            self.skeleton = Some(skeleton);
        }

        self.result.combined_object_count = hidden.len();
        self.hidden = hidden;
        Ok(())
    }

    /// Prepare and accumulate one renderer class
    #[allow(clippy::too_many_arguments)]
    fn fold(
        &self,
        scene: &Scene,
        indices: &[usize],
        atlasing: bool,
        merge_submeshes: bool,
        mesh_bounds: &[Rect],
        skeleton: Option<&BoneMergeResult>,
        base_name: &str,
        progress: &mut ProgressFn<'_>,
        hidden: &mut Vec<ObjectId>,
    ) -> Result<Vec<CombinedMesh>, CombineError> {
        let mut combiner = MeshCombiner::new(
            base_name,
            self.settings.vertex_budget,
            merge_submeshes,
        );
        let mut singles: Vec<CombinedMesh> = Vec::new();

        for (step, &i) in indices.iter().enumerate() {
            let object = &scene.objects[i];
            let mut geometry = object.geometry.copy();
            let skin = match skeleton {
                Some(skeleton) => {
                    let bones =
                        skeleton.remap_bones(&scene.hierarchy, &object.bones, &object.name);
                    let bind_poses = bones
                        .iter()
                        .map(|&b| skeleton.bind_pose(b, Mat4::IDENTITY))
                        .collect();
                    Some(SkinnedData { bones, bind_poses })
                }
                None => {
                    // Static geometry is baked into world space
                    geometry.transform(&object.transform);
                    None
                }
            };

            if atlasing {
                let texture_indexes: Vec<usize> = (0..geometry.submesh_count())
                    .map(|s| {
                        self.result
                            .material_index(material_for_submesh(object, s))
                            .unwrap_or(0)
                    })
                    .collect();
                let ok = remap_uvs(
                    &mut geometry,
                    &texture_indexes,
                    &self.result.uvs,
                    &self.result.uvs2,
                    &self.result.scale_factors,
                    mesh_bounds,
                    &object.name,
                );
                if !ok {
                    log::error!("object '{}' skipped, its UVs could not be remapped", object.name);
                    continue;
                }
            }

            let submesh_materials: Vec<crate::types::MaterialId> = (0..geometry
                .submesh_count())
                .map(|s| material_for_submesh(object, s))
                .collect();
            if self.settings.combine_meshes {
                combiner.add(
                    object.id,
                    &object.name,
                    &geometry,
                    &submesh_materials,
                    skin.as_ref(),
                );
            } else {
                singles.push(single_mesh(
                    object.id,
                    &object.name,
                    geometry,
                    submesh_materials,
                    skin,
                ));
            }
            hidden.push(object.id);

            if !progress(
                CombinePhase::MeshCombining,
                (step + 1) as f32 / indices.len() as f32,
            ) {
                return Err(CombineError::Cancelled);
            }
        }

        let mut meshes = combiner.finish();
        meshes.append(&mut singles);
        Ok(meshes)
    }
}

/// A per-source mesh for the mesh-combining-off path
fn single_mesh(
    id: ObjectId,
    name: &str,
    mut geometry: crate::geometry::GeometryBuffer,
    submesh_materials: Vec<crate::types::MaterialId>,
    skin: Option<SkinnedData>,
) -> CombinedMesh {
    let (bones, bind_poses) = match skin {
        Some(s) => (s.bones, s.bind_poses),
        None => (Vec::new(), Vec::new()),
    };
    geometry.bind_poses = bind_poses;
    let record = InstanceRecord {
        id,
        name: name.to_string(),
        first_vertex: 0,
        vertex_count: geometry.vertex_count(),
        index_count: geometry.index_count(),
    };
    CombinedMesh {
        name: name.to_string(),
        geometry,
        instances: vec![record],
        bones,
        submesh_materials,
    }
}

fn indices_of(scene: &Scene, kind: RendererKind) -> Vec<usize> {
    scene
        .objects
        .iter()
        .enumerate()
        .filter(|(_, o)| {
            o.enabled
                && o.kind == kind
                && !o.geometry.vertices.is_empty()
                && !o.materials.is_empty()
        })
        .map(|(i, _)| i)
        .collect()
}

/// Material of a submesh; extra submeshes reuse the last material, the
/// common host-engine convention
fn material_for_submesh(
    object: &crate::scene::RenderableObject,
    submesh: usize,
) -> crate::types::MaterialId {
    let last = object.materials.len() - 1;
    object.materials[submesh.min(last)]
}

/// Widened UV bounds of one submesh's referenced coordinates
fn submesh_uv_bounds(geometry: &crate::geometry::GeometryBuffer, submesh: usize) -> Rect {
    if geometry.uv.is_empty() {
        return Rect::UNIT;
    }
    let referenced: Vec<glam::Vec2> = geometry.submeshes[submesh]
        .iter()
        .filter_map(|&i| geometry.uv.get(i as usize).copied())
        .collect();
    uv_bounds(&referenced)
}
