//! Export of combine results to disk
//!
//! Writes the rendered atlases as PNG, the material descriptors as JSON,
//! and each combined mesh as Wavefront OBJ; `ExportOptions` selects which
//! of the three artifact kinds a save produces. The exporter keeps a
//! ledger of what it already wrote so repeated saves of the same session
//! do not duplicate files, and deduplicates output mesh names with a
//! numeric suffix.
//!
//! Author: Moroya Sakamoto

use crate::material::{slot_display_name, MaterialDescriptor, MaterialExport};
use crate::result::{CombinedMesh, CombinedResult};
use crate::types::{MaterialId, ObjectId, Rect};
use serde::Serialize;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Export errors
#[derive(Debug, Error)]
pub enum ExportError {
    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// PNG encoding error
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Material descriptor serialization error
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// `save` called on a session that produced nothing
    #[error("nothing to save; run a combine first")]
    NothingToSave,
}

/// Serializable summary of a combine, written next to the meshes
#[derive(Debug, Serialize)]
struct ResultExport {
    session: String,
    materials: Vec<String>,
    uvs: Vec<Rect>,
    scale_factors: Vec<f32>,
    meshes: Vec<MeshExport>,
    combined_object_count: usize,
    elapsed_ms: u128,
}

#[derive(Debug, Serialize)]
struct MeshExport {
    name: String,
    vertex_count: usize,
    triangle_count: usize,
    sources: Vec<String>,
}

/// What a save writes; everything is on by default
#[derive(Debug, Clone, Copy)]
pub struct ExportOptions {
    /// Write the rendered atlases as PNG
    pub save_textures: bool,
    /// Write material descriptors as JSON
    pub save_materials: bool,
    /// Write combined meshes as Wavefront OBJ
    pub save_meshes_as_obj: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            save_textures: true,
            save_materials: true,
            save_meshes_as_obj: true,
        }
    }
}

/// Writes combine results under one output directory
#[derive(Debug)]
pub struct Exporter {
    directory: PathBuf,
    options: ExportOptions,
    /// File names already written
    saved_files: HashSet<String>,
    /// Meshes already written, keyed by source identity rather than
    /// output name so a renamed mesh is not written twice
    saved_meshes: HashSet<(ObjectId, MaterialId)>,
    used_names: HashSet<String>,
}

impl Exporter {
    /// Exporter rooted at `directory`; the directory is created on the
    /// first save
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Exporter::with_options(directory, ExportOptions::default())
    }

    /// Exporter writing only the artifact kinds `options` enables
    pub fn with_options(directory: impl Into<PathBuf>, options: ExportOptions) -> Self {
        Exporter {
            directory: directory.into(),
            options,
            saved_files: HashSet::new(),
            saved_meshes: HashSet::new(),
            used_names: HashSet::new(),
        }
    }

    /// Write atlases, materials and combined meshes, honoring the
    /// exporter's options. With material combining off, one descriptor is
    /// written per transformed stand-in. Returns the paths written by
    /// this call; artifacts already written by an earlier save are
    /// skipped.
    pub fn save(
        &mut self,
        session_name: &str,
        result: &CombinedResult,
    ) -> Result<Vec<PathBuf>, ExportError> {
        if result.meshes.is_empty() {
            return Err(ExportError::NothingToSave);
        }
        // The stand-ins all carry the same atlas textures, so the first
        // registered one serves as the atlas source when no combined
        // material exists
        let atlas_material = result.combined_material.as_ref().or_else(|| {
            result
                .materials
                .iter()
                .find_map(|m| result.transformed_materials.get(&m.name))
        });
        let Some(atlas_material) = atlas_material else {
            return Err(ExportError::NothingToSave);
        };
        std::fs::create_dir_all(&self.directory)?;

        let mut written = Vec::new();
        let atlas_files = self.save_atlases(session_name, atlas_material, &mut written)?;
        if self.options.save_materials {
            if let Some(material) = result.combined_material.as_ref() {
                let file_name = format!("{}_material.json", session_name);
                self.save_material(&file_name, material, &atlas_files, &mut written)?;
            } else {
                for binding in &result.materials {
                    if let Some(material) = result.transformed_materials.get(&binding.name) {
                        let file_name = format!("{}_material.json", material.name);
                        self.save_material(&file_name, material, &atlas_files, &mut written)?;
                    }
                }
            }
        }
        self.save_summary(session_name, result, &mut written)?;

        if self.options.save_meshes_as_obj {
            for mesh in &result.meshes {
                let material = mesh
                    .submesh_materials
                    .first()
                    .copied()
                    .unwrap_or(atlas_material.id);
                let key = (mesh.source_id(), material);
                if self.saved_meshes.contains(&key) {
                    log::info!("mesh '{}' already saved, skipping", mesh.name);
                    continue;
                }
                let file_name = self.unique_name(&mesh.name);
                let path = self.directory.join(format!("{}.obj", file_name));
                write_obj(mesh, &path)?;
                self.saved_meshes.insert(key);
                written.push(path);
            }
        }
        Ok(written)
    }

    /// Collect (slot, file name) pairs for every atlas slot, writing the
    /// PNGs when textures are enabled
    fn save_atlases(
        &mut self,
        session_name: &str,
        material: &MaterialDescriptor,
        written: &mut Vec<PathBuf>,
    ) -> Result<Vec<(String, String)>, ExportError> {
        let mut files = Vec::new();
        for (slot, texture) in &material.textures {
            let file_name = format!("{}_{}.png", session_name, slot_display_name(slot));
            files.push((slot.clone(), file_name.clone()));

            if !self.options.save_textures || self.saved_files.contains(&file_name) {
                continue;
            }
            let Some(image) = texture.image.as_ref() else {
                continue;
            };
            let path = self.directory.join(&file_name);
            image.save(&path)?;
            self.saved_files.insert(file_name);
            written.push(path);
        }
        Ok(files)
    }

    fn save_material(
        &mut self,
        file_name: &str,
        material: &MaterialDescriptor,
        atlas_files: &[(String, String)],
        written: &mut Vec<PathBuf>,
    ) -> Result<(), ExportError> {
        if self.saved_files.contains(file_name) {
            return Ok(());
        }
        let export = MaterialExport {
            name: material.name.clone(),
            shader: material.shader.clone(),
            textures: atlas_files.to_vec(),
            color: material.tint(),
            emission_enabled: material.emission_enabled,
            emission_color: material.emission_color,
        };
        let path = self.directory.join(file_name);
        let file = std::fs::File::create(&path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), &export)?;
        self.saved_files.insert(file_name.to_string());
        written.push(path);
        Ok(())
    }

    fn save_summary(
        &mut self,
        session_name: &str,
        result: &CombinedResult,
        written: &mut Vec<PathBuf>,
    ) -> Result<(), ExportError> {
        let file_name = format!("{}_result.json", session_name);
        if self.saved_files.contains(&file_name) {
            return Ok(());
        }
        let export = ResultExport {
            session: session_name.to_string(),
            materials: result.materials.iter().map(|m| m.name.clone()).collect(),
            uvs: result.uvs.clone(),
            scale_factors: result.scale_factors.clone(),
            meshes: result
                .meshes
                .iter()
                .map(|m| MeshExport {
                    name: m.name.clone(),
                    vertex_count: m.geometry.vertex_count(),
                    triangle_count: m.geometry.triangle_count(),
                    sources: m.instances.iter().map(|r| r.name.clone()).collect(),
                })
                .collect(),
            combined_object_count: result.combined_object_count,
            elapsed_ms: result.elapsed.as_millis(),
        };
        let path = self.directory.join(&file_name);
        let file = std::fs::File::create(&path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), &export)?;
        self.saved_files.insert(file_name);
        written.push(path);
        Ok(())
    }

    /// First unused variant of `name`, suffixing " (n)" on collisions
    fn unique_name(&mut self, name: &str) -> String {
        let mut candidate = name.to_string();
        let mut n = 1;
        while self.used_names.contains(&candidate) {
            candidate = format!("{} ({})", name, n);
            n += 1;
        }
        self.used_names.insert(candidate.clone());
        candidate
    }
}

/// Write a combined mesh as Wavefront OBJ, one group per submesh
fn write_obj(mesh: &CombinedMesh, path: impl AsRef<Path>) -> Result<(), ExportError> {
    let g = &mesh.geometry;
    let file = std::fs::File::create(path.as_ref())?;
    let mut w = std::io::BufWriter::new(file);

    writeln!(w, "# mace-combine OBJ export")?;
    writeln!(w, "# Vertices: {}", g.vertex_count())?;
    writeln!(w, "# Triangles: {}", g.triangle_count())?;
    writeln!(w, "o {}", mesh.name)?;

    for v in &g.vertices {
        writeln!(w, "v {} {} {}", v.x, v.y, v.z)?;
    }
    let has_uv = !g.uv.is_empty();
    for uv in &g.uv {
        writeln!(w, "vt {} {}", uv.x, uv.y)?;
    }
    let has_normals = !g.normals.is_empty();
    for n in &g.normals {
        writeln!(w, "vn {} {} {}", n.x, n.y, n.z)?;
    }

    for (s, submesh) in g.submeshes.iter().enumerate() {
        if g.submeshes.len() > 1 {
            writeln!(w, "g {}_{}", mesh.name, s)?;
        }
        for tri in submesh.chunks_exact(3) {
            // OBJ indices are 1-based
            let (a, b, c) = (tri[0] + 1, tri[1] + 1, tri[2] + 1);
            match (has_uv, has_normals) {
                (true, true) => {
                    writeln!(w, "f {a}/{a}/{a} {b}/{b}/{b} {c}/{c}/{c}")?;
                }
                (true, false) => writeln!(w, "f {a}/{a} {b}/{b} {c}/{c}")?,
                (false, true) => writeln!(w, "f {a}//{a} {b}//{b} {c}//{c}")?,
                (false, false) => writeln!(w, "f {a} {b} {c}")?,
            }
        }
    }
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::solid_image;
    use crate::material::{Texture, MAIN_TEX};
    use crate::result::InstanceRecord;
    use crate::types::{MaterialId, ObjectId, Rgba};
    use glam::{Vec2, Vec3};

    fn small_result() -> CombinedResult {
        let material = MaterialDescriptor::new(MaterialId(1), "combined_material", "Standard")
            .with_texture(
                MAIN_TEX,
                Texture::new("atlas", solid_image(4, 4, Rgba::WHITE)),
            );
        let geometry = crate::geometry::GeometryBuffer {
            name: "combined_mesh_0".into(),
            vertices: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            uv: vec![Vec2::ZERO, Vec2::X, Vec2::Y],
            submeshes: vec![vec![0, 1, 2]],
            ..Default::default()
        };
        CombinedResult {
            combined_material: Some(material),
            meshes: vec![CombinedMesh {
                name: "combined_mesh_0".into(),
                geometry,
                instances: vec![InstanceRecord {
                    id: ObjectId(1),
                    name: "src".into(),
                    first_vertex: 0,
                    vertex_count: 3,
                    index_count: 3,
                }],
                bones: Vec::new(),
                submesh_materials: Vec::new(),
            }],
            ..CombinedResult::default()
        }
    }

    fn multi_material_result() -> CombinedResult {
        let mut result = small_result();
        result.combined_material = None;
        result.meshes[0].submesh_materials = vec![MaterialId(1)];
        result.register_material(MaterialId(1), "red", Rect::UNIT);
        result.register_material(MaterialId(2), "blue", Rect::UNIT);
        let atlas = || Texture::new("atlas", solid_image(4, 4, Rgba::WHITE));
        result.transformed_materials.insert(
            "red".into(),
            MaterialDescriptor::new(MaterialId(1), "batch_red", "Standard")
                .with_texture(MAIN_TEX, atlas()),
        );
        result.transformed_materials.insert(
            "blue".into(),
            MaterialDescriptor::new(MaterialId(2), "batch_blue", "Standard")
                .with_texture(MAIN_TEX, atlas()),
        );
        result
    }

    #[test]
    fn save_writes_atlas_material_and_mesh() {
        let dir = tempfile::tempdir().unwrap();
        let mut exporter = Exporter::new(dir.path());
        let written = exporter.save("batch", &small_result()).unwrap();

        assert_eq!(written.len(), 4);
        assert!(dir.path().join("batch_Diffuse.png").exists());
        assert!(dir.path().join("batch_material.json").exists());
        assert!(dir.path().join("batch_result.json").exists());
        let obj = std::fs::read_to_string(dir.path().join("combined_mesh_0.obj")).unwrap();
        assert!(obj.contains("v 0 0 0"));
        assert!(obj.contains("f 1/1 2/2 3/3"));
    }

    #[test]
    fn repeated_save_skips_existing_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let mut exporter = Exporter::new(dir.path());
        let result = small_result();
        exporter.save("batch", &result).unwrap();
        let second = exporter.save("batch", &result).unwrap();
        assert!(second.is_empty(), "second save rewrote {:?}", second);
    }

    #[test]
    fn empty_result_is_nothing_to_save() {
        let dir = tempfile::tempdir().unwrap();
        let mut exporter = Exporter::new(dir.path());
        let err = exporter.save("batch", &CombinedResult::default());
        assert!(matches!(err, Err(ExportError::NothingToSave)));
    }

    #[test]
    fn renamed_mesh_is_not_written_twice() {
        let dir = tempfile::tempdir().unwrap();
        let mut exporter = Exporter::new(dir.path());
        let mut result = small_result();
        exporter.save("batch", &result).unwrap();

        result.meshes[0].name = "renamed".into();
        let second = exporter.save("batch", &result).unwrap();
        assert!(second.is_empty(), "second save rewrote {:?}", second);
        assert!(!dir.path().join("renamed.obj").exists());
    }

    #[test]
    fn distinct_meshes_sharing_a_name_both_save() {
        let dir = tempfile::tempdir().unwrap();
        let mut exporter = Exporter::new(dir.path());
        let mut result = small_result();
        let mut twin = result.meshes[0].clone();
        twin.instances[0].id = ObjectId(2);
        result.meshes.push(twin);

        exporter.save("batch", &result).unwrap();
        assert!(dir.path().join("combined_mesh_0.obj").exists());
        assert!(dir.path().join("combined_mesh_0 (1).obj").exists());
    }

    #[test]
    fn options_suppress_selected_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let options = ExportOptions {
            save_textures: false,
            save_materials: false,
            save_meshes_as_obj: true,
        };
        let mut exporter = Exporter::with_options(dir.path(), options);
        exporter.save("batch", &small_result()).unwrap();

        assert!(!dir.path().join("batch_Diffuse.png").exists());
        assert!(!dir.path().join("batch_material.json").exists());
        assert!(dir.path().join("batch_result.json").exists());
        assert!(dir.path().join("combined_mesh_0.obj").exists());
    }

    #[test]
    fn obj_output_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let options = ExportOptions {
            save_meshes_as_obj: false,
            ..ExportOptions::default()
        };
        let mut exporter = Exporter::with_options(dir.path(), options);
        exporter.save("batch", &small_result()).unwrap();

        assert!(dir.path().join("batch_Diffuse.png").exists());
        assert!(!dir.path().join("combined_mesh_0.obj").exists());
    }

    #[test]
    fn stand_ins_are_written_one_per_source_material() {
        let dir = tempfile::tempdir().unwrap();
        let mut exporter = Exporter::new(dir.path());
        exporter.save("batch", &multi_material_result()).unwrap();

        assert!(dir.path().join("batch_Diffuse.png").exists());
        assert!(dir.path().join("batch_red_material.json").exists());
        assert!(dir.path().join("batch_blue_material.json").exists());
        assert!(dir.path().join("combined_mesh_0.obj").exists());
    }

    #[test]
    fn colliding_mesh_names_get_suffixes() {
        let mut exporter = Exporter::new("unused");
        assert_eq!(exporter.unique_name("mesh"), "mesh");
        assert_eq!(exporter.unique_name("mesh"), "mesh (1)");
        assert_eq!(exporter.unique_name("mesh"), "mesh (2)");
    }
}
