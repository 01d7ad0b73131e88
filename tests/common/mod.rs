//! Shared test fixtures: small scenes with known geometry and materials
//!
//! Author: Moroya Sakamoto

#![allow(dead_code)]

use glam::{Mat4, Quat, Vec2, Vec3};
use image::RgbaImage;
use mace_combine::prelude::*;

/// Route combine logs through the test harness
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A unit quad (4 vertices, 2 triangles) with unit-square UVs
pub fn quad(name: &str) -> GeometryBuffer {
    GeometryBuffer {
        name: name.into(),
        vertices: vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ],
        uv: vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ],
        submeshes: vec![vec![0, 1, 2, 0, 2, 3]],
        ..GeometryBuffer::default()
    }
}

/// A triangle fan with exactly `vertex_count` vertices, for vertex
/// budget scenarios
pub fn blob(name: &str, vertex_count: usize) -> GeometryBuffer {
    let vertices: Vec<Vec3> = (0..vertex_count)
        .map(|i| Vec3::new(i as f32, 0.0, 0.0))
        .collect();
    let uv = vec![Vec2::new(0.5, 0.5); vertex_count];
    let indices: Vec<u32> = (0..vertex_count.saturating_sub(2) as u32)
        .flat_map(|i| [0, i + 1, i + 2])
        .collect();
    GeometryBuffer {
        name: name.into(),
        vertices,
        uv,
        submeshes: vec![indices],
        ..GeometryBuffer::default()
    }
}

/// A solid-color material with a readable main texture
pub fn solid_material(id: u64, name: &str, size: u32, rgba: [u8; 4]) -> MaterialDescriptor {
    let image = RgbaImage::from_pixel(size, size, image::Rgba(rgba));
    MaterialDescriptor::new(MaterialId(id), name, "Standard")
        .with_texture(MAIN_TEX, Texture::new(format!("{}_d", name), image))
}

/// A static renderable object at `position`
pub fn static_object(
    id: u64,
    name: &str,
    geometry: GeometryBuffer,
    material: MaterialId,
    position: Vec3,
) -> RenderableObject {
    RenderableObject {
        id: ObjectId(id),
        name: name.into(),
        geometry,
        materials: vec![material],
        transform: Mat4::from_translation(position),
        enabled: true,
        kind: RendererKind::Mesh,
        bones: Vec::new(),
    }
}

/// A two-quad, two-material scene
pub fn two_material_scene() -> Scene {
    let mut scene = Scene::new();
    scene.add_material(solid_material(1, "red", 16, [255, 0, 0, 255]));
    scene.add_material(solid_material(2, "blue", 16, [0, 0, 255, 255]));
    scene.add_object(static_object(
        10,
        "quad_red",
        quad("quad_red"),
        MaterialId(1),
        Vec3::ZERO,
    ));
    scene.add_object(static_object(
        11,
        "quad_blue",
        quad("quad_blue"),
        MaterialId(2),
        Vec3::new(2.0, 0.0, 0.0),
    ));
    scene
}

/// A skinned object bound to the given bone nodes
pub fn skinned_object(
    id: u64,
    name: &str,
    material: MaterialId,
    bones: Vec<usize>,
) -> RenderableObject {
    let mut geometry = quad(name);
    geometry.bone_weights = vec![
        BoneWeight {
            indices: [0, 1, 0, 0],
            weights: [0.7, 0.3, 0.0, 0.0],
        };
        4
    ];
    RenderableObject {
        id: ObjectId(id),
        name: name.into(),
        geometry,
        materials: vec![material],
        transform: Mat4::IDENTITY,
        enabled: true,
        kind: RendererKind::SkinnedMesh,
        bones,
    }
}

/// Add a two-bone chain to a scene's hierarchy, returning the node
/// indices (root first)
pub fn add_bone_chain(scene: &mut Scene, base_id: u64) -> Vec<usize> {
    let root = scene.hierarchy.add_node(
        ObjectId(base_id),
        "hips",
        Vec3::new(0.0, 1.0, 0.0),
        Quat::IDENTITY,
        Vec3::ONE,
        None,
    );
    let spine = scene.hierarchy.add_node(
        ObjectId(base_id + 1),
        "spine",
        Vec3::new(0.0, 0.5, 0.0),
        Quat::IDENTITY,
        Vec3::ONE,
        Some(root),
    );
    vec![root, spine]
}
