//! Core value types shared across the combine pipeline
//!
//! Opaque identities, UV/atlas rectangles, linear colors and bounds.
//! Host-engine object handles are represented as stable integer ids;
//! nothing here assumes reference-equality semantics beyond the id key.
//!
//! Author: Moroya Sakamoto

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Stable identity of a scene object (renderer, transform, bone).
///
/// Wraps whatever instance id the host scene graph hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stable identity of a material snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaterialId(pub u64);

impl std::fmt::Display for MaterialId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mat#{}", self.0)
    }
}

/// Axis-aligned rectangle in UV or atlas space.
///
/// Stored as position + size; `width`/`height` may be negative for
/// mirrored UV bounds (the sign carries the mirror direction).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// X of the min corner (when width is positive)
    pub x: f32,
    /// Y of the min corner (when height is positive)
    pub y: f32,
    /// Horizontal extent
    pub width: f32,
    /// Vertical extent
    pub height: f32,
}

impl Rect {
    /// The unit rectangle [0,1]×[0,1]
    pub const UNIT: Rect = Rect {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    /// Create a rectangle from position and size
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    /// Min corner
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Extent
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    /// Left edge
    pub fn x_min(&self) -> f32 {
        self.x
    }

    /// Right edge
    pub fn x_max(&self) -> f32 {
        self.x + self.width
    }

    /// Bottom edge
    pub fn y_min(&self) -> f32 {
        self.y
    }

    /// Top edge
    pub fn y_max(&self) -> f32 {
        self.y + self.height
    }

    /// Center point
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    /// Move the left edge, keeping the right edge fixed
    pub fn set_x_min(&mut self, v: f32) {
        let max = self.x_max();
        self.x = v;
        self.width = max - v;
    }

    /// Move the right edge, keeping the left edge fixed
    pub fn set_x_max(&mut self, v: f32) {
        self.width = v - self.x;
    }

    /// Move the bottom edge, keeping the top edge fixed
    pub fn set_y_min(&mut self, v: f32) {
        let max = self.y_max();
        self.y = v;
        self.height = max - v;
    }

    /// Move the top edge, keeping the bottom edge fixed
    pub fn set_y_max(&mut self, v: f32) {
        self.height = v - self.y;
    }

    /// Smallest rectangle containing both inputs
    pub fn union(&self, other: &Rect) -> Rect {
        let x_min = self.x_min().min(other.x_min());
        let y_min = self.y_min().min(other.y_min());
        let x_max = self.x_max().max(other.x_max());
        let y_max = self.y_max().max(other.y_max());
        Rect::new(x_min, y_min, x_max - x_min, y_max - y_min)
    }

    /// Area of the overlap with another rectangle (0 when disjoint)
    pub fn intersection_area(&self, other: &Rect) -> f32 {
        let w = (self.x_max().min(other.x_max()) - self.x_min().max(other.x_min())).max(0.0);
        let h = (self.y_max().min(other.y_max()) - self.y_min().max(other.y_min())).max(0.0);
        w * h
    }
}

impl Default for Rect {
    fn default() -> Self {
        Rect::UNIT
    }
}

/// Linear RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    /// Red
    pub r: f32,
    /// Green
    pub g: f32,
    /// Blue
    pub b: f32,
    /// Alpha
    pub a: f32,
}

impl Rgba {
    /// Opaque white
    pub const WHITE: Rgba = Rgba::new(1.0, 1.0, 1.0, 1.0);
    /// Opaque black
    pub const BLACK: Rgba = Rgba::new(0.0, 0.0, 0.0, 1.0);
    /// Fully transparent black
    pub const TRANSPARENT: Rgba = Rgba::new(0.0, 0.0, 0.0, 0.0);
    /// The flat tangent-space normal (0.5, 0.5, 1)
    pub const FLAT_NORMAL: Rgba = Rgba::new(0.5, 0.5, 1.0, 1.0);

    /// Construct from components
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Rgba { r, g, b, a }
    }

    /// Componentwise multiply (color modulation)
    pub fn modulate(&self, other: &Rgba) -> Rgba {
        Rgba::new(
            self.r * other.r,
            self.g * other.g,
            self.b * other.b,
            self.a * other.a,
        )
    }

    /// Convert to 8-bit RGBA
    pub fn to_bytes(&self) -> [u8; 4] {
        [
            (self.r.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.g.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.b.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.a.clamp(0.0, 1.0) * 255.0).round() as u8,
        ]
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Rgba::WHITE
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Min corner
    pub min: Vec3,
    /// Max corner
    pub max: Vec3,
}

impl Aabb {
    /// Empty bounds (inverted, ready for extension)
    pub fn empty() -> Self {
        Aabb {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    /// Extend to contain a point
    pub fn extend(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Bounds of a point set; zero-sized at origin for an empty set
    pub fn from_points(points: &[Vec3]) -> Self {
        if points.is_empty() {
            return Aabb {
                min: Vec3::ZERO,
                max: Vec3::ZERO,
            };
        }
        let mut bounds = Aabb::empty();
        for &p in points {
            bounds.extend(p);
        }
        bounds
    }

    /// Center point
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Aabb {
            min: Vec3::ZERO,
            max: Vec3::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_edges_and_center() {
        let r = Rect::new(0.25, 0.5, 0.5, 0.25);
        assert_eq!(r.x_max(), 0.75);
        assert_eq!(r.y_max(), 0.75);
        assert_eq!(r.center(), Vec2::new(0.5, 0.625));
    }

    #[test]
    fn rect_set_min_keeps_max() {
        let mut r = Rect::UNIT;
        r.set_x_min(-0.5);
        assert_eq!(r.x_min(), -0.5);
        assert_eq!(r.x_max(), 1.0);
        r.set_y_max(2.0);
        assert_eq!(r.y_min(), 0.0);
        assert_eq!(r.y_max(), 2.0);
    }

    #[test]
    fn rect_union_covers_both() {
        let a = Rect::new(0.0, 0.0, 1.0, 1.0);
        let b = Rect::new(-1.0, 0.5, 1.0, 2.0);
        let u = a.union(&b);
        assert_eq!(u.x_min(), -1.0);
        assert_eq!(u.x_max(), 1.0);
        assert_eq!(u.y_min(), 0.0);
        assert_eq!(u.y_max(), 2.5);
    }

    #[test]
    fn rect_intersection_area_disjoint_is_zero() {
        let a = Rect::new(0.0, 0.0, 0.5, 0.5);
        let b = Rect::new(0.5, 0.0, 0.5, 0.5);
        assert_eq!(a.intersection_area(&b), 0.0);
        let c = Rect::new(0.25, 0.25, 0.5, 0.5);
        assert!((a.intersection_area(&c) - 0.0625).abs() < 1e-6);
    }

    #[test]
    fn color_modulate_and_bytes() {
        let tint = Rgba::new(0.5, 1.0, 0.0, 1.0);
        let m = Rgba::WHITE.modulate(&tint);
        assert_eq!(m, tint);
        assert_eq!(Rgba::WHITE.to_bytes(), [255, 255, 255, 255]);
        assert_eq!(Rgba::FLAT_NORMAL.to_bytes()[2], 255);
    }

    #[test]
    fn aabb_from_points() {
        let b = Aabb::from_points(&[Vec3::new(-1.0, 0.0, 2.0), Vec3::new(1.0, -3.0, 0.0)]);
        assert_eq!(b.min, Vec3::new(-1.0, -3.0, 0.0));
        assert_eq!(b.max, Vec3::new(1.0, 0.0, 2.0));
        assert_eq!(Aabb::from_points(&[]).center(), Vec3::ZERO);
    }
}
