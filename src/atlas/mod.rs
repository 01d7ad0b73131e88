//! Texture atlas construction
//!
//! * [`layout`] - shelf rectangle layout with downscale-to-fit
//! * [`image_ops`] - placeholder synthesis, resizing and tiled copies
//! * [`packer`] - multi-slot packing against a shared primary layout
//!
//! Author: Moroya Sakamoto

pub mod image_ops;
pub mod layout;
pub mod packer;

pub use image_ops::{solid_image, texture_size_in_atlas, MAX_TEXTURE_SIZE, NO_TEXTURE_COLOR_SIZE};
pub use layout::{layout_rects, Placement};
pub use packer::TexturePacker;
