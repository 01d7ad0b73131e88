//! Progress reporting and cancellation for combine sessions
//!
//! Author: Moroya Sakamoto

/// The coarse phases a combine session moves through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinePhase {
    /// Walking the scene and registering materials
    MaterialListing,
    /// Rendering texture atlases
    TexturePacking,
    /// Folding geometries into combined meshes
    MeshCombining,
    /// Writing export artifacts
    Saving,
}

impl CombinePhase {
    /// Human-readable phase label for progress UIs
    pub fn label(&self) -> &'static str {
        match self {
            CombinePhase::MaterialListing => "listing materials",
            CombinePhase::TexturePacking => "packing textures",
            CombinePhase::MeshCombining => "combining meshes",
            CombinePhase::Saving => "saving",
        }
    }
}

/// Progress callback: phase plus completion in [0, 1] within the phase.
/// Returning `false` cancels the session at the next checkpoint.
pub type ProgressFn<'a> = dyn FnMut(CombinePhase, f32) -> bool + 'a;

/// A callback that never cancels, for headless use
pub fn silent() -> impl FnMut(CombinePhase, f32) -> bool {
    |_, _| true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(CombinePhase::TexturePacking.label(), "packing textures");
        assert!(silent()(CombinePhase::Saving, 1.0));
    }
}
