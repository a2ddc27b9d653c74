//! Parameter type for composite operations.
//!
//! [`GridParams`] describes *what* to build, not *how*. It is the interface
//! between [`share_images`](crate::share_images), which decides which images
//! go into a collection's preview, and the [`Compositor`](super::Compositor)
//! that does the pixel work. Tests swap in a recording mock without touching
//! the selection logic.

/// Full specification of one grid composite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridParams {
    /// Collection the composite previews. Used to name new output files.
    pub name: String,
    /// Image references, in tile order (left to right, top to bottom).
    pub images: Vec<String>,
    /// Tiles per row.
    pub per_line: u32,
    /// Edge length of each square tile, in pixels.
    pub tile_size: u32,
    /// Reference returned by the previous run, replaced instead of orphaned.
    pub previous: Option<String>,
}
