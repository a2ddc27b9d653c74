//! Compositor trait and shared error type.
//!
//! The [`Compositor`] trait is the one operation share-image generation needs
//! from an imaging backend: lay out a list of images in a grid, store the
//! result, and hand back a reference the site can serve.
//!
//! The production implementation is
//! [`GridCompositor`](super::grid::GridCompositor), which writes PNG files
//! under a media directory.

use super::params::GridParams;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompositeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot load {reference}: {message}")]
    Load { reference: String, message: String },
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Trait for composite backends.
///
/// `Sync` so one compositor can serve every collection from rayon workers.
pub trait Compositor: Sync {
    /// Build the grid and return a reference to the stored composite.
    ///
    /// When `params.previous` names an asset this compositor owns, the new
    /// composite replaces it in place.
    fn compose(&self, params: &GridParams) -> Result<String, CompositeError>;
}
