//! Share-image compositing, pure Rust on top of the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode tiles** | `image::ImageReader` (JPEG, PNG, WebP) |
//! | **Fit tile** | `DynamicImage::resize_to_fill` (Lanczos3, center crop) |
//! | **Place tile** | `image::imageops::overlay` |
//! | **Encode** | PNG via `RgbaImage::write_to` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for grid geometry (unit testable)
//! - **Parameters**: [`GridParams`], the description of one composite
//! - **Backend**: [`Compositor`] trait + [`GridCompositor`], and
//!   [`DryRunCompositor`] for checks that must not write

pub mod backend;
mod calculations;
pub mod grid;
mod params;

pub use backend::{CompositeError, Compositor};
pub use calculations::{grid_dimensions, tile_origin};
pub use grid::{DryRunCompositor, GridCompositor};
pub use params::GridParams;
