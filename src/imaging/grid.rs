//! Pure Rust grid compositor.
//!
//! Loads each tile from the media directory, fills and center-crops it to a
//! square, places it on an RGBA canvas and writes the result as PNG. Output
//! files are published with a write-to-temp-then-rename so a half-written
//! composite is never served.
//!
//! ## Naming
//!
//! A new composite is named after its collection plus a short SHA-256 of the
//! tile list (`share-cards-1a2b3c4d5e6f.png`). When the previous run's
//! reference points inside `public_prefix`, that file name is reused and
//! overwritten, so weekly refreshes never leave orphaned files behind.

use super::backend::{CompositeError, Compositor};
use super::calculations::{grid_dimensions, tile_origin};
use super::params::GridParams;
use crate::snapshot::set_published_mode;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, ImageReader, RgbaImage};
use sha2::{Digest, Sha256};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Writes composites under `output_dir`, served at `public_prefix`.
#[derive(Debug, Clone)]
pub struct GridCompositor {
    media_root: PathBuf,
    output_dir: PathBuf,
    public_prefix: String,
}

impl GridCompositor {
    pub fn new(
        media_root: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        public_prefix: impl Into<String>,
    ) -> Self {
        Self {
            media_root: media_root.into(),
            output_dir: output_dir.into(),
            public_prefix: public_prefix.into(),
        }
    }

    /// Map an image reference to a file under the media root.
    fn resolve(&self, reference: &str) -> Result<PathBuf, CompositeError> {
        if reference.contains("://") {
            return Err(CompositeError::Load {
                reference: reference.to_string(),
                message: "remote images are not supported".to_string(),
            });
        }
        let relative = reference.trim_start_matches('/');
        if Path::new(relative)
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(CompositeError::Load {
                reference: reference.to_string(),
                message: "path escapes the media root".to_string(),
            });
        }
        Ok(self.media_root.join(relative))
    }

    /// Output file name: the previous one when we own it, a fresh one otherwise.
    fn file_name_for(&self, params: &GridParams) -> String {
        if let Some(previous) = params.previous.as_deref()
            && let Some(name) = previous.strip_prefix(&self.public_prefix)
            && !name.is_empty()
            && !name.contains('/')
            && name.ends_with(".png")
        {
            return name.to_string();
        }
        let mut hasher = Sha256::new();
        hasher.update(params.name.as_bytes());
        for image in &params.images {
            hasher.update(b"\0");
            hasher.update(image.as_bytes());
        }
        let digest = format!("{:x}", hasher.finalize());
        format!("share-{}-{}.png", slug(&params.name), &digest[..12])
    }
}

/// Lowercase alphanumerics, everything else collapsed to `-`.
fn slug(name: &str) -> String {
    let mut out = String::new();
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

fn load_image(path: &Path, reference: &str) -> Result<DynamicImage, CompositeError> {
    ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| CompositeError::Load {
            reference: reference.to_string(),
            message: e.to_string(),
        })
}

fn ensure_non_empty(params: &GridParams) -> Result<(), CompositeError> {
    if params.images.is_empty() || params.per_line == 0 || params.tile_size == 0 {
        return Err(CompositeError::ProcessingFailed(format!(
            "empty grid for {}",
            params.name
        )));
    }
    Ok(())
}

impl Compositor for GridCompositor {
    fn compose(&self, params: &GridParams) -> Result<String, CompositeError> {
        ensure_non_empty(params)?;

        let (width, height) = grid_dimensions(params.images.len(), params.per_line, params.tile_size);
        let mut canvas = RgbaImage::new(width, height);

        for (index, reference) in params.images.iter().enumerate() {
            let path = self.resolve(reference)?;
            let tile = load_image(&path, reference)?
                .resize_to_fill(params.tile_size, params.tile_size, FilterType::Lanczos3)
                .to_rgba8();
            let (x, y) = tile_origin(index, params.per_line, params.tile_size);
            imageops::overlay(&mut canvas, &tile, i64::from(x), i64::from(y));
        }

        std::fs::create_dir_all(&self.output_dir)?;
        let file_name = self.file_name_for(params);
        let mut tmp = tempfile::NamedTempFile::new_in(&self.output_dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            canvas
                .write_to(&mut writer, ImageFormat::Png)
                .map_err(|e| CompositeError::ProcessingFailed(format!("PNG encode failed: {e}")))?;
        }
        set_published_mode(tmp.as_file())?;
        tmp.persist(self.output_dir.join(&file_name))
            .map_err(|e| CompositeError::Io(e.error))?;

        tracing::debug!(
            "composited {} tiles for {} into {}",
            params.images.len(),
            params.name,
            file_name
        );
        Ok(format!("{}{}", self.public_prefix, file_name))
    }
}

/// Checks that every tile exists and returns the reference a real run
/// would publish. Decodes nothing and writes nothing.
#[derive(Debug, Clone)]
pub struct DryRunCompositor(pub GridCompositor);

impl Compositor for DryRunCompositor {
    fn compose(&self, params: &GridParams) -> Result<String, CompositeError> {
        ensure_non_empty(params)?;
        for reference in &params.images {
            if !self.0.resolve(reference)?.is_file() {
                return Err(CompositeError::Load {
                    reference: reference.clone(),
                    message: "file not found".to_string(),
                });
            }
        }
        Ok(format!("{}{}", self.0.public_prefix, self.0.file_name_for(params)))
    }
}
