//! Loading and validating the input silhouette.

use std::path::{Path, PathBuf};

use image::RgbaImage;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::icon::SizePx;
use crate::layer::{primitives, svg};

/// Longest side vector masks are rasterized to.
pub const SVG_RASTER_SIZE: u32 = 1024;

/// A decoded mask image.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    path: PathBuf,
    image: RgbaImage,
}

impl Mask {
    /// Reads a mask from disk.
    ///
    /// The format is detected from the content, not the extension, so cached
    /// copies (stored as `*.mask`) load the same way. SVG documents are
    /// rasterized; anything else goes through the `image` decoders.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::input(path, "mask file does not exist"));
        }
        let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;

        let image = if looks_like_svg(path, &bytes) {
            let data = String::from_utf8_lossy(&bytes);
            svg::rasterize_svg(&data, SVG_RASTER_SIZE, path.parent())
                .map_err(|reason| Error::input(path, reason))?
        } else {
            let decoded = image::load_from_memory(&bytes)
                .map_err(|e| Error::input(path, format!("cannot decode image: {e}")))?;
            if !decoded.color().has_alpha() {
                return Err(Error::input(
                    path,
                    "mask has no alpha channel; use a design over a transparent background",
                ));
            }
            decoded.into_rgba8()
        };

        debug!(
            path = %path.display(),
            width = image.width(),
            height = image.height(),
            "loaded mask"
        );
        Self::from_image(path, image)
    }

    /// Wraps an already decoded image, applying the same validation as [`Mask::load`].
    pub fn from_image(path: impl Into<PathBuf>, image: RgbaImage) -> Result<Self> {
        let path = path.into();
        if primitives::content_bounds(&image).is_none() {
            return Err(Error::input(&path, "mask is fully transparent"));
        }

        let (w, h) = image.dimensions();
        let corners = [(0, 0), (w - 1, 0), (0, h - 1), (w - 1, h - 1)];
        if corners.iter().any(|&(x, y)| image.get_pixel(x, y)[3] != 0) {
            warn!(
                path = %path.display(),
                "mask corners are not transparent; margins may be trimmed unexpectedly"
            );
        }

        Ok(Self { path, image })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Runs the size-independent steps: optional trim, then centering inside
    /// `centering` when the epoch uses a centering box.
    pub fn prepare(&self, trim: bool, centering: Option<SizePx>) -> PreparedMask {
        let trimmed = if trim {
            primitives::trim(&self.image)
        } else {
            self.image.clone()
        };
        let image = match centering {
            Some(size) => primitives::resize_centered(&trimmed, size, size),
            None => trimmed,
        };
        PreparedMask { image }
    }
}

fn looks_like_svg(path: &Path, bytes: &[u8]) -> bool {
    if path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"))
    {
        return true;
    }
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(512)]);
    let head = head.trim_start_matches('\u{feff}').trim_start();
    head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg"))
}

/// A mask after the steps shared by every size. Read-only for the rest of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedMask {
    image: RgbaImage,
}

impl PreparedMask {
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}
