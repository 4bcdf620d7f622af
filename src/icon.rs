//! Pixel geometry and the rendered `.iconset` handle.

use std::path::{Path, PathBuf};

use crate::style::SizeName;

/// A rectangle defined in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RectPx {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl RectPx {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Returns the right edge coordinate (x + width).
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Returns the bottom edge coordinate (y + height).
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// A 2D size in pixel units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SizePx {
    pub width: u32,
    pub height: u32,
}

impl SizePx {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Largest size with this aspect ratio that fits inside `bounds`.
    ///
    /// Never returns a zero dimension for a non-empty input.
    pub fn fit_within(&self, bounds: SizePx) -> SizePx {
        if self.width == 0 || self.height == 0 {
            return SizePx::default();
        }
        let scale = f64::min(
            bounds.width as f64 / self.width as f64,
            bounds.height as f64 / self.height as f64,
        );
        SizePx::new(
            ((self.width as f64 * scale).round() as u32).clamp(1, bounds.width.max(1)),
            ((self.height as f64 * scale).round() as u32).clamp(1, bounds.height.max(1)),
        )
    }
}

// ============================================================================
// IconSet
// ============================================================================

/// One rendered PNG inside an iconset directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconFile {
    pub size: SizeName,
    pub path: PathBuf,
}

/// A directory of rendered `icon_<size>.png` files.
///
/// Files are kept in canonical [`SizeName`] order regardless of the order in
/// which they were produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconSet {
    dir: PathBuf,
    files: Vec<IconFile>,
}

impl IconSet {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a given size is written to inside this set.
    pub fn path_for(&self, size: SizeName) -> PathBuf {
        self.dir.join(size.file_name())
    }

    /// Records a rendered file, replacing any previous entry for the same size.
    pub fn insert(&mut self, size: SizeName, path: PathBuf) {
        match self.files.binary_search_by_key(&size, |f| f.size) {
            Ok(i) => self.files[i].path = path,
            Err(i) => self.files.insert(i, IconFile { size, path }),
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// True when every one of the ten sizes is present.
    pub fn is_complete(&self) -> bool {
        self.files.len() == SizeName::ALL.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IconFile> {
        self.files.iter()
    }
}

impl<'a> IntoIterator for &'a IconSet {
    type Item = &'a IconFile;
    type IntoIter = std::slice::Iter<'a, IconFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}
