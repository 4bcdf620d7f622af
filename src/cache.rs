//! On-disk store of masks keyed by the target they were applied to.
//!
//! A target `/Users/x/Projects` is stored as
//! `<root>/Users/x/Projects.mask`, so the location can be turned back into
//! the target path by stripping the root and the suffix.

use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};

const SUFFIX: &str = ".mask";
const EXTENSION: &str = "mask";

/// Mask cache rooted at one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the mask for `target` lives (whether or not it exists yet).
    pub fn entry_path(&self, target: &Path) -> Result<PathBuf> {
        let absolute = absolute(target)?;
        let relative: PathBuf = absolute
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect();

        if relative.as_os_str().is_empty() {
            return Ok(self.root.join(SUFFIX));
        }
        let mut stored: OsString = self.root.join(relative).into_os_string();
        stored.push(SUFFIX);
        Ok(PathBuf::from(stored))
    }

    /// Inverse of [`entry_path`](Self::entry_path). `None` for paths outside
    /// the store or without the suffix. Works on `OsStr` throughout, so
    /// targets that are not valid UTF-8 survive the round trip.
    pub fn target_for(&self, entry: &Path) -> Option<PathBuf> {
        let relative = entry.strip_prefix(&self.root).ok()?;
        if relative.as_os_str() == SUFFIX {
            return Some(PathBuf::from("/"));
        }
        if relative.extension()? != EXTENSION {
            return None;
        }
        let mut target = PathBuf::from("/");
        target.push(relative.parent()?);
        target.push(relative.file_stem()?);
        Some(target)
    }

    /// Copies `mask` into the store for `target`, replacing any earlier entry.
    pub fn remember(&self, target: &Path, mask: &Path) -> Result<PathBuf> {
        let entry = self.entry_path(target)?;
        if let Some(parent) = entry.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        fs::copy(mask, &entry).map_err(|e| Error::io(mask, e))?;
        info!(target = %target.display(), entry = %entry.display(), "remembered mask");
        Ok(entry)
    }

    /// Location of the stored mask for `target`.
    pub fn lookup(&self, target: &Path) -> Result<PathBuf> {
        let entry = self.entry_path(target)?;
        if entry.is_file() {
            Ok(entry)
        } else {
            Err(Error::CacheMiss {
                target: target.to_path_buf(),
            })
        }
    }

    /// Deletes the stored mask for `target`, pruning directories left empty.
    pub fn remove(&self, target: &Path) -> Result<()> {
        let entry = self.lookup(target)?;
        fs::remove_file(&entry).map_err(|e| Error::io(&entry, e))?;

        let mut dir = entry.parent();
        while let Some(d) = dir {
            if d == self.root || !d.starts_with(&self.root) {
                break;
            }
            // Stops at the first directory that still has entries.
            if fs::remove_dir(d).is_err() {
                break;
            }
            dir = d.parent();
        }

        debug!(target = %target.display(), "removed cache entry");
        Ok(())
    }

    /// Every target with a stored mask. Each call walks the store afresh.
    pub fn list_all(&self) -> Entries<'_> {
        let stack = match fs::read_dir(&self.root) {
            Ok(dir) => vec![dir],
            Err(_) => Vec::new(),
        };
        Entries { store: self, stack }
    }
}

/// Lazy walk over a [`CacheStore`], yielding target paths.
pub struct Entries<'a> {
    store: &'a CacheStore,
    stack: Vec<fs::ReadDir>,
}

impl Iterator for Entries<'_> {
    type Item = Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let dir = self.stack.last_mut()?;
            let entry = match dir.next() {
                None => {
                    self.stack.pop();
                    continue;
                }
                Some(Err(e)) => return Some(Err(Error::io(self.store.root(), e))),
                Some(Ok(entry)) => entry,
            };

            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(t) => t,
                Err(e) => return Some(Err(Error::io(path, e))),
            };

            if file_type.is_dir() {
                match fs::read_dir(&path) {
                    Ok(sub) => self.stack.push(sub),
                    Err(e) => return Some(Err(Error::io(path, e))),
                }
            } else if let Some(target) = self.store.target_for(&path) {
                return Some(Ok(target));
            }
        }
    }
}

/// Absolute, lexically normalized form of `path`.
fn absolute(path: &Path) -> Result<PathBuf> {
    let joined = std::path::absolute(path).map_err(|e| Error::io(path, e))?;
    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    Ok(normalized)
}
