//! Serializable runtime configuration.
//!
//! Every field has a default, so a config file only needs the keys it wants
//! to change:
//!
//! ```json
//! { "cacheRoot": "/tmp/masks", "workers": 4, "setIconUsing": "fileicon" }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::collaborators::{PackagerKind, SetIconUsing};
use crate::error::{Error, Result};

/// Environment variable overriding the default templates location.
pub const TEMPLATES_ENV: &str = "FOLDERIFY_TEMPLATES";

/// Set to `1` to log verbosely and keep every intermediate image.
pub const DEBUG_ENV: &str = "FOLDERIFY_DEBUG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Root directory of the mask cache.
    pub cache_root: PathBuf,

    /// Directory containing one `GenericFolderIcon.<style>.iconset` per style.
    pub templates_root: PathBuf,

    /// Worker threads; `None` uses available parallelism.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Skip trimming transparent margins from the mask.
    pub no_trim: bool,

    pub set_icon_using: SetIconUsing,

    pub packager: PackagerKind,

    /// Where to keep the numbered intermediate images of every size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intermediates_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_root: default_cache_root(),
            templates_root: default_templates_root(),
            workers: None,
            no_trim: false,
            set_icon_using: SetIconUsing::default(),
            packager: PackagerKind::default(),
            intermediates_dir: None,
        }
    }
}

fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("folderify").join("masks"))
        .unwrap_or_else(|| PathBuf::from(".folderify-cache"))
}

fn default_templates_root() -> PathBuf {
    if let Some(dir) = std::env::var_os(TEMPLATES_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .map(|dir| dir.join("folderify").join("templates"))
        .unwrap_or_else(|| PathBuf::from("templates"))
}

impl Config {
    /// Reads a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Ok(Self::from_json(&json)?)
    }

    /// Loads `path` if given, otherwise returns the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
