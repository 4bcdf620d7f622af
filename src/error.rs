//! Error types shared across the crate.

use std::fmt;
use std::path::PathBuf;

use crate::style::SizeName;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The mask or target path is missing or unusable. No work was attempted.
    #[error("invalid input {}: {reason}", path.display())]
    Input { path: PathBuf, reason: String },

    /// An external program could not be started.
    #[error("`{tool}` could not be run; is it installed and on PATH?")]
    ToolUnavailable {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// An external program ran but reported failure.
    #[error("`{tool}` failed ({status}): {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    /// One or more size units failed to render.
    #[error("rendering failed for {}", SizeFailures(failures))]
    Render { failures: Vec<SizeFailure> },

    /// No cache entry exists for the target.
    #[error("no cached mask for {}", target.display())]
    CacheMiss { target: PathBuf },

    /// A cache entry exists but its target is gone.
    #[error("target no longer exists: {}", target.display())]
    StaleTarget { target: PathBuf },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("unknown folder style `{0}`")]
    InvalidStyle(String),

    #[error("cannot start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn input(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Input {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Size names of the failed units, when this is a render failure.
    pub fn failed_sizes(&self) -> Vec<SizeName> {
        match self {
            Self::Render { failures } => failures.iter().map(|f| f.size).collect(),
            _ => Vec::new(),
        }
    }
}

/// Failure of a single size unit.
#[derive(Debug, thiserror::Error)]
#[error("{size}: {error}")]
pub struct SizeFailure {
    pub size: SizeName,
    #[source]
    pub error: RenderError,
}

/// Why a single size unit did not produce its output.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("template {} is missing", path.display())]
    TemplateMissing { path: PathBuf },

    #[error("template {} is {actual}px, expected {expected}px", path.display())]
    TemplateSize {
        path: PathBuf,
        expected: u32,
        actual: u32,
    },

    #[error("{}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Not started because a sibling unit had already failed.
    #[error("cancelled after an earlier failure")]
    Cancelled,
}

struct SizeFailures<'a>(&'a [SizeFailure]);

impl fmt::Display for SizeFailures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_error_lists_every_failed_size() {
        let err = Error::Render {
            failures: vec![
                SizeFailure {
                    size: SizeName::S256,
                    error: RenderError::TemplateMissing {
                        path: PathBuf::from("/t/icon_256x256.png"),
                    },
                },
                SizeFailure {
                    size: SizeName::S512x2,
                    error: RenderError::Cancelled,
                },
            ],
        };

        let message = err.to_string();
        assert!(message.contains("256x256:"));
        assert!(message.contains("512x512@2x: cancelled"));
        assert_eq!(err.failed_sizes(), vec![SizeName::S256, SizeName::S512x2]);
    }
}
