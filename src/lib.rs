//! folderify: macOS-style folder icons from a mask image
//!
//! This crate turns a silhouette (PNG or SVG with transparency) into a
//! complete folder icon set. The mask is engraved into the generic folder
//! template of a chosen macOS style, packaged as `.icns`, and optionally
//! attached to a folder. Masks can be remembered per folder and re-applied
//! later from the cache.
//!
//! # Example
//!
//! ```no_run
//! use folderify::{Config, FolderCustomizer, OutputRequest, StyleEpoch};
//!
//! let config = Config::default();
//! let customizer = FolderCustomizer::new(&config, StyleEpoch::BigSur);
//!
//! // No target and no explicit outputs: star.iconset and star.icns land next to the mask.
//! let generated = customizer.generate("star.png".as_ref(), &OutputRequest::default())?;
//! assert!(generated.icns.is_some());
//! # Ok::<(), folderify::Error>(())
//! ```
//!
//! # Lower-level rendering
//!
//! [`Orchestrator`] renders an [`IconSet`] without packaging or applying it:
//!
//! ```no_run
//! use folderify::{Mask, Orchestrator, StyleEpoch, WorkerPool};
//!
//! let mask = Mask::load("star.svg")?;
//! let set = Orchestrator::new(StyleEpoch::Yosemite, "/opt/folderify/templates")
//!     .workers(WorkerPool::new(Some(4)))
//!     .synthesize(&mask, "star.iconset".as_ref())?;
//! assert!(set.is_complete());
//! # Ok::<(), folderify::Error>(())
//! ```

mod cache;
mod collaborators;
mod config;
mod customizer;
mod error;
mod icon;
mod layer;
mod mask;
mod pipeline;
mod style;

pub use cache::{CacheStore, Entries};
pub use collaborators::{
    Finder, IconApplier, Iconutil, NativeIcns, Packager, PackagerKind, Revealer, SetIconUsing,
    system_color_scheme, system_macos_version,
};
pub use config::{Config, DEBUG_ENV, TEMPLATES_ENV};
pub use customizer::{FolderCustomizer, Generated, OutputRequest, RestoreReport};
pub use error::{Error, RenderError, Result, SizeFailure};
pub use icon::{IconFile, IconSet, RectPx, SizePx};
pub use layer::primitives::CompositeMode;
pub use layer::{
    Compositor, FillLayer, LayerEffect, RenderContext, STENCIL_STEP, ShadowLayer, Trace,
    render_size, render_size_traced, sized_stencil,
};
pub use mask::{Mask, PreparedMask, SVG_RASTER_SIZE};
pub use pipeline::{Orchestrator, WorkerPool};
pub use style::{
    ColorScheme, LayerRole, Recipe, SchemePreference, ShadowSpec, SizeName, SizeSpec, StyleEpoch,
};
