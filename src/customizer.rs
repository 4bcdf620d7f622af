//! End-to-end folder icon generation.
//!
//! [`FolderCustomizer`] ties the pieces together: it loads and validates the
//! mask, runs the [`Orchestrator`] in a scoped working directory, packages
//! the result, applies it to the target, and keeps the mask cache in sync.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::cache::CacheStore;
use crate::collaborators::{Finder, IconApplier, Packager, Revealer};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::icon::IconSet;
use crate::mask::Mask;
use crate::pipeline::{Orchestrator, WorkerPool};
use crate::style::StyleEpoch;

// ============================================================================
// OutputRequest
// ============================================================================

/// Where a generation run should leave its results.
///
/// Everything is rendered and packaged in a scoped working directory first;
/// outputs are copied to the places below only after the whole run succeeds.
///
/// | target | explicit outputs | iconset / icns published to                      |
/// |--------|------------------|--------------------------------------------------|
/// | none   | none             | `<mask stem>.iconset` / `.icns` next to the mask |
/// | any    | some             | only the explicit paths                          |
/// | given  | none             | nowhere (discarded after applying)               |
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputRequest {
    /// File or folder whose icon should be set.
    pub target: Option<PathBuf>,
    pub output_iconset: Option<PathBuf>,
    pub output_icns: Option<PathBuf>,
}

impl OutputRequest {
    pub fn for_target(target: impl Into<PathBuf>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::default()
        }
    }

    /// Final destinations of the iconset and icns, if they are kept at all.
    fn resolve(&self, mask: &Path) -> (Option<PathBuf>, Option<PathBuf>) {
        let beside_mask =
            self.target.is_none() && self.output_iconset.is_none() && self.output_icns.is_none();
        if beside_mask {
            return (
                Some(mask.with_extension("iconset")),
                Some(mask.with_extension("icns")),
            );
        }
        (self.output_iconset.clone(), self.output_icns.clone())
    }
}

/// Paths that outlive a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generated {
    pub iconset: Option<PathBuf>,
    pub icns: Option<PathBuf>,
    pub target: Option<PathBuf>,
}

// ============================================================================
// RestoreReport
// ============================================================================

/// Outcome of [`FolderCustomizer::restore_all`].
#[derive(Debug, Default)]
pub struct RestoreReport {
    pub restored: Vec<PathBuf>,
    /// Entries that could not be restored, with the reason.
    pub skipped: Vec<(PathBuf, Error)>,
}

impl RestoreReport {
    /// True if any entry failed for a reason other than a missing target or entry.
    pub fn has_failures(&self) -> bool {
        self.skipped
            .iter()
            .any(|(_, e)| !matches!(e, Error::StaleTarget { .. } | Error::CacheMiss { .. }))
    }
}

// ============================================================================
// FolderCustomizer
// ============================================================================

/// Generates folder icons from masks and applies them.
///
/// # Example
///
/// ```no_run
/// use folderify::{Config, FolderCustomizer, OutputRequest, StyleEpoch};
///
/// let config = Config::default();
/// let customizer = FolderCustomizer::new(&config, StyleEpoch::BigSur).remember_masks(true);
/// customizer.generate("star.png".as_ref(), &OutputRequest::for_target("/Users/me/Projects"))?;
/// # Ok::<(), folderify::Error>(())
/// ```
pub struct FolderCustomizer {
    orchestrator: Orchestrator,
    cache: CacheStore,
    packager: Box<dyn Packager>,
    applier: Box<dyn IconApplier>,
    revealer: Box<dyn Revealer>,
    remember: bool,
    reveal: bool,
}

impl FolderCustomizer {
    pub fn new(config: &Config, epoch: StyleEpoch) -> Self {
        let orchestrator = Orchestrator::new(epoch, &config.templates_root)
            .trim(!config.no_trim)
            .workers(WorkerPool::new(config.workers))
            .keep_intermediates(config.intermediates_dir.clone());
        Self {
            orchestrator,
            cache: CacheStore::new(&config.cache_root),
            packager: config.packager.packager(),
            applier: Box::new(config.set_icon_using),
            revealer: Box::new(Finder),
            remember: false,
            reveal: false,
        }
    }

    pub fn with_packager(mut self, packager: impl Packager + 'static) -> Self {
        self.packager = Box::new(packager);
        self
    }

    pub fn with_applier(mut self, applier: impl IconApplier + 'static) -> Self {
        self.applier = Box::new(applier);
        self
    }

    pub fn with_revealer(mut self, revealer: impl Revealer + 'static) -> Self {
        self.revealer = Box::new(revealer);
        self
    }

    /// Store the mask in the cache whenever a target is set.
    pub fn remember_masks(mut self, remember: bool) -> Self {
        self.remember = remember;
        self
    }

    /// Reveal the result in the file browser after each run.
    pub fn reveal(mut self, reveal: bool) -> Self {
        self.reveal = reveal;
        self
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn epoch(&self) -> StyleEpoch {
        self.orchestrator.epoch()
    }

    /// Synthesizes, packages and (if a target is given) applies an icon.
    pub fn generate(&self, mask: &Path, request: &OutputRequest) -> Result<Generated> {
        let generated = self.run(mask, request)?;
        if self.remember {
            if let Some(target) = &request.target {
                self.cache.remember(target, mask)?;
            }
        }
        Ok(generated)
    }

    /// Stores `mask` for `target` without generating anything.
    pub fn remember(&self, target: &Path, mask: &Path) -> Result<PathBuf> {
        Mask::load(mask)?;
        self.cache.remember(target, mask)
    }

    /// Regenerates and re-applies the icon for `target` from its cached mask.
    pub fn restore(&self, target: &Path) -> Result<Generated> {
        let entry = self.cache.lookup(target)?;
        if !target.exists() {
            return Err(Error::StaleTarget {
                target: target.to_path_buf(),
            });
        }
        info!(target = %target.display(), "restoring from cache");
        self.run(&entry, &OutputRequest::for_target(target))
    }

    /// Restores every cached target, continuing past individual failures.
    pub fn restore_all(&self) -> RestoreReport {
        let mut report = RestoreReport::default();
        for entry in self.cache.list_all() {
            let target = match entry {
                Ok(target) => target,
                Err(e) => {
                    warn!(error = %e, "could not read cache entry");
                    report.skipped.push((self.cache.root().to_path_buf(), e));
                    continue;
                }
            };
            match self.restore(&target) {
                Ok(_) => report.restored.push(target),
                Err(e) => {
                    warn!(target = %target.display(), error = %e, "skipping cache entry");
                    report.skipped.push((target, e));
                }
            }
        }
        info!(
            restored = report.restored.len(),
            skipped = report.skipped.len(),
            "restore finished"
        );
        report
    }

    fn run(&self, mask_path: &Path, request: &OutputRequest) -> Result<Generated> {
        if let Some(target) = &request.target {
            if !target.exists() {
                return Err(Error::input(target, "target does not exist"));
            }
        }
        let mask = Mask::load(mask_path)?;
        let (iconset_dest, icns_dest) = request.resolve(mask.path());

        // Removed on drop, whichever way this function returns.
        let work = tempfile::Builder::new()
            .prefix("folderify-")
            .tempdir()
            .map_err(|e| Error::io(std::env::temp_dir(), e))?;
        let stem = mask_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "icon".to_string());
        let staged_icns = work.path().join(format!("{stem}.icns"));

        let iconset = self.orchestrator.synthesize_and_package(
            &mask,
            &work.path().join(format!("{stem}.iconset")),
            &staged_icns,
            self.packager.as_ref(),
        )?;

        if let Some(target) = &request.target {
            self.applier.apply(&staged_icns, target)?;
            info!(target = %target.display(), "icon set");
        }

        if let Some(dest) = &iconset_dest {
            publish_iconset(&iconset, dest)?;
        }
        if let Some(dest) = &icns_dest {
            publish_file(&staged_icns, dest)?;
        }

        let generated = Generated {
            iconset: iconset_dest,
            icns: icns_dest,
            target: request.target.clone(),
        };

        if self.reveal {
            let shown = generated
                .target
                .as_ref()
                .or(generated.icns.as_ref())
                .or(generated.iconset.as_ref());
            if let Some(path) = shown {
                self.revealer.reveal(path);
            }
        }

        Ok(generated)
    }
}

/// Copies every rendered size into `dest`, creating it if needed.
fn publish_iconset(iconset: &IconSet, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest).map_err(|e| Error::io(dest, e))?;
    let published = IconSet::new(dest);
    for file in iconset {
        let to = published.path_for(file.size);
        std::fs::copy(&file.path, &to).map_err(|e| Error::io(&to, e))?;
    }
    info!(iconset = %dest.display(), "wrote iconset");
    Ok(())
}

fn publish_file(src: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    std::fs::copy(src, dest).map_err(|e| Error::io(dest, e))?;
    info!(icns = %dest.display(), "wrote icns");
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::tests::{RecordingApplier, RecordingPackager, RecordingRevealer};
    use crate::collaborators::NativeIcns;
    use crate::pipeline::tests::{star_mask, write_templates};
    use crate::style::SizeName;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        config: Config,
        applier: RecordingApplier,
        revealer: RecordingRevealer,
    }

    impl Fixture {
        fn new(epoch: StyleEpoch) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let templates = dir.path().join("templates");
            write_templates(&templates, epoch);
            star_mask().save(dir.path().join("star.png")).unwrap();

            let config = Config {
                cache_root: dir.path().join("cache"),
                templates_root: templates,
                workers: Some(2),
                ..Config::default()
            };
            Self {
                dir,
                config,
                applier: RecordingApplier::default(),
                revealer: RecordingRevealer::default(),
            }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn customizer(&self, epoch: StyleEpoch) -> FolderCustomizer {
            FolderCustomizer::new(&self.config, epoch)
                .with_packager(RecordingPackager::default())
                .with_applier(self.applier.clone())
                .with_revealer(self.revealer.clone())
        }

        fn target(&self, name: &str) -> PathBuf {
            let path = self.path(name);
            std::fs::create_dir_all(&path).unwrap();
            path
        }
    }

    #[test]
    fn untargeted_run_writes_next_to_mask() {
        let fx = Fixture::new(StyleEpoch::Yosemite);
        let customizer = FolderCustomizer::new(&fx.config, StyleEpoch::Yosemite)
            .with_packager(NativeIcns)
            .with_applier(fx.applier.clone());

        let generated = customizer
            .generate(&fx.path("star.png"), &OutputRequest::default())
            .unwrap();

        let iconset = fx.path("star.iconset");
        assert_eq!(generated.iconset.as_deref(), Some(iconset.as_path()));
        assert_eq!(generated.icns, Some(fx.path("star.icns")));
        assert!(fx.path("star.icns").is_file());
        let pngs = std::fs::read_dir(&iconset)
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .path()
                    .extension()
                    .is_some_and(|x| x == "png")
            })
            .count();
        assert_eq!(pngs, 10);
        for size in SizeName::ALL {
            assert!(iconset.join(size.file_name()).is_file(), "{size}");
        }
        assert!(fx.applier.calls().is_empty());
    }

    #[test]
    fn targeted_run_applies_and_cleans_up() {
        let fx = Fixture::new(StyleEpoch::BigSur);
        let target = fx.target("Projects");

        let generated = fx
            .customizer(StyleEpoch::BigSur)
            .reveal(true)
            .generate(&fx.path("star.png"), &OutputRequest::for_target(&target))
            .unwrap();

        assert_eq!(generated.iconset, None);
        assert_eq!(generated.icns, None);
        let calls = fx.applier.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, target);
        // The working directory is gone once the run returns.
        assert!(!calls[0].0.exists());
        assert!(!fx.path("star.iconset").exists());
        assert_eq!(fx.revealer.revealed(), vec![target]);
    }

    #[test]
    fn explicit_outputs_survive_with_target() {
        let fx = Fixture::new(StyleEpoch::BigSur);
        let target = fx.target("Docs");
        let request = OutputRequest {
            target: Some(target.clone()),
            output_iconset: Some(fx.path("out/docs.iconset")),
            output_icns: None,
        };

        let generated = fx
            .customizer(StyleEpoch::BigSur)
            .generate(&fx.path("star.png"), &request)
            .unwrap();

        assert_eq!(generated.iconset, Some(fx.path("out/docs.iconset")));
        assert_eq!(generated.icns, None);
        assert!(fx.path("out/docs.iconset/icon_512x512@2x.png").is_file());
    }

    #[test]
    fn missing_target_is_input_error() {
        let fx = Fixture::new(StyleEpoch::BigSur);
        let err = fx
            .customizer(StyleEpoch::BigSur)
            .generate(&fx.path("star.png"), &OutputRequest::for_target(fx.path("nope")))
            .unwrap_err();
        assert!(matches!(err, Error::Input { .. }), "{err}");
        assert!(fx.applier.calls().is_empty());
    }

    #[test]
    fn missing_mask_is_input_error() {
        let fx = Fixture::new(StyleEpoch::BigSur);
        let err = fx
            .customizer(StyleEpoch::BigSur)
            .generate(&fx.path("absent.png"), &OutputRequest::default())
            .unwrap_err();
        assert!(matches!(err, Error::Input { .. }), "{err}");
    }

    #[test]
    fn remembered_mask_restores_target() {
        let fx = Fixture::new(StyleEpoch::BigSur);
        let target = fx.target("Music");
        let customizer = fx.customizer(StyleEpoch::BigSur).remember_masks(true);

        customizer
            .generate(&fx.path("star.png"), &OutputRequest::for_target(&target))
            .unwrap();
        let entry = customizer.cache().lookup(&target).unwrap();
        assert_eq!(
            std::fs::read(entry).unwrap(),
            std::fs::read(fx.path("star.png")).unwrap()
        );

        customizer.restore(&target).unwrap();
        let calls = fx.applier.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(_, t)| *t == target));
    }

    #[test]
    fn restore_without_entry_or_target() {
        let fx = Fixture::new(StyleEpoch::BigSur);
        let customizer = fx.customizer(StyleEpoch::BigSur);

        let target = fx.target("Pictures");
        assert!(matches!(customizer.restore(&target), Err(Error::CacheMiss { .. })));

        let gone = fx.path("Gone");
        customizer.remember(&gone, &fx.path("star.png")).unwrap();
        assert!(matches!(customizer.restore(&gone), Err(Error::StaleTarget { .. })));
    }

    #[test]
    fn restore_all_skips_stale_entries() {
        let fx = Fixture::new(StyleEpoch::BigSur);
        let customizer = fx.customizer(StyleEpoch::BigSur);
        let live = fx.target("Live");
        let gone = fx.path("Gone");
        customizer.remember(&live, &fx.path("star.png")).unwrap();
        customizer.remember(&gone, &fx.path("star.png")).unwrap();

        let report = customizer.restore_all();

        assert_eq!(report.restored, vec![live.clone()]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].0, gone);
        assert!(matches!(report.skipped[0].1, Error::StaleTarget { .. }));
        assert!(!report.has_failures());
        assert_eq!(fx.applier.calls().len(), 1);
    }

    #[test]
    fn failed_run_publishes_nothing() {
        let fx = Fixture::new(StyleEpoch::Yosemite);
        std::fs::remove_file(
            fx.config
                .templates_root
                .join(StyleEpoch::Yosemite.template_dir_name())
                .join("icon_512x512@2x.png"),
        )
        .unwrap();
        let customizer = FolderCustomizer::new(&fx.config, StyleEpoch::Yosemite)
            .with_packager(NativeIcns)
            .with_applier(fx.applier.clone());

        let err = customizer
            .generate(&fx.path("star.png"), &OutputRequest::default())
            .unwrap_err();

        assert!(err.failed_sizes().contains(&SizeName::S512x2), "{err}");
        assert!(!fx.path("star.iconset").exists());
        assert!(!fx.path("star.icns").exists());
    }

    #[test]
    fn failed_apply_publishes_nothing() {
        let fx = Fixture::new(StyleEpoch::BigSur);
        let target = fx.target("Locked");
        let request = OutputRequest {
            target: Some(target),
            output_iconset: Some(fx.path("out/locked.iconset")),
            output_icns: Some(fx.path("out/locked.icns")),
        };

        let err = fx
            .customizer(StyleEpoch::BigSur)
            .with_applier(RecordingApplier::failing())
            .generate(&fx.path("star.png"), &request)
            .unwrap_err();

        assert!(matches!(err, Error::ToolFailed { .. }), "{err}");
        assert!(!fx.path("out").exists());
    }

    #[test]
    fn output_resolution_table() {
        let mask = Path::new("/m/star.png");

        let beside = OutputRequest::default().resolve(mask);
        assert_eq!(
            beside,
            (Some(PathBuf::from("/m/star.iconset")), Some(PathBuf::from("/m/star.icns")))
        );

        let only_icns = OutputRequest {
            output_icns: Some(PathBuf::from("/o/x.icns")),
            ..OutputRequest::default()
        }
        .resolve(mask);
        assert_eq!(only_icns, (None, Some(PathBuf::from("/o/x.icns"))));

        let targeted = OutputRequest::for_target("/t").resolve(mask);
        assert_eq!(targeted, (None, None));
    }
}
