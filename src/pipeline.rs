//! Parallel synthesis of a full iconset.
//!
//! [`Orchestrator::synthesize`] fans one render unit per size out over a
//! [`WorkerPool`], waits for all of them, and either returns a complete
//! [`IconSet`] or a single [`Error::Render`] naming every failed size.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use image::{ImageFormat, RgbaImage};
use rayon::prelude::*;
use tracing::{debug, info, info_span, warn};

use crate::collaborators::Packager;
use crate::error::{Error, RenderError, Result, SizeFailure};
use crate::icon::IconSet;
use crate::layer;
use crate::mask::{Mask, PreparedMask};
use crate::style::{Recipe, SizeName, SizeSpec, StyleEpoch};

// ============================================================================
// WorkerPool
// ============================================================================

/// Size of the thread pool one synthesis call runs on.
///
/// The pool itself is built inside [`Orchestrator::synthesize`] and dropped
/// when the call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPool {
    threads: usize,
}

impl WorkerPool {
    /// `None` or `Some(0)` uses the machine's available parallelism.
    pub fn new(workers: Option<usize>) -> Self {
        let threads = match workers {
            Some(n) if n > 0 => n,
            _ => std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        };
        Self { threads }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    fn build(&self) -> Result<rayon::ThreadPool> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .thread_name(|i| format!("folderify-render-{i}"))
            .build()?;
        Ok(pool)
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(None)
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Renders every size of one style epoch from one mask.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    epoch: StyleEpoch,
    templates_root: PathBuf,
    trim: bool,
    pool: WorkerPool,
    intermediates: Option<PathBuf>,
}

impl Orchestrator {
    pub fn new(epoch: StyleEpoch, templates_root: impl Into<PathBuf>) -> Self {
        Self {
            epoch,
            templates_root: templates_root.into(),
            trim: true,
            pool: WorkerPool::default(),
            intermediates: None,
        }
    }

    /// Disables or enables the trim step.
    pub fn trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    pub fn workers(mut self, pool: WorkerPool) -> Self {
        self.pool = pool;
        self
    }

    /// Also writes every numbered intermediate of every size into `dir`, as
    /// `<size>_<step>.png`.
    pub fn keep_intermediates(mut self, dir: Option<PathBuf>) -> Self {
        self.intermediates = dir;
        self
    }

    pub fn epoch(&self) -> StyleEpoch {
        self.epoch
    }

    /// Directory holding this epoch's base template PNGs.
    pub fn template_dir(&self) -> PathBuf {
        self.templates_root.join(self.epoch.template_dir_name())
    }

    /// Renders all ten sizes into `iconset_dir`.
    ///
    /// Units run concurrently and may finish in any order. After the first
    /// failure, units that have not started yet are skipped and reported as
    /// [`RenderError::Cancelled`]. Files written by successful siblings are
    /// left in place; a failed unit never leaves a partial PNG behind.
    pub fn synthesize(&self, mask: &Mask, iconset_dir: &Path) -> Result<IconSet> {
        std::fs::create_dir_all(iconset_dir).map_err(|e| Error::io(iconset_dir, e))?;
        if let Some(dir) = &self.intermediates {
            std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
            info!(dir = %dir.display(), "keeping intermediate images");
        }

        let prepared = mask.prepare(self.trim, self.epoch.centering_box());
        let recipe = self.epoch.recipe();
        let specs = self.epoch.sizes();
        let template_dir = self.template_dir();
        let failed = AtomicBool::new(false);
        let mut iconset = IconSet::new(iconset_dir);

        info!(
            epoch = %self.epoch,
            workers = self.pool.threads(),
            output = %iconset_dir.display(),
            "synthesizing iconset"
        );

        let pool = self.pool.build()?;
        let results: Vec<(SizeName, std::result::Result<PathBuf, RenderError>)> =
            pool.install(|| {
                specs
                    .par_iter()
                    .map(|spec| {
                        let _span = info_span!("size", name = %spec.name).entered();
                        if failed.load(Ordering::Acquire) {
                            debug!("skipped after earlier failure");
                            return (spec.name, Err(RenderError::Cancelled));
                        }
                        let unit = Unit {
                            prepared: &prepared,
                            recipe: &recipe,
                            spec,
                            template_dir: &template_dir,
                            intermediates: self.intermediates.as_deref(),
                        };
                        let result = unit.run(&iconset.path_for(spec.name));
                        if result.is_err() {
                            failed.store(true, Ordering::Release);
                        }
                        (spec.name, result)
                    })
                    .collect()
            });

        let mut failures = Vec::new();
        for (size, result) in results {
            match result {
                Ok(path) => iconset.insert(size, path),
                Err(error) => failures.push(SizeFailure { size, error }),
            }
        }

        if !failures.is_empty() {
            return Err(Error::Render { failures });
        }
        info!(sizes = iconset.len(), "iconset complete");
        Ok(iconset)
    }

    /// Synthesizes, then hands the finished iconset to `packager`.
    ///
    /// The packager is never called unless every size rendered.
    pub fn synthesize_and_package(
        &self,
        mask: &Mask,
        iconset_dir: &Path,
        icns: &Path,
        packager: &dyn Packager,
    ) -> Result<IconSet> {
        let iconset = self.synthesize(mask, iconset_dir)?;
        info!(icns = %icns.display(), packager = packager.name(), "packaging");
        packager.package(&iconset, icns)?;
        Ok(iconset)
    }
}

// ============================================================================
// Render unit
// ============================================================================

/// Everything one size needs, all borrowed read-only.
struct Unit<'a> {
    prepared: &'a PreparedMask,
    recipe: &'a Recipe,
    spec: &'a SizeSpec,
    template_dir: &'a Path,
    intermediates: Option<&'a Path>,
}

impl Unit<'_> {
    fn run(&self, output: &Path) -> std::result::Result<PathBuf, RenderError> {
        let template = self.load_template()?;
        let image = match self.intermediates {
            Some(dir) => layer::render_size_traced(
                template,
                self.prepared.image(),
                self.recipe,
                self.spec,
                &mut |step, image| self.write_intermediate(dir, step, image),
            ),
            None => layer::render_size(template, self.prepared.image(), self.recipe, self.spec),
        };
        self.write_output(&image, output)?;
        debug!(output = %output.display(), "wrote size");
        Ok(output.to_path_buf())
    }

    /// Encodes next to `output` and renames into place once complete.
    fn write_output(
        &self,
        image: &RgbaImage,
        output: &Path,
    ) -> std::result::Result<(), RenderError> {
        let partial = output.with_extension("png.partial");
        let written = image
            .save_with_format(&partial, ImageFormat::Png)
            .map_err(|source| RenderError::Image {
                path: output.to_path_buf(),
                source,
            })
            .and_then(|()| {
                std::fs::rename(&partial, output).map_err(|source| RenderError::Io {
                    path: output.to_path_buf(),
                    source,
                })
            });
        if written.is_err() {
            let _ = std::fs::remove_file(&partial);
        }
        written
    }

    fn write_intermediate(&self, dir: &Path, step: &str, image: &RgbaImage) {
        let path = dir.join(format!("{}_{step}.png", self.spec.name));
        if let Err(e) = image.save_with_format(&path, ImageFormat::Png) {
            warn!(path = %path.display(), error = %e, "cannot write intermediate image");
        }
    }

    fn load_template(&self) -> std::result::Result<RgbaImage, RenderError> {
        let path = self.template_dir.join(self.spec.name.file_name());
        if !path.is_file() {
            return Err(RenderError::TemplateMissing { path });
        }
        let template = image::open(&path)
            .map_err(|source| RenderError::Image {
                path: path.clone(),
                source,
            })?
            .into_rgba8();

        let expected = self.spec.canvas();
        if template.dimensions() != (expected, expected) {
            return Err(RenderError::TemplateSize {
                path,
                expected,
                actual: template.width(),
            });
        }
        Ok(template)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::collaborators::tests::RecordingPackager;
    use image::Rgba;

    /// Writes a plain template set for `epoch` under `root`.
    pub(crate) fn write_templates(root: &Path, epoch: StyleEpoch) {
        let dir = root.join(epoch.template_dir_name());
        std::fs::create_dir_all(&dir).unwrap();
        for size in SizeName::ALL {
            let px = size.pixels();
            RgbaImage::from_pixel(px, px, Rgba([120, 180, 230, 255]))
                .save(dir.join(size.file_name()))
                .unwrap();
        }
    }

    /// A 512x512 five-pointed star on a transparent background.
    pub(crate) fn star_mask() -> RgbaImage {
        let points: Vec<(f32, f32)> = (0..10)
            .map(|i| {
                let angle = std::f32::consts::PI * (i as f32) / 5.0 - std::f32::consts::FRAC_PI_2;
                let r = if i % 2 == 0 { 230.0 } else { 95.0 };
                (256.0 + r * angle.cos(), 256.0 + r * angle.sin())
            })
            .collect();
        RgbaImage::from_fn(512, 512, |x, y| {
            if inside_polygon(&points, x as f32 + 0.5, y as f32 + 0.5) {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        })
    }

    fn inside_polygon(points: &[(f32, f32)], x: f32, y: f32) -> bool {
        let mut inside = false;
        let mut j = points.len() - 1;
        for i in 0..points.len() {
            let (xi, yi) = points[i];
            let (xj, yj) = points[j];
            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    fn star() -> Mask {
        Mask::from_image("star.png", star_mask()).unwrap()
    }

    #[test]
    fn renders_every_size_at_canvas_dimensions() {
        for epoch in StyleEpoch::ALL {
            let templates = tempfile::tempdir().unwrap();
            let out = tempfile::tempdir().unwrap();
            write_templates(templates.path(), epoch);

            let iconset = Orchestrator::new(epoch, templates.path())
                .synthesize(&star(), out.path())
                .unwrap();

            assert!(iconset.is_complete(), "{epoch}");
            for file in &iconset {
                let img = image::open(&file.path).unwrap();
                let px = file.size.pixels();
                assert_eq!((img.width(), img.height()), (px, px), "{epoch} {}", file.size);
            }
        }
    }

    #[test]
    fn pool_size_does_not_change_output() {
        let templates = tempfile::tempdir().unwrap();
        write_templates(templates.path(), StyleEpoch::BigSur);
        let serial = tempfile::tempdir().unwrap();
        let parallel = tempfile::tempdir().unwrap();

        let base = Orchestrator::new(StyleEpoch::BigSur, templates.path());
        base.clone()
            .workers(WorkerPool::new(Some(1)))
            .synthesize(&star(), serial.path())
            .unwrap();
        base.workers(WorkerPool::new(Some(10)))
            .synthesize(&star(), parallel.path())
            .unwrap();

        for size in SizeName::ALL {
            let a = std::fs::read(serial.path().join(size.file_name())).unwrap();
            let b = std::fs::read(parallel.path().join(size.file_name())).unwrap();
            assert_eq!(a, b, "{size}");
        }
    }

    #[test]
    fn missing_template_fails_whole_run() {
        let templates = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_templates(templates.path(), StyleEpoch::Yosemite);
        std::fs::remove_file(
            templates
                .path()
                .join(StyleEpoch::Yosemite.template_dir_name())
                .join("icon_256x256.png"),
        )
        .unwrap();

        let packager = RecordingPackager::default();
        let err = Orchestrator::new(StyleEpoch::Yosemite, templates.path())
            .synthesize_and_package(
                &star(),
                &out.path().join("star.iconset"),
                &out.path().join("star.icns"),
                &packager,
            )
            .unwrap_err();

        assert!(err.failed_sizes().contains(&SizeName::S256), "{err}");
        assert!(err.to_string().contains("256x256"));
        assert!(packager.calls().is_empty());
        assert!(!out.path().join("star.icns").exists());
    }

    #[test]
    fn wrong_template_size_is_reported() {
        let templates = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_templates(templates.path(), StyleEpoch::BigSur);
        RgbaImage::new(10, 10)
            .save(
                templates
                    .path()
                    .join(StyleEpoch::BigSur.template_dir_name())
                    .join("icon_16x16.png"),
            )
            .unwrap();

        let err = Orchestrator::new(StyleEpoch::BigSur, templates.path())
            .workers(WorkerPool::new(Some(1)))
            .synthesize(&star(), out.path())
            .unwrap_err();
        let Error::Render { failures } = &err else {
            panic!("unexpected error: {err}");
        };
        assert!(matches!(
            failures[0].error,
            RenderError::TemplateSize { expected: 16, actual: 10, .. }
        ));
    }

    #[test]
    fn units_after_first_failure_are_cancelled() {
        let templates = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_templates(templates.path(), StyleEpoch::BigSur);
        std::fs::remove_file(
            templates
                .path()
                .join(StyleEpoch::BigSur.template_dir_name())
                .join("icon_16x16.png"),
        )
        .unwrap();

        let err = Orchestrator::new(StyleEpoch::BigSur, templates.path())
            .workers(WorkerPool::new(Some(1)))
            .synthesize(&star(), out.path())
            .unwrap_err();
        let Error::Render { failures } = &err else {
            panic!("unexpected error: {err}");
        };

        assert_eq!(failures.len(), SizeName::ALL.len());
        assert_eq!(failures[0].size, SizeName::S16);
        assert!(matches!(failures[0].error, RenderError::TemplateMissing { .. }));
        for failure in &failures[1..] {
            assert!(matches!(failure.error, RenderError::Cancelled), "{failure}");
        }
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn successful_run_leaves_only_pngs() {
        let templates = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_templates(templates.path(), StyleEpoch::BigSur);

        Orchestrator::new(StyleEpoch::BigSur, templates.path())
            .synthesize(&star(), out.path())
            .unwrap();

        let mut names: Vec<String> = std::fs::read_dir(out.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        let mut expected: Vec<String> = SizeName::ALL.iter().map(|s| s.file_name()).collect();
        expected.sort();
        assert_eq!(names, expected);
    }

    #[test]
    fn unwritable_output_leaves_no_partial_file() {
        let templates = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_templates(templates.path(), StyleEpoch::BigSur);
        // A directory where the PNG should go makes the final rename fail.
        std::fs::create_dir(out.path().join("icon_16x16.png")).unwrap();

        let err = Orchestrator::new(StyleEpoch::BigSur, templates.path())
            .workers(WorkerPool::new(Some(1)))
            .synthesize(&star(), out.path())
            .unwrap_err();

        assert_eq!(err.failed_sizes()[0], SizeName::S16);
        let Error::Render { failures } = &err else {
            panic!("unexpected error: {err}");
        };
        assert!(matches!(failures[0].error, RenderError::Io { .. }), "{err}");
        let leftovers: Vec<_> = std::fs::read_dir(out.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|name| name.to_string_lossy().ends_with(".partial"))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[test]
    fn intermediates_are_written_and_deterministic() {
        let templates = tempfile::tempdir().unwrap();
        write_templates(templates.path(), StyleEpoch::BigSur);
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();

        for debug in [&first, &second] {
            let out = tempfile::tempdir().unwrap();
            Orchestrator::new(StyleEpoch::BigSur, templates.path())
                .keep_intermediates(Some(debug.path().join("steps")))
                .synthesize(&star(), out.path())
                .unwrap();
        }

        let steps = first.path().join("steps");
        for name in ["16x16_1.0_SIZED_MASK.png", "512x512@2x_3.4_BLACK_SHADOW.png"] {
            assert!(steps.join(name).is_file(), "{name}");
        }
        let mut count = 0;
        for entry in std::fs::read_dir(&steps).unwrap() {
            let name = entry.unwrap().file_name();
            let a = std::fs::read(steps.join(&name)).unwrap();
            let b = std::fs::read(second.path().join("steps").join(&name)).unwrap();
            assert_eq!(a, b, "{name:?}");
            count += 1;
        }
        // Stencil, two fill steps and four steps for each of two shadow layers.
        assert_eq!(count, SizeName::ALL.len() * 11);
    }

    #[test]
    fn packager_receives_complete_iconset() {
        let templates = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_templates(templates.path(), StyleEpoch::PreYosemite);
        let packager = RecordingPackager::default();

        let iconset_dir = out.path().join("star.iconset");
        let icns = out.path().join("star.icns");
        Orchestrator::new(StyleEpoch::PreYosemite, templates.path())
            .synthesize_and_package(&star(), &iconset_dir, &icns, &packager)
            .unwrap();

        assert_eq!(packager.calls(), vec![(iconset_dir, icns)]);
    }

    #[test]
    fn worker_pool_defaults_to_available_parallelism() {
        assert!(WorkerPool::new(None).threads() >= 1);
        assert_eq!(WorkerPool::new(Some(0)), WorkerPool::default());
        assert_eq!(WorkerPool::new(Some(3)).threads(), 3);
    }
}
