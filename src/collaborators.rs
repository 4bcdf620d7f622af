//! External collaborators: packaging, icon application, and reveal.
//!
//! Each concern is a small trait so the core flow can be driven with test
//! doubles. The shipped implementations shell out to the macOS tools, except
//! [`NativeIcns`], which writes the container in-process.

use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::icon::IconSet;
use crate::style::{ColorScheme, SizeName};

// ============================================================================
// Command runner
// ============================================================================

/// Runs `tool` to completion and returns its stdout.
pub(crate) fn run_command<I, S>(tool: &str, args: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<S> = args.into_iter().collect();
    debug!(
        tool,
        args = ?args.iter().map(|a| a.as_ref().to_string_lossy()).collect::<Vec<_>>(),
        "running"
    );

    let output = Command::new(tool)
        .args(&args)
        .output()
        .map_err(|source| Error::ToolUnavailable {
            tool: tool.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(Error::ToolFailed {
            tool: tool.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}

// ============================================================================
// Packaging
// ============================================================================

/// Turns a rendered iconset directory into a single `.icns` file.
pub trait Packager {
    fn name(&self) -> &'static str;

    fn package(&self, iconset: &IconSet, icns: &Path) -> Result<()>;
}

/// Apple's `iconutil`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Iconutil;

impl Packager for Iconutil {
    fn name(&self) -> &'static str {
        "iconutil"
    }

    fn package(&self, iconset: &IconSet, icns: &Path) -> Result<()> {
        let args: [&OsStr; 5] = [
            "--convert".as_ref(),
            "icns".as_ref(),
            "--output".as_ref(),
            icns.as_os_str(),
            iconset.dir().as_os_str(),
        ];
        run_command("iconutil", args)?;
        Ok(())
    }
}

/// Writes the ICNS container directly with the `icns` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeIcns;

impl NativeIcns {
    fn icon_type(size: SizeName) -> icns::IconType {
        use icns::IconType;
        match size {
            SizeName::S16 => IconType::RGBA32_16x16,
            SizeName::S16x2 => IconType::RGBA32_16x16_2x,
            SizeName::S32 => IconType::RGBA32_32x32,
            SizeName::S32x2 => IconType::RGBA32_32x32_2x,
            SizeName::S128 => IconType::RGBA32_128x128,
            SizeName::S128x2 => IconType::RGBA32_128x128_2x,
            SizeName::S256 => IconType::RGBA32_256x256,
            SizeName::S256x2 => IconType::RGBA32_256x256_2x,
            SizeName::S512 => IconType::RGBA32_512x512,
            SizeName::S512x2 => IconType::RGBA32_512x512_2x,
        }
    }
}

impl Packager for NativeIcns {
    fn name(&self) -> &'static str {
        "native"
    }

    fn package(&self, iconset: &IconSet, icns: &Path) -> Result<()> {
        if iconset.is_empty() {
            return Err(Error::input(iconset.dir(), "iconset has no images"));
        }
        let mut family = icns::IconFamily::new();

        for file in iconset {
            let rgba = image::open(&file.path)
                .map_err(|source| Error::Image {
                    path: file.path.clone(),
                    source,
                })?
                .into_rgba8();
            let (width, height) = rgba.dimensions();
            let element =
                icns::Image::from_data(icns::PixelFormat::RGBA, width, height, rgba.into_raw())
                    .map_err(|e| Error::io(&file.path, e))?;
            family
                .add_icon_with_type(&element, Self::icon_type(file.size))
                .map_err(|e| Error::io(&file.path, e))?;
        }

        let out = File::create(icns).map_err(|e| Error::io(icns, e))?;
        let mut writer = BufWriter::new(out);
        family.write(&mut writer).map_err(|e| Error::io(icns, e))?;
        writer.flush().map_err(|e| Error::io(icns, e))?;
        Ok(())
    }
}

/// Which [`Packager`] to use, as named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackagerKind {
    Iconutil,
    Native,
}

impl PackagerKind {
    pub fn packager(self) -> Box<dyn Packager> {
        match self {
            Self::Iconutil => Box::new(Iconutil),
            Self::Native => Box::new(NativeIcns),
        }
    }
}

impl Default for PackagerKind {
    fn default() -> Self {
        if cfg!(target_os = "macos") {
            Self::Iconutil
        } else {
            Self::Native
        }
    }
}

// ============================================================================
// Icon application
// ============================================================================

/// Attaches an `.icns` file to a filesystem path as its custom icon.
pub trait IconApplier {
    fn apply(&self, icns: &Path, target: &Path) -> Result<()>;
}

const SET_ICON_SCRIPT: &str = r#"ObjC.import("Cocoa");
function run(argv) {
  const image = $.NSImage.alloc.initWithContentsOfFile(argv[0]);
  const ok = $.NSWorkspace.sharedWorkspace.setIconForFileOptions(image, argv[1], 0);
  if (!ok) { throw new Error("setIcon failed"); }
}"#;

/// Strategy for setting the icon on a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum SetIconUsing {
    /// `NSWorkspace` through `osascript`. Works for files and folders.
    #[default]
    Osascript,
    /// The `fileicon` script.
    Fileicon,
    /// Resource-fork append with `sips`, `DeRez`, `Rez` and `SetFile`.
    /// Only works on folders.
    #[serde(rename = "rez", alias = "Rez")]
    #[cfg_attr(feature = "clap", value(name = "Rez", alias = "rez"))]
    Rez,
}

impl IconApplier for SetIconUsing {
    fn apply(&self, icns: &Path, target: &Path) -> Result<()> {
        debug!(strategy = ?self, target = %target.display(), "setting icon");
        match self {
            Self::Osascript => {
                let args: [&OsStr; 6] = [
                    "-l".as_ref(),
                    "JavaScript".as_ref(),
                    "-e".as_ref(),
                    SET_ICON_SCRIPT.as_ref(),
                    icns.as_os_str(),
                    target.as_os_str(),
                ];
                run_command("osascript", args)?;
            }
            Self::Fileicon => {
                let args: [&OsStr; 3] = ["set".as_ref(), target.as_os_str(), icns.as_os_str()];
                run_command("fileicon", args)?;
            }
            Self::Rez => apply_with_rez(icns, target)?,
        }
        Ok(())
    }
}

fn apply_with_rez(icns: &Path, target: &Path) -> Result<()> {
    if !target.is_dir() {
        warn!(
            target = %target.display(),
            "target is not a folder; setting the icon with Rez will probably fail"
        );
    }

    // Give the icns file an icns resource so DeRez can extract it.
    run_command("sips", [OsStr::new("-i"), icns.as_os_str()])?;
    let resource = run_command(
        "DeRez",
        [OsStr::new("-only"), OsStr::new("icns"), icns.as_os_str()],
    )?;

    let mut rsrc = tempfile::Builder::new()
        .prefix("folderify-")
        .suffix(".rsrc")
        .tempfile()
        .map_err(|e| Error::io(std::env::temp_dir(), e))?;
    rsrc.write_all(&resource)
        .map_err(|e| Error::io(rsrc.path(), e))?;

    let icon_file = target.join("Icon\r");
    run_command(
        "Rez",
        [
            OsStr::new("-append"),
            rsrc.path().as_os_str(),
            OsStr::new("-o"),
            icon_file.as_os_str(),
        ],
    )?;
    run_command("SetFile", [OsStr::new("-a"), OsStr::new("C"), target.as_os_str()])?;
    run_command("SetFile", [OsStr::new("-a"), OsStr::new("V"), icon_file.as_os_str()])?;
    Ok(())
}

// ============================================================================
// Reveal
// ============================================================================

/// Shows a path in the platform file browser. Failures never propagate.
pub trait Revealer {
    fn reveal(&self, path: &Path);
}

/// `open -R` on macOS.
#[derive(Debug, Clone, Copy, Default)]
pub struct Finder;

impl Revealer for Finder {
    fn reveal(&self, path: &Path) {
        if let Err(e) = run_command("open", [OsStr::new("-R"), path.as_os_str()]) {
            warn!(path = %path.display(), error = %e, "could not reveal path");
        }
    }
}

// ============================================================================
// System queries
// ============================================================================

/// Version reported by `sw_vers`, or `None` off macOS.
pub fn system_macos_version() -> Option<String> {
    let stdout = run_command("sw_vers", ["-productVersion"]).ok()?;
    let version = String::from_utf8_lossy(&stdout).trim().to_string();
    (!version.is_empty()).then_some(version)
}

/// The desktop appearance. Anything but an explicit `Dark` reads as light,
/// including a missing `defaults` tool.
pub fn system_color_scheme() -> ColorScheme {
    match run_command("defaults", ["read", "-g", "AppleInterfaceStyle"]) {
        Ok(stdout) => parse_interface_style(&stdout),
        Err(e) => {
            debug!(error = %e, "no interface style; assuming light");
            ColorScheme::Light
        }
    }
}

fn parse_interface_style(stdout: &[u8]) -> ColorScheme {
    if String::from_utf8_lossy(stdout).trim().eq_ignore_ascii_case("dark") {
        ColorScheme::Dark
    } else {
        ColorScheme::Light
    }
}

// ============================================================================
// Tests
// ============================================================================
