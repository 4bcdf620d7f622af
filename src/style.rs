//! Style epochs and their per-size parameter tables.
//!
//! A [`StyleEpoch`] names one visual era of the macOS folder icon. Each epoch
//! owns a base template set (one PNG per [`SizeName`]) and a table of
//! [`SizeSpec`]s describing how the mask is placed and shaded at that size.
//! Everything here is static data; the compositor in [`crate::layer`] is the
//! only consumer.

use std::fmt;
use std::str::FromStr;

use palette::Srgb;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Error;
use crate::icon::SizePx;
use crate::layer::primitives::CompositeMode;

// ============================================================================
// Size names
// ============================================================================

/// One of the ten canonical resolutions of a macOS `.iconset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SizeName {
    S16,
    S16x2,
    S32,
    S32x2,
    S128,
    S128x2,
    S256,
    S256x2,
    S512,
    S512x2,
}

impl SizeName {
    /// All ten sizes, in canonical order.
    pub const ALL: [SizeName; 10] = [
        SizeName::S16,
        SizeName::S16x2,
        SizeName::S32,
        SizeName::S32x2,
        SizeName::S128,
        SizeName::S128x2,
        SizeName::S256,
        SizeName::S256x2,
        SizeName::S512,
        SizeName::S512x2,
    ];

    /// The label used in file names, e.g. `"16x16@2x"`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::S16 => "16x16",
            Self::S16x2 => "16x16@2x",
            Self::S32 => "32x32",
            Self::S32x2 => "32x32@2x",
            Self::S128 => "128x128",
            Self::S128x2 => "128x128@2x",
            Self::S256 => "256x256",
            Self::S256x2 => "256x256@2x",
            Self::S512 => "512x512",
            Self::S512x2 => "512x512@2x",
        }
    }

    /// Side length of the square canvas in pixels.
    pub fn pixels(&self) -> u32 {
        match self {
            Self::S16 => 16,
            Self::S16x2 | Self::S32 => 32,
            Self::S32x2 => 64,
            Self::S128 => 128,
            Self::S128x2 | Self::S256 => 256,
            Self::S256x2 | Self::S512 => 512,
            Self::S512x2 => 1024,
        }
    }

    /// File name inside an `.iconset` directory, e.g. `icon_32x32@2x.png`.
    pub fn file_name(&self) -> String {
        format!("icon_{}.png", self.label())
    }
}

impl fmt::Display for SizeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Color scheme
// ============================================================================

/// Light or dark appearance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    #[default]
    Light,
    Dark,
}

impl fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Light => f.write_str("light"),
            Self::Dark => f.write_str("dark"),
        }
    }
}

/// Requested appearance; `Auto` follows the running system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum SchemePreference {
    #[default]
    Auto,
    Light,
    Dark,
}

// ============================================================================
// Layer descriptions
// ============================================================================

/// The part a layer plays in the final composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerRole {
    /// Tinted body of the silhouette.
    Fill,
    /// Dark inner shadow, clipped to the silhouette.
    Shadow,
    /// Single light rim (epochs that do not split the highlight).
    Highlight,
    TopHighlight,
    BottomHighlight,
}

impl LayerRole {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Fill => "fill",
            Self::Shadow => "shadow",
            Self::Highlight => "highlight",
            Self::TopHighlight => "top-highlight",
            Self::BottomHighlight => "bottom-highlight",
        }
    }

    /// Group number and upper-case name used for debug intermediates.
    pub fn step_group(&self) -> (u32, &'static str) {
        match self {
            Self::Fill => (2, "FILL"),
            Self::Shadow => (3, "BLACK"),
            Self::Highlight => (4, "WHITE"),
            Self::TopHighlight => (4, "TOP_WHITE"),
            Self::BottomHighlight => (5, "BOTTOM_WHITE"),
        }
    }
}

/// Parameters of one blurred shadow or highlight layer at one size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowSpec {
    pub role: LayerRole,
    pub color: Srgb<u8>,
    /// How the blurred copy is clipped against the stencil.
    pub clip: CompositeMode,
    /// Motion blur radius in pixels.
    pub blur: u32,
    /// Vertical displacement after blurring; negative moves up.
    pub offset_y: i32,
    /// Alpha multiplier in `[0, 1]`.
    pub opacity: f32,
}

/// Epoch-wide recipe shared by every size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Recipe {
    pub fill: Srgb<u8>,
    pub fill_opacity: f32,
    /// Back-to-front order in which layers are dissolved over the template.
    pub order: &'static [LayerRole],
}

/// Geometry and shading for one rendered resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct SizeSpec {
    pub name: SizeName,
    /// Box the trimmed mask is first centered in (newer recipe only).
    pub centering: Option<SizePx>,
    /// Box the mask is resized to fit before being placed on the canvas.
    pub mask: SizePx,
    /// Vertical placement on the canvas; negative moves up.
    pub offset_y: i32,
    pub shadows: Vec<ShadowSpec>,
}

impl SizeSpec {
    /// Side length of the final canvas.
    pub fn canvas(&self) -> u32 {
        self.name.pixels()
    }

    /// Looks up the shadow layer playing `role`, if this epoch has one.
    pub fn shadow(&self, role: LayerRole) -> Option<&ShadowSpec> {
        self.shadows.iter().find(|s| s.role == role)
    }
}

// ============================================================================
// Parameter tables
// ============================================================================

const BIG_SUR_CENTERING: SizePx = SizePx::new(768, 384);

const BIG_SUR_SHADOW: Srgb<u8> = Srgb::new(58, 152, 208);
const BIG_SUR_HIGHLIGHT: Srgb<u8> = Srgb::new(174, 225, 253);

const CLASSIC_FILL: Srgb<u8> = Srgb::new(8, 59, 102);
const BLACK: Srgb<u8> = Srgb::new(0, 0, 0);
const WHITE: Srgb<u8> = Srgb::new(255, 255, 255);

/// `(name, (w, h, offset), (black blur, black offset), (white blur, white offset, white opacity))`
type BigSurRow = (SizeName, (u32, u32, i32), (u32, i32), (u32, i32, f32));

#[rustfmt::skip]
const BIG_SUR_ROWS: [BigSurRow; 10] = [
    (SizeName::S16,    (12, 6, 2),      (0, 2), (1, 0, 0.5)),
    (SizeName::S16x2,  (24, 12, 2),     (0, 2), (2, 1, 0.35)),
    (SizeName::S32,    (24, 12, 2),     (0, 2), (2, 1, 0.35)),
    (SizeName::S32x2,  (48, 24, 3),     (0, 2), (2, 1, 0.6)),
    (SizeName::S128,   (96, 48, 6),     (0, 2), (2, 1, 0.6)),
    (SizeName::S128x2, (192, 96, 12),   (0, 2), (2, 1, 0.6)),
    (SizeName::S256,   (192, 96, 12),   (0, 2), (2, 1, 0.6)),
    (SizeName::S256x2, (384, 192, 24),  (0, 2), (2, 1, 0.75)),
    (SizeName::S512,   (384, 192, 24),  (0, 2), (2, 1, 0.75)),
    (SizeName::S512x2, (768, 384, 48),  (0, 2), (2, 1, 0.75)),
];

/// `(name, w, h, offset)`
type ClassicRow = (SizeName, u32, u32, i32);

#[rustfmt::skip]
const YOSEMITE_ROWS: [ClassicRow; 10] = [
    (SizeName::S16,     12,   8,  1), (SizeName::S16x2,   26,  14,  2),
    (SizeName::S32,     26,  14,  2), (SizeName::S32x2,   52,  26,  2),
    (SizeName::S128,   103,  53,  4), (SizeName::S128x2, 206, 106,  9),
    (SizeName::S256,   206, 106,  9), (SizeName::S256x2, 412, 212, 18),
    (SizeName::S512,   412, 212, 18), (SizeName::S512x2, 824, 424, 36),
];

#[rustfmt::skip]
const PRE_YOSEMITE_ROWS: [ClassicRow; 10] = [
    (SizeName::S16,     12,   8,  1), (SizeName::S16x2,   26,  14,  2),
    (SizeName::S32,     26,  14,  2), (SizeName::S32x2,   52,  30,  4),
    (SizeName::S128,   103,  60,  9), (SizeName::S128x2, 206, 121, 18),
    (SizeName::S256,   206, 121, 18), (SizeName::S256x2, 412, 242, 36),
    (SizeName::S512,   412, 242, 36), (SizeName::S512x2, 824, 484, 72),
];

const BIG_SUR_ORDER: &[LayerRole] = &[LayerRole::Highlight, LayerRole::Fill, LayerRole::Shadow];

const CLASSIC_ORDER: &[LayerRole] = &[
    LayerRole::Fill,
    LayerRole::Shadow,
    LayerRole::TopHighlight,
    LayerRole::BottomHighlight,
];

fn big_sur_size(row: &BigSurRow) -> SizeSpec {
    let &(name, (w, h, offset), black, white) = row;
    let (black_blur, black_offset) = black;
    let (white_blur, white_offset, white_opacity) = white;
    SizeSpec {
        name,
        centering: Some(BIG_SUR_CENTERING),
        mask: SizePx::new(w, h),
        offset_y: offset,
        shadows: vec![
            ShadowSpec {
                role: LayerRole::Shadow,
                color: BIG_SUR_SHADOW,
                clip: CompositeMode::DestinationIn,
                blur: black_blur,
                offset_y: black_offset,
                opacity: 0.5,
            },
            ShadowSpec {
                role: LayerRole::Highlight,
                color: BIG_SUR_HIGHLIGHT,
                clip: CompositeMode::DestinationOut,
                blur: white_blur,
                offset_y: white_offset,
                opacity: white_opacity,
            },
        ],
    }
}

fn classic_size(row: &ClassicRow) -> SizeSpec {
    let &(name, w, h, offset) = row;
    SizeSpec {
        name,
        centering: None,
        mask: SizePx::new(w, h),
        offset_y: offset,
        shadows: vec![
            ShadowSpec {
                role: LayerRole::Shadow,
                color: BLACK,
                clip: CompositeMode::DestinationIn,
                blur: 1,
                offset_y: 2,
                opacity: 0.5,
            },
            ShadowSpec {
                role: LayerRole::TopHighlight,
                color: WHITE,
                clip: CompositeMode::DestinationOut,
                blur: 0,
                offset_y: 1,
                opacity: 0.5,
            },
            ShadowSpec {
                role: LayerRole::BottomHighlight,
                color: WHITE,
                clip: CompositeMode::DestinationOut,
                blur: 0,
                offset_y: -1,
                opacity: 0.4,
            },
        ],
    }
}

// ============================================================================
// StyleEpoch
// ============================================================================

/// A versioned visual recipe for the folder icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleEpoch {
    /// OS X 10.5 through 10.9 (`A`).
    PreYosemite,
    /// OS X 10.10 through macOS 10.15 (`B`).
    Yosemite,
    /// macOS 11 and later, light appearance (`C`).
    BigSur,
    /// macOS 11 and later, dark appearance (`C.dark`).
    BigSurDark,
}

impl StyleEpoch {
    pub const ALL: [StyleEpoch; 4] = [
        StyleEpoch::PreYosemite,
        StyleEpoch::Yosemite,
        StyleEpoch::BigSur,
        StyleEpoch::BigSurDark,
    ];

    /// Short identifier: `A`, `B`, `C` or `C.dark`.
    pub fn id(&self) -> &'static str {
        match self {
            Self::PreYosemite => "A",
            Self::Yosemite => "B",
            Self::BigSur => "C",
            Self::BigSurDark => "C.dark",
        }
    }

    /// Name used for the template set directory.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PreYosemite => "pre-Yosemite",
            Self::Yosemite => "Yosemite",
            Self::BigSur => "BigSur",
            Self::BigSurDark => "BigSur.dark",
        }
    }

    /// Directory (relative to the templates root) holding this epoch's base icons.
    pub fn template_dir_name(&self) -> String {
        format!("GenericFolderIcon.{}.iconset", self.name())
    }

    /// Whether this epoch family has a dark variant.
    pub fn supports_dark(&self) -> bool {
        matches!(self, Self::BigSur | Self::BigSurDark)
    }

    /// Returns the variant of this epoch for `scheme`.
    ///
    /// Epochs without a dark variant are returned unchanged.
    pub fn with_color_scheme(self, scheme: ColorScheme) -> Self {
        match (self, scheme) {
            (Self::BigSur | Self::BigSurDark, ColorScheme::Dark) => Self::BigSurDark,
            (Self::BigSur | Self::BigSurDark, ColorScheme::Light) => Self::BigSur,
            (other, _) => other,
        }
    }

    /// Picks the epoch matching a macOS version string such as `"10.13"` or `"14.2.1"`.
    pub fn for_macos(version: &str, scheme: ColorScheme) -> Self {
        let mut parts = version.trim().split('.');
        let major = parts.next().and_then(|p| p.parse::<u32>().ok());
        let minor = parts.next().and_then(|p| p.parse::<u32>().ok());
        let epoch = match (major, minor) {
            (Some(10), Some(5..=9)) => Self::PreYosemite,
            (Some(10), Some(10..=15)) => Self::Yosemite,
            _ => Self::BigSur,
        };
        epoch.with_color_scheme(scheme)
    }

    /// Resolves the epoch for an optional macOS version and an appearance
    /// preference.
    ///
    /// A missing version selects the newest style. `system` is consulted only
    /// for [`SchemePreference::Auto`] on an epoch with a dark variant; asking
    /// for dark on an older epoch logs a warning and keeps it light.
    pub fn select(
        version: Option<&str>,
        preference: SchemePreference,
        system: impl FnOnce() -> ColorScheme,
    ) -> Self {
        let base = version.map_or(Self::BigSur, |v| Self::for_macos(v, ColorScheme::Light));
        let scheme = match preference {
            SchemePreference::Light => ColorScheme::Light,
            SchemePreference::Dark if !base.supports_dark() => {
                warn!(style = %base, "no dark variant for this style; using light");
                ColorScheme::Light
            }
            SchemePreference::Dark => ColorScheme::Dark,
            SchemePreference::Auto if base.supports_dark() => system(),
            SchemePreference::Auto => ColorScheme::Light,
        };
        base.with_color_scheme(scheme)
    }

    pub fn recipe(&self) -> Recipe {
        match self {
            Self::PreYosemite | Self::Yosemite => Recipe {
                fill: CLASSIC_FILL,
                fill_opacity: 0.6,
                order: CLASSIC_ORDER,
            },
            Self::BigSur => Recipe {
                fill: Srgb::new(8, 134, 206),
                fill_opacity: 0.5,
                order: BIG_SUR_ORDER,
            },
            Self::BigSurDark => Recipe {
                fill: Srgb::new(6, 111, 194),
                fill_opacity: 0.5,
                order: BIG_SUR_ORDER,
            },
        }
    }

    /// Box every size first centers the trimmed mask in, if this epoch uses one.
    pub fn centering_box(&self) -> Option<SizePx> {
        match self {
            Self::BigSur | Self::BigSurDark => Some(BIG_SUR_CENTERING),
            Self::PreYosemite | Self::Yosemite => None,
        }
    }

    /// The full size table, one entry per [`SizeName`], in canonical order.
    pub fn sizes(&self) -> Vec<SizeSpec> {
        match self {
            Self::PreYosemite => PRE_YOSEMITE_ROWS.iter().map(classic_size).collect(),
            Self::Yosemite => YOSEMITE_ROWS.iter().map(classic_size).collect(),
            Self::BigSur | Self::BigSurDark => BIG_SUR_ROWS.iter().map(big_sur_size).collect(),
        }
    }

    /// The entry for a single size.
    pub fn size(&self, name: SizeName) -> SizeSpec {
        match self {
            Self::PreYosemite => classic_size(&PRE_YOSEMITE_ROWS[index_of(name)]),
            Self::Yosemite => classic_size(&YOSEMITE_ROWS[index_of(name)]),
            Self::BigSur | Self::BigSurDark => big_sur_size(&BIG_SUR_ROWS[index_of(name)]),
        }
    }
}

fn index_of(name: SizeName) -> usize {
    name as usize
}

impl fmt::Display for StyleEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StyleEpoch {
    type Err = Error;

    /// Accepts either the short id (`B`) or the name (`Yosemite`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.id().eq_ignore_ascii_case(s) || e.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidStyle(s.to_string()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_epoch_has_all_ten_sizes_in_order() {
        for epoch in StyleEpoch::ALL {
            let names: Vec<_> = epoch.sizes().iter().map(|s| s.name).collect();
            assert_eq!(names, SizeName::ALL.to_vec(), "{epoch}");
        }
    }

    #[test]
    fn size_lookup_matches_table_rows() {
        for epoch in StyleEpoch::ALL {
            for spec in epoch.sizes() {
                assert_eq!(epoch.size(spec.name), spec);
            }
        }
    }

    #[test]
    fn canvas_sizes_follow_labels() {
        assert_eq!(SizeName::S16.pixels(), 16);
        assert_eq!(SizeName::S16x2.pixels(), 32);
        assert_eq!(SizeName::S32x2.pixels(), 64);
        assert_eq!(SizeName::S512x2.pixels(), 1024);
        assert_eq!(SizeName::S32x2.file_name(), "icon_32x32@2x.png");
        assert_eq!(SizeName::S256x2.to_string(), "256x256@2x");
    }

    #[test]
    fn mask_boxes_fit_their_canvas() {
        for epoch in StyleEpoch::ALL {
            for spec in epoch.sizes() {
                assert!(spec.mask.width <= spec.canvas(), "{epoch} {}", spec.name);
                assert!(spec.mask.height <= spec.canvas(), "{epoch} {}", spec.name);
            }
        }
    }

    #[test]
    fn tables_keep_epoch_specific_values() {
        // The two classic tables diverge from 32x32@2x upward.
        assert_eq!(StyleEpoch::Yosemite.size(SizeName::S32x2).mask, SizePx::new(52, 26));
        assert_eq!(StyleEpoch::PreYosemite.size(SizeName::S32x2).mask, SizePx::new(52, 30));
        assert_eq!(StyleEpoch::PreYosemite.size(SizeName::S32x2).offset_y, 4);

        let big = StyleEpoch::BigSur.size(SizeName::S16);
        assert_eq!(big.centering, Some(SizePx::new(768, 384)));
        let highlight = big.shadow(LayerRole::Highlight).unwrap();
        assert_eq!((highlight.blur, highlight.offset_y), (1, 0));
        assert_eq!(highlight.opacity, 0.5);
    }

    #[test]
    fn shadow_layers_per_epoch() {
        let big = StyleEpoch::BigSur.size(SizeName::S128);
        assert_eq!(big.shadows.len(), 2);
        assert!(big.shadow(LayerRole::TopHighlight).is_none());

        let classic = StyleEpoch::Yosemite.size(SizeName::S128);
        assert_eq!(classic.shadows.len(), 3);
        assert!(classic.shadow(LayerRole::TopHighlight).is_some());
        assert!(classic.shadow(LayerRole::BottomHighlight).is_some());

        // Every role in the composite order has a source layer.
        for epoch in StyleEpoch::ALL {
            let spec = epoch.size(SizeName::S16);
            for role in epoch.recipe().order {
                assert!(*role == LayerRole::Fill || spec.shadow(*role).is_some());
            }
        }
    }

    #[test]
    fn dark_variant_only_changes_fill() {
        let light = StyleEpoch::BigSur.recipe();
        let dark = StyleEpoch::BigSurDark.recipe();
        assert_ne!(light.fill, dark.fill);
        assert_eq!(light.order, dark.order);
        assert_eq!(StyleEpoch::BigSur.sizes(), StyleEpoch::BigSurDark.sizes());
    }

    #[test]
    fn macos_versions_map_to_epochs() {
        assert_eq!(StyleEpoch::for_macos("10.7", ColorScheme::Light), StyleEpoch::PreYosemite);
        assert_eq!(StyleEpoch::for_macos("10.13", ColorScheme::Dark), StyleEpoch::Yosemite);
        assert_eq!(StyleEpoch::for_macos("14.2.1", ColorScheme::Light), StyleEpoch::BigSur);
        assert_eq!(StyleEpoch::for_macos("11.0", ColorScheme::Dark), StyleEpoch::BigSurDark);
        assert_eq!(StyleEpoch::for_macos("nonsense", ColorScheme::Light), StyleEpoch::BigSur);
    }

    #[test]
    fn select_defaults_to_newest_style() {
        let light = || ColorScheme::Light;
        assert_eq!(StyleEpoch::select(None, SchemePreference::Auto, light), StyleEpoch::BigSur);
        assert_eq!(
            StyleEpoch::select(None, SchemePreference::Dark, light),
            StyleEpoch::BigSurDark
        );
        assert_eq!(
            StyleEpoch::select(Some("13.4"), SchemePreference::Auto, || ColorScheme::Dark),
            StyleEpoch::BigSurDark
        );
        assert_eq!(
            StyleEpoch::select(Some("13.4"), SchemePreference::Light, || ColorScheme::Dark),
            StyleEpoch::BigSur
        );
    }

    #[test]
    fn select_keeps_older_styles_light() {
        let unused = || -> ColorScheme { panic!("system appearance consulted") };
        assert_eq!(
            StyleEpoch::select(Some("10.9"), SchemePreference::Auto, unused),
            StyleEpoch::PreYosemite
        );
        assert_eq!(
            StyleEpoch::select(Some("10.14"), SchemePreference::Dark, unused),
            StyleEpoch::Yosemite
        );
        assert_eq!(
            StyleEpoch::select(Some("10.10"), SchemePreference::Light, unused),
            StyleEpoch::Yosemite
        );
    }

    #[test]
    fn parse_ids_and_names() {
        assert_eq!("B".parse::<StyleEpoch>().unwrap(), StyleEpoch::Yosemite);
        assert_eq!("c.dark".parse::<StyleEpoch>().unwrap(), StyleEpoch::BigSurDark);
        assert_eq!("pre-yosemite".parse::<StyleEpoch>().unwrap(), StyleEpoch::PreYosemite);
        assert!("Tiger".parse::<StyleEpoch>().is_err());
        assert_eq!(
            StyleEpoch::BigSurDark.template_dir_name(),
            "GenericFolderIcon.BigSur.dark.iconset"
        );
    }
}
