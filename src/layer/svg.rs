//! Rasterizes vector masks with resvg.

use std::path::Path;

use image::RgbaImage;
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{Options, Tree};

/// Renders SVG markup so that its larger side is `fit` pixels.
///
/// Relative references inside the document (embedded images) resolve against
/// `resources_dir`. The error string describes why the document was rejected.
pub fn rasterize_svg(
    svg_data: &str,
    fit: u32,
    resources_dir: Option<&Path>,
) -> Result<RgbaImage, String> {
    let opts = Options {
        resources_dir: resources_dir.map(Path::to_path_buf),
        ..Options::default()
    };
    let tree = Tree::from_str(svg_data, &opts).map_err(|e| format!("invalid SVG: {e}"))?;

    let svg_size = tree.size();
    let longest = svg_size.width().max(svg_size.height());
    if longest <= 0.0 {
        return Err("SVG has an empty viewport".to_string());
    }
    let scale = fit as f32 / longest;
    let width = ((svg_size.width() * scale).round() as u32).max(1);
    let height = ((svg_size.height() * scale).round() as u32).max(1);

    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| format!("cannot allocate a {width}x{height} canvas"))?;
    resvg::render(&tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    pixmap_to_rgba_image(&pixmap).ok_or_else(|| "rendered buffer has the wrong size".to_string())
}

/// Converts tiny-skia's premultiplied buffer to a straight-alpha image.
fn pixmap_to_rgba_image(pixmap: &Pixmap) -> Option<RgbaImage> {
    let raw = pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();
    RgbaImage::from_raw(pixmap.width(), pixmap.height(), raw)
}
