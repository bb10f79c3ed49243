use crate::config::RenderConfig;
use crate::error::{RenderError, RenderResult};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use once_cell::sync::Lazy;
use resvg::tiny_skia;
use std::path::Path;
use std::sync::Arc;

static FONT_DB: Lazy<Arc<usvg::fontdb::Database>> = Lazy::new(|| {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    Arc::new(db)
});

fn svg_options() -> usvg::Options<'static> {
    let mut opt = usvg::Options::default();
    opt.font_family = "Arial".to_string();
    opt.fontdb = Arc::clone(&FONT_DB);
    opt
}

/// Largest natural-size render [`rasterize`] will attempt, in pixels.
pub const MAX_NATURAL_PIXELS: u64 = 64 * 1024 * 1024;

fn parse_tree(svg: &str) -> RenderResult<usvg::Tree> {
    usvg::Tree::from_str(svg, &svg_options()).map_err(|e| RenderError::raster(e.to_string()))
}

/// Render SVG text at its natural size. Scenes above [`MAX_NATURAL_PIXELS`]
/// are refused rather than allocated.
pub fn rasterize(svg: &str) -> RenderResult<RgbaImage> {
    let tree = parse_tree(svg)?;
    let size = tree.size().to_int_size();
    let area = u64::from(size.width()) * u64::from(size.height());
    if area > MAX_NATURAL_PIXELS {
        return Err(RenderError::raster(format!(
            "{}x{} scene is too large to render at natural size",
            size.width(),
            size.height()
        )));
    }
    render_scaled(&tree, size.width(), size.height(), 1.0)
}

/// Render SVG text already shrunk to fit inside `box_w`×`box_h`, keeping its
/// aspect ratio and never enlarging it. Memory use is bounded by the box, not
/// by how far apart the scene's elements are.
pub fn rasterize_fitted(svg: &str, box_w: u32, box_h: u32) -> RenderResult<RgbaImage> {
    let tree = parse_tree(svg)?;
    let size = tree.size();
    let scale = (box_w as f32 / size.width())
        .min(box_h as f32 / size.height())
        .min(1.0);
    let width = ((size.width() * scale).round() as u32).clamp(1, box_w.max(1));
    let height = ((size.height() * scale).round() as u32).clamp(1, box_h.max(1));
    render_scaled(&tree, width, height, scale)
}

fn render_scaled(tree: &usvg::Tree, width: u32, height: u32, scale: f32) -> RenderResult<RgbaImage> {
    let mut pixmap = tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| RenderError::raster(format!("cannot allocate {width}x{height} pixmap")))?;
    resvg::render(tree, tiny_skia::Transform::from_scale(scale, scale), &mut pixmap.as_mut());
    Ok(pixmap_to_image(&pixmap))
}

fn pixmap_to_image(pixmap: &tiny_skia::Pixmap) -> RgbaImage {
    let mut out = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in out.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        *dst = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
    }
    out
}

/// Shrink `image` to fit inside `box_w`×`box_h` (never enlarging it) and
/// center it on a canvas of exactly that size filled with `background`.
pub fn fit_to_box(image: &RgbaImage, box_w: u32, box_h: u32, background: [u8; 4]) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(box_w, box_h, Rgba(background));
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return canvas;
    }

    let scale = (box_w as f64 / w as f64).min(box_h as f64 / h as f64).min(1.0);
    let fit_w = ((w as f64 * scale).round() as u32).clamp(1, box_w);
    let fit_h = ((h as f64 * scale).round() as u32).clamp(1, box_h);
    let scaled = if (fit_w, fit_h) == (w, h) {
        image.clone()
    } else {
        imageops::resize(image, fit_w, fit_h, FilterType::Lanczos3)
    };

    let x = (box_w - fit_w) / 2;
    let y = (box_h - fit_h) / 2;
    imageops::overlay(&mut canvas, &scaled, i64::from(x), i64::from(y));
    canvas
}

/// Rasterize, letterbox into the configured output box and write a PNG.
pub fn write_thumbnail(svg: &str, output: &Path, config: &RenderConfig) -> RenderResult<()> {
    let background = config
        .background_rgba()
        .map_err(|e| RenderError::raster(e.to_string()))?;
    let fitted = rasterize_fitted(svg, config.width, config.height)?;
    let framed = fit_to_box(&fitted, config.width, config.height, background);
    DynamicImage::ImageRgba8(framed)
        .to_rgb8()
        .save_with_format(output, ImageFormat::Png)
        .map_err(|e| match e {
            image::ImageError::IoError(io) => RenderError::io(output, io),
            other => RenderError::raster(other.to_string()),
        })
}

pub fn write_output_svg(svg: &str, output: &Path) -> RenderResult<()> {
    std::fs::write(output, svg).map_err(|e| RenderError::io(output, e))
}

/// Turn a symbol payload into a PNG fitting a `pixels`-sided square. SVG
/// payloads fill the full square, centered. Returns `None` when the payload
/// cannot be decoded.
pub fn rasterize_icon(bytes: &[u8], pixels: u32) -> Option<Vec<u8>> {
    let opt = svg_options();
    if let Ok(tree) = usvg::Tree::from_data(bytes, &opt) {
        let size = tree.size();
        let scale = (pixels as f32 / size.width()).min(pixels as f32 / size.height());
        let mut pixmap = tiny_skia::Pixmap::new(pixels, pixels)?;
        let dx = (pixels as f32 - size.width() * scale) / 2.0;
        let dy = (pixels as f32 - size.height() * scale) / 2.0;
        let transform = tiny_skia::Transform::from_row(scale, 0.0, 0.0, scale, dx, dy);
        resvg::render(&tree, transform, &mut pixmap.as_mut());
        return pixmap.encode_png().ok();
    }

    let decoded = image::load_from_memory(bytes).ok()?;
    let mut buf = std::io::Cursor::new(Vec::new());
    decoded
        .resize(pixels, pixels, FilterType::Lanczos3)
        .write_to(&mut buf, ImageFormat::Png)
        .ok()?;
    Some(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icons::NoIcons;
    use crate::render::compose;
    use crate::theme::Theme;
    use crate::topology::{Node, Topology};

    const WIDE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="2000" height="500"><rect width="100%" height="100%" fill="#ff0000"/></svg>"##;

    #[test]
    fn rasterize_uses_natural_size() {
        let img = rasterize(WIDE).unwrap();
        assert_eq!(img.dimensions(), (2000, 500));
        assert_eq!(img.get_pixel(10, 10).0, [255, 0, 0, 255]);
    }

    #[test]
    fn rasterize_reports_bad_markup() {
        let err = rasterize("<svg").unwrap_err();
        assert!(matches!(err, RenderError::Raster(_)));
    }

    #[test]
    fn wide_content_is_letterboxed() {
        let img = rasterize(WIDE).unwrap();
        let out = fit_to_box(&img, 1200, 800, [255, 255, 255, 255]);
        assert_eq!(out.dimensions(), (1200, 800));
        // 2000x500 scales to 1200x300, centered vertically.
        assert_eq!(out.get_pixel(600, 10).0, [255, 255, 255, 255]);
        assert_eq!(out.get_pixel(600, 400).0, [255, 0, 0, 255]);
        assert_eq!(out.get_pixel(600, 790).0, [255, 255, 255, 255]);
    }

    #[test]
    fn small_content_is_never_upscaled() {
        let small = RgbaImage::from_pixel(100, 50, Rgba([0, 0, 255, 255]));
        let out = fit_to_box(&small, 400, 400, [0, 0, 0, 255]);
        assert_eq!(out.dimensions(), (400, 400));
        assert_eq!(out.get_pixel(150, 175).0, [0, 0, 255, 255]);
        assert_eq!(out.get_pixel(149, 200).0, [0, 0, 0, 255]);
        assert_eq!(out.get_pixel(200, 174).0, [0, 0, 0, 255]);
        assert_eq!(out.get_pixel(249, 224).0, [0, 0, 255, 255]);
        assert_eq!(out.get_pixel(250, 200).0, [0, 0, 0, 255]);
    }

    #[test]
    fn thumbnail_file_matches_box() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");
        let cfg = RenderConfig {
            width: 320,
            height: 240,
            ..Default::default()
        };
        write_thumbnail(WIDE, &path, &cfg).unwrap();
        let written = image::open(&path).unwrap();
        assert_eq!((written.width(), written.height()), (320, 240));
    }

    #[test]
    fn fitted_render_matches_box_aspect() {
        let img = rasterize_fitted(WIDE, 1200, 800).unwrap();
        assert_eq!(img.dimensions(), (1200, 300));
        assert_eq!(img.get_pixel(600, 150).0, [255, 0, 0, 255]);
        // Already small enough: natural size is kept.
        assert_eq!(rasterize_fitted(WIDE, 4000, 4000).unwrap().dimensions(), (2000, 500));
    }

    #[test]
    fn distant_nodes_render_within_the_box() {
        let topology = Topology::new(
            vec![
                Node::new("a", "near", 0.0, 0.0),
                Node::new("b", "far", 0.0, 1.0e9),
            ],
            Vec::new(),
            Vec::new(),
        );
        let svg = compose(&topology, &RenderConfig::default(), &Theme::gns3(), &NoIcons);
        assert!(matches!(rasterize(&svg), Err(RenderError::Raster(_))));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outlier.png");
        let cfg = RenderConfig {
            width: 400,
            height: 300,
            ..Default::default()
        };
        write_thumbnail(&svg, &path, &cfg).unwrap();
        let written = image::open(&path).unwrap();
        assert_eq!((written.width(), written.height()), (400, 300));
    }

    #[test]
    fn icons_render_to_png() {
        let svg = r##"<svg xmlns="http://www.w3.org/2000/svg" width="32" height="16"><rect width="32" height="16" fill="#00ff00"/></svg>"##;
        let png = rasterize_icon(svg.as_bytes(), 72).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (72, 72));
        assert!(rasterize_icon(b"definitely not an image", 72).is_none());
    }
}
