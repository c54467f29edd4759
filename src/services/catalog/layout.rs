use std::path::Path;

use super::fonts::text_width;
use super::CatalogError;
use crate::models::catalog::{
    CatalogConfig, CatalogDocument, Color, DrawOp, FontFace, Page, PageKind, ProductEntry, Rect,
};
use crate::services::image_prep;

/// A4 in points.
pub const PAGE_WIDTH: f32 = 595.28;
pub const PAGE_HEIGHT: f32 = 841.89;

pub const MARGIN: f32 = 50.0;
pub const HEADER_HEIGHT: f32 = 40.0;
pub const FOOTER_HEIGHT: f32 = 60.0;
pub const IMAGE_GAP: f32 = 15.0;

/// Largest share of the region a placed image may take in each direction.
pub const MAX_HEIGHT_FRACTION: f32 = 0.9;
pub const MAX_WIDTH_FRACTION: f32 = 0.8;

const PRIMARY_SHARE: f32 = 0.58;
const SECONDARY_SHARE: f32 = 0.38;

/// Area between the header and footer bands, inside the side margins.
pub fn content_region() -> Rect {
    let top = PAGE_HEIGHT - MARGIN - HEADER_HEIGHT;
    let bottom = MARGIN + FOOTER_HEIGHT;
    Rect::new(MARGIN, bottom, PAGE_WIDTH - 2.0 * MARGIN, top - bottom)
}

/// Place an image of aspect ratio `aspect` (width / height) inside `region`.
///
/// When the region is proportionally wider than the image, height binds and
/// the image takes 90% of the region height; otherwise width binds at 80%.
/// The result is centered in both axes.
pub fn aspect_fit(region: Rect, aspect: f32) -> Rect {
    let (width, height) = if region.aspect() > aspect {
        let h = region.height * MAX_HEIGHT_FRACTION;
        (h * aspect, h)
    } else {
        let w = region.width * MAX_WIDTH_FRACTION;
        (w, w / aspect)
    };
    centered(region, width, height)
}

/// Largest rectangle of ratio `aspect` inside `region`, centered.
fn fit_within(region: Rect, aspect: f32) -> Rect {
    if region.aspect() > aspect {
        centered(region, region.height * aspect, region.height)
    } else {
        centered(region, region.width, region.width / aspect)
    }
}

fn centered(region: Rect, width: f32, height: f32) -> Rect {
    Rect::new(
        region.x + (region.width - width) / 2.0,
        region.y + (region.height - height) / 2.0,
        width,
        height,
    )
}

/// Lay out the whole catalog in memory. Nothing is written here; the
/// result is rendered by [`super::pdf::render`].
pub fn compose(entries: &[ProductEntry], config: &CatalogConfig) -> Result<CatalogDocument, CatalogError> {
    if entries.is_empty() {
        return Err(CatalogError::NoEntries);
    }

    let mut pages = Vec::with_capacity(entries.len() + 2);
    if config.include_cover {
        pages.push(cover_page(config));
    }
    for (index, entry) in entries.iter().enumerate() {
        pages.push(product_page(entry, index + 1, config));
    }
    if config.include_back_cover {
        pages.push(back_cover(config));
    }

    Ok(CatalogDocument {
        title: format!("{} Catalog", config.brand_name),
        author: config.brand_name.clone(),
        page_width: PAGE_WIDTH,
        page_height: PAGE_HEIGHT,
        pages,
    })
}

/// Intrinsic aspect ratio, or `None` when the file is missing or unreadable.
fn image_aspect(path: &Path) -> Option<f32> {
    match image_prep::dimensions(path) {
        Ok((w, h)) if w > 0 && h > 0 => Some(w as f32 / h as f32),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Image not found or unreadable");
            None
        }
    }
}

fn place_image(ops: &mut Vec<DrawOp>, path: &Path, region: Rect) {
    if let Some(aspect) = image_aspect(path) {
        ops.push(DrawOp::Image {
            path: path.to_path_buf(),
            rect: aspect_fit(region, aspect),
        });
    }
}

fn text(text: impl Into<String>, face: FontFace, size: f32, x: f32, y: f32, color: Color) -> DrawOp {
    DrawOp::Text {
        text: text.into(),
        face,
        size,
        x,
        y,
        color,
    }
}

fn centered_text(value: &str, face: FontFace, size: f32, y: f32, color: Color) -> DrawOp {
    let x = (PAGE_WIDTH - text_width(value, face, size)) / 2.0;
    text(value, face, size, x, y, color)
}

fn background(color: Color) -> DrawOp {
    DrawOp::FillRect {
        rect: Rect::new(0.0, 0.0, PAGE_WIDTH, PAGE_HEIGHT),
        color,
    }
}

/// Logo fitted into `logo_box`, if the configured logo can be read.
fn logo(config: &CatalogConfig, logo_box: Rect) -> Option<DrawOp> {
    let path = config.logo_path.as_deref()?;
    let aspect = image_aspect(path)?;
    Some(DrawOp::Image {
        path: path.to_path_buf(),
        rect: fit_within(logo_box, aspect),
    })
}

fn cover_page(config: &CatalogConfig) -> Page {
    let (w, h) = (PAGE_WIDTH, PAGE_HEIGHT);
    let mut ops = vec![
        background(Color::WHITE),
        DrawOp::FillRect {
            rect: Rect::new(0.0, h - 8.0, w, 8.0),
            color: Color::INK,
        },
    ];

    match logo(config, Rect::new((w - 180.0) / 2.0, h - 200.0, 180.0, 90.0)) {
        Some(op) => ops.push(op),
        None => ops.push(centered_text(&config.brand_name, FontFace::Bold, 72.0, h - 180.0, Color::INK)),
    }

    ops.push(centered_text(&config.tagline, FontFace::Oblique, 18.0, h - 240.0, Color::SLATE));
    ops.push(centered_text(&config.catalog_title, FontFace::Regular, 24.0, h / 2.0 + 50.0, Color::CHARCOAL));
    ops.push(DrawOp::Line {
        from: (w / 2.0 - 100.0, h / 2.0),
        to: (w / 2.0 + 100.0, h / 2.0),
        width: 2.0,
        color: Color::RULE,
    });
    ops.push(centered_text(&config.category_label, FontFace::Regular, 14.0, 100.0, Color::GREY));

    Page {
        kind: PageKind::Cover,
        ops,
    }
}

fn product_page(entry: &ProductEntry, number: usize, config: &CatalogConfig) -> Page {
    let (w, h) = (PAGE_WIDTH, PAGE_HEIGHT);
    let mut ops = vec![background(Color::PAPER)];

    // Header
    ops.push(text(&config.brand_name, FontFace::Bold, 14.0, MARGIN, h - MARGIN + 5.0, Color::CHARCOAL));
    ops.push(DrawOp::Line {
        from: (MARGIN, h - MARGIN - 10.0),
        to: (w - MARGIN, h - MARGIN - 10.0),
        width: 0.5,
        color: Color::RULE,
    });

    let content = content_region();
    match entry.secondary.as_deref().filter(|p| p.exists()) {
        Some(secondary) => {
            let left = Rect::new(content.x, content.y, content.width * PRIMARY_SHARE, content.height);
            let right = Rect::new(
                content.x + left.width + IMAGE_GAP,
                content.y + content.height * 0.2,
                content.width * SECONDARY_SHARE,
                content.height * 0.6,
            );
            place_image(&mut ops, &entry.primary, left);
            place_image(&mut ops, secondary, right);
        }
        None => place_image(&mut ops, &entry.primary, content),
    }

    ops.push(text(&entry.name, FontFace::Bold, 16.0, MARGIN, MARGIN + 30.0, Color::INK));
    if let Some(code) = &entry.code {
        ops.push(text(format!("Code: {code}"), FontFace::Regular, 11.0, MARGIN, MARGIN + 12.0, Color::GREY));
    }

    if config.include_page_numbers {
        ops.push(centered_text(&number.to_string(), FontFace::Regular, 10.0, MARGIN - 10.0, Color::MUTED));
    }

    Page {
        kind: PageKind::Product(number),
        ops,
    }
}

fn back_cover(config: &CatalogConfig) -> Page {
    let (w, h) = (PAGE_WIDTH, PAGE_HEIGHT);
    let mut ops = vec![background(Color::INK)];

    if let Some(op) = logo(config, Rect::new((w - 120.0) / 2.0, h / 2.0 + 20.0, 120.0, 60.0)) {
        ops.push(op);
    }
    ops.push(centered_text(&config.brand_name, FontFace::Bold, 36.0, h / 2.0 - 30.0, Color::WHITE));
    ops.push(centered_text(&config.contact_line, FontFace::Regular, 12.0, 60.0, Color::GREY));

    Page {
        kind: PageKind::BackCover,
        ops,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::path::PathBuf;

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(w, h, Rgb([90, 90, 90])).save(&path).unwrap();
        path
    }

    fn entry(primary: PathBuf, secondary: Option<PathBuf>, name: &str) -> ProductEntry {
        ProductEntry {
            primary,
            secondary,
            name: name.to_string(),
            code: None,
        }
    }

    #[test]
    fn test_wide_image_in_square_region_is_width_bound() {
        let region = Rect::new(0.0, 0.0, 400.0, 400.0);
        let placed = aspect_fit(region, 2.0);
        assert!((placed.width - 320.0).abs() < 1e-3);
        assert!((placed.height - 160.0).abs() < 1e-3);
        // Vertically centered.
        assert!((placed.y - 120.0).abs() < 1e-3);
        assert!((placed.x - 40.0).abs() < 1e-3);
    }

    #[test]
    fn test_tall_image_in_wide_region_is_height_bound() {
        let region = Rect::new(10.0, 20.0, 500.0, 200.0);
        let placed = aspect_fit(region, 0.5);
        assert!((placed.height - 180.0).abs() < 1e-3);
        assert!((placed.width - 90.0).abs() < 1e-3);
        assert!((placed.x - (10.0 + 205.0)).abs() < 1e-3);
        assert!((placed.y - 30.0).abs() < 1e-3);
    }

    #[test]
    fn test_empty_entries_rejected() {
        let err = compose(&[], &CatalogConfig::for_brand("bono")).unwrap_err();
        assert!(matches!(err, CatalogError::NoEntries));
    }

    #[test]
    fn test_page_order_and_numbering() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_png(dir.path(), "a.png", 300, 600);
        let b = write_png(dir.path(), "b.png", 300, 600);
        let entries = vec![entry(a, None, "Alpha"), entry(b, None, "Beta")];

        let doc = compose(&entries, &CatalogConfig::for_brand("bono")).unwrap();
        let kinds: Vec<PageKind> = doc.pages.iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            vec![PageKind::Cover, PageKind::Product(1), PageKind::Product(2), PageKind::BackCover]
        );
        assert!(doc.pages[2].texts().any(|t| t == "Beta"));
        assert!(doc.pages[2].texts().any(|t| t == "2"));
    }

    #[test]
    fn test_split_layout_when_secondary_exists() {
        let dir = tempfile::tempdir().unwrap();
        let full = write_png(dir.path(), "full.png", 400, 800);
        let close = write_png(dir.path(), "close.png", 700, 800);
        let doc = compose(
            &[entry(full.clone(), Some(close.clone()), "Tee")],
            &CatalogConfig::for_brand("bono"),
        )
        .unwrap();

        let images: Vec<_> = doc.pages[1].images().collect();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].0, &full);
        let content = content_region();
        let split = content.x + content.width * PRIMARY_SHARE;
        assert!(images[0].1.x + images[0].1.width <= split + 1e-3);
        assert!(images[1].1.x >= split + IMAGE_GAP - 1e-3);
    }

    #[test]
    fn test_missing_secondary_falls_back_to_single() {
        let dir = tempfile::tempdir().unwrap();
        let full = write_png(dir.path(), "full.png", 400, 800);
        let doc = compose(
            &[entry(full, Some(dir.path().join("gone.png")), "Tee")],
            &CatalogConfig::for_brand("bono"),
        )
        .unwrap();
        assert_eq!(doc.pages[1].images().count(), 1);
    }

    #[test]
    fn test_missing_primary_keeps_page() {
        let dir = tempfile::tempdir().unwrap();
        let doc = compose(
            &[entry(dir.path().join("missing.png"), None, "Ghost")],
            &CatalogConfig::for_brand("bono"),
        )
        .unwrap();
        assert_eq!(doc.product_pages(), 1);
        assert_eq!(doc.pages[1].images().count(), 0);
        assert!(doc.pages[1].texts().any(|t| t == "Ghost"));
    }

    #[test]
    fn test_cover_falls_back_to_brand_text() {
        let dir = tempfile::tempdir().unwrap();
        let full = write_png(dir.path(), "full.png", 400, 800);
        let mut config = CatalogConfig::for_brand("bono");
        config.logo_path = Some(dir.path().join("no_logo.png"));
        config.include_back_cover = false;

        let doc = compose(&[entry(full, None, "Tee")], &config).unwrap();
        assert_eq!(doc.pages.len(), 2);
        let cover = &doc.pages[0];
        assert!(cover.texts().any(|t| t == "BONO"));
        assert_eq!(cover.images().count(), 0);
    }

    #[test]
    fn test_cover_uses_logo_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let full = write_png(dir.path(), "full.png", 400, 800);
        let logo = write_png(dir.path(), "logo.png", 400, 100);
        let mut config = CatalogConfig::for_brand("bono");
        config.logo_path = Some(logo);

        let doc = compose(&[entry(full, None, "Tee")], &config).unwrap();
        let (_, rect) = doc.pages[0].images().next().unwrap();
        // 4:1 logo in a 180x90 box is width-bound.
        assert!((rect.width - 180.0).abs() < 1e-3);
        assert!((rect.height - 45.0).abs() < 1e-3);
    }
}
