use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One product to place in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductEntry {
    pub primary: PathBuf,
    pub secondary: Option<PathBuf>,
    pub name: String,
    pub code: Option<String>,
}

/// Branding and page options for one catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub brand_name: String,
    pub tagline: String,
    pub catalog_title: String,
    pub category_label: String,
    pub contact_line: String,
    pub logo_path: Option<PathBuf>,
    pub include_cover: bool,
    pub include_back_cover: bool,
    pub include_page_numbers: bool,
}

impl CatalogConfig {
    pub fn for_brand(brand: &str) -> Self {
        let handle = brand.to_lowercase();
        Self {
            brand_name: brand.to_uppercase(),
            tagline: "Streetwear for the Next Generation".to_string(),
            catalog_title: "Collection 2024".to_string(),
            category_label: "TEEN BOYS COLLECTION".to_string(),
            contact_line: format!("www.{handle}.com | @{handle}_official"),
            logo_path: None,
            include_cover: true,
            include_back_cover: true,
            include_page_numbers: true,
        }
    }
}

/// Axis-aligned rectangle in page points, origin at the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn aspect(&self) -> f32 {
        self.width / self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    pub const WHITE: Color = Color(0xFF, 0xFF, 0xFF);
    pub const INK: Color = Color(0x1A, 0x1A, 0x1A);
    pub const CHARCOAL: Color = Color(0x33, 0x33, 0x33);
    pub const SLATE: Color = Color(0x66, 0x66, 0x66);
    pub const GREY: Color = Color(0x88, 0x88, 0x88);
    pub const MUTED: Color = Color(0x99, 0x99, 0x99);
    pub const RULE: Color = Color(0xE0, 0xE0, 0xE0);
    pub const PAPER: Color = Color(0xFA, 0xFA, 0xFA);

    /// Components scaled to the 0.0..=1.0 range used by PDF colour operators.
    pub fn unit(self) -> [f32; 3] {
        [
            f32::from(self.0) / 255.0,
            f32::from(self.1) / 255.0,
            f32::from(self.2) / 255.0,
        ]
    }
}

/// The three standard faces the catalog uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FontFace {
    Regular,
    Bold,
    Oblique,
}

impl FontFace {
    pub const ALL: [FontFace; 3] = [FontFace::Regular, FontFace::Bold, FontFace::Oblique];

    pub fn base_font(self) -> &'static str {
        match self {
            FontFace::Regular => "Helvetica",
            FontFace::Bold => "Helvetica-Bold",
            FontFace::Oblique => "Helvetica-Oblique",
        }
    }

    /// Resource name used inside page content streams.
    pub fn resource_name(self) -> &'static str {
        match self {
            FontFace::Regular => "F1",
            FontFace::Bold => "F2",
            FontFace::Oblique => "F3",
        }
    }
}

/// A single drawing instruction on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DrawOp {
    FillRect {
        rect: Rect,
        color: Color,
    },
    Line {
        from: (f32, f32),
        to: (f32, f32),
        width: f32,
        color: Color,
    },
    Text {
        text: String,
        face: FontFace,
        size: f32,
        x: f32,
        y: f32,
        color: Color,
    },
    Image {
        path: PathBuf,
        rect: Rect,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageKind {
    Cover,
    /// Product page, numbered from 1 in product order.
    Product(usize),
    BackCover,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub kind: PageKind,
    pub ops: Vec<DrawOp>,
}

impl Page {
    pub fn images(&self) -> impl Iterator<Item = (&PathBuf, &Rect)> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Image { path, rect } => Some((path, rect)),
            _ => None,
        })
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

/// Fully composed catalog, ready to be written out in one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogDocument {
    pub title: String,
    pub author: String,
    pub page_width: f32,
    pub page_height: f32,
    pub pages: Vec<Page>,
}

impl CatalogDocument {
    pub fn product_pages(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| matches!(p.kind, PageKind::Product(_)))
            .count()
    }
}
