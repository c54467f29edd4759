use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::fonts;
use super::CatalogError;
use crate::models::catalog::{CatalogDocument, Color, DrawOp, FontFace, Page};
use crate::services::image_prep;

/// Longest edge, in pixels, of an embedded image (about 300 dpi across a
/// full A4 width).
const MAX_EMBED_PX: u32 = 2400;

fn real(v: f32) -> Object {
    Object::Real(v.into())
}

fn name(n: &str) -> Object {
    Object::Name(n.as_bytes().to_vec())
}

struct EmbeddedImage {
    resource: String,
    id: ObjectId,
}

/// Write a composed catalog to `output`. The file is built next to the
/// destination and moved into place only once complete.
pub fn render(document: &CatalogDocument, output: &Path) -> Result<PathBuf, CatalogError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut fonts = Dictionary::new();
    for face in FontFace::ALL {
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => face.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        fonts.set(face.resource_name(), font_id);
    }
    let fonts_id = doc.add_object(fonts);

    let mut images: BTreeMap<PathBuf, Option<EmbeddedImage>> = BTreeMap::new();
    let mut kids = Vec::with_capacity(document.pages.len());

    for page in &document.pages {
        let mut xobjects = Dictionary::new();
        for (path, _) in page.images() {
            if !images.contains_key(path) {
                let embedded = embed_image(&mut doc, path, images.len() + 1);
                images.insert(path.clone(), embedded);
            }
            if let Some(Some(image)) = images.get(path) {
                xobjects.set(image.resource.as_str(), image.id);
            }
        }

        let content = Content {
            operations: page_operations(page, &images),
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

        let mut resources = dictionary! { "Font" => fonts_id };
        if !xobjects.is_empty() {
            resources.set("XObject", xobjects);
        }

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), real(document.page_width), real(document.page_height)],
            "Contents" => content_id,
            "Resources" => resources,
        });
        kids.push(Object::Reference(page_id));
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(document.title.as_str()),
        "Author" => Object::string_literal(document.author.as_str()),
        "Creator" => Object::string_literal(concat!("catalog-pipeline ", env!("CARGO_PKG_VERSION"))),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc.compress();

    commit(&mut doc, output)?;
    Ok(output.to_path_buf())
}

fn commit(doc: &mut Document, output: &Path) -> Result<(), CatalogError> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| CatalogError::io(&dir, e))?;

    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| CatalogError::io(&dir, e))?;
    doc.save_to(&mut tmp).map_err(|e| CatalogError::Write {
        path: output.to_path_buf(),
        message: e.to_string(),
    })?;
    tmp.persist(output).map_err(|e| CatalogError::io(output, e.error))?;
    Ok(())
}

/// Add one image as a JPEG XObject. Images that can no longer be read are
/// left out of the document with a warning.
fn embed_image(doc: &mut Document, path: &Path, index: usize) -> Option<EmbeddedImage> {
    let (bytes, width, height) = match image_prep::encode_for_page(path, MAX_EMBED_PX) {
        Ok(encoded) => encoded,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Skipping image that could not be embedded");
            return None;
        }
    };

    let mut stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width),
            "Height" => i64::from(height),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        bytes,
    );
    // Already JPEG; Flate on top gains nothing.
    stream.allows_compression = false;

    Some(EmbeddedImage {
        resource: format!("Im{index}"),
        id: doc.add_object(stream),
    })
}

fn fill_color(color: Color) -> Operation {
    let [r, g, b] = color.unit();
    Operation::new("rg", vec![real(r), real(g), real(b)])
}

fn stroke_color(color: Color) -> Operation {
    let [r, g, b] = color.unit();
    Operation::new("RG", vec![real(r), real(g), real(b)])
}

fn page_operations(page: &Page, images: &BTreeMap<PathBuf, Option<EmbeddedImage>>) -> Vec<Operation> {
    let mut ops = Vec::new();
    for op in &page.ops {
        match op {
            DrawOp::FillRect { rect, color } => {
                ops.push(fill_color(*color));
                ops.push(Operation::new(
                    "re",
                    vec![real(rect.x), real(rect.y), real(rect.width), real(rect.height)],
                ));
                ops.push(Operation::new("f", vec![]));
            }
            DrawOp::Line { from, to, width, color } => {
                ops.push(stroke_color(*color));
                ops.push(Operation::new("w", vec![real(*width)]));
                ops.push(Operation::new("m", vec![real(from.0), real(from.1)]));
                ops.push(Operation::new("l", vec![real(to.0), real(to.1)]));
                ops.push(Operation::new("S", vec![]));
            }
            DrawOp::Text { text, face, size, x, y, color } => {
                ops.push(Operation::new("BT", vec![]));
                ops.push(Operation::new("Tf", vec![name(face.resource_name()), real(*size)]));
                ops.push(fill_color(*color));
                ops.push(Operation::new("Td", vec![real(*x), real(*y)]));
                ops.push(Operation::new(
                    "Tj",
                    vec![Object::String(fonts::encode(text), StringFormat::Literal)],
                ));
                ops.push(Operation::new("ET", vec![]));
            }
            DrawOp::Image { path, rect } => {
                let Some(Some(image)) = images.get(path) else {
                    continue;
                };
                ops.push(Operation::new("q", vec![]));
                ops.push(Operation::new(
                    "cm",
                    vec![
                        real(rect.width),
                        0.into(),
                        0.into(),
                        real(rect.height),
                        real(rect.x),
                        real(rect.y),
                    ],
                ));
                ops.push(Operation::new("Do", vec![name(&image.resource)]));
                ops.push(Operation::new("Q", vec![]));
            }
        }
    }
    ops
}
