//! Print catalog assembly: page composition followed by a single PDF write.

pub mod fonts;
pub mod layout;
pub mod pdf;

use std::path::{Path, PathBuf};

use crate::models::catalog::{CatalogConfig, ProductEntry};
use crate::models::garment::title_case;

pub use layout::{aspect_fit, compose, content_region};
pub use pdf::render;

/// Compose and write a catalog in one call.
pub fn create_catalog(
    entries: &[ProductEntry],
    config: &CatalogConfig,
    output: &Path,
) -> Result<PathBuf, CatalogError> {
    let document = compose(entries, config)?;
    tracing::info!(
        pages = document.pages.len(),
        products = document.product_pages(),
        output = %output.display(),
        "Creating catalog"
    );
    let path = render(&document, output)?;
    metrics::counter!("catalogs_rendered_total").increment(1);
    tracing::info!(path = %path.display(), "Catalog created");
    Ok(path)
}

/// One entry per `.png` in `dir`, sorted by file name and titled from the
/// file stem.
pub fn entries_from_directory(dir: &Path) -> Result<Vec<ProductEntry>, CatalogError> {
    let read = std::fs::read_dir(dir).map_err(|e| CatalogError::io(dir, e))?;

    let mut paths: Vec<PathBuf> = read
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("png"))
        })
        .collect();
    paths.sort();

    Ok(paths
        .into_iter()
        .map(|path| {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            ProductEntry {
                name: title_case(&stem),
                primary: path,
                secondary: None,
                code: None,
            }
        })
        .collect())
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("No products to place in the catalog")]
    NoEntries,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("PDF encoding failed: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Failed to write catalog {path}: {message}")]
    Write { path: PathBuf, message: String },
}

impl CatalogError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        CatalogError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
