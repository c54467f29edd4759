use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One garment photo carried through preparation, rendering and placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GarmentItem {
    pub source: PathBuf,
    pub name: String,
    /// Base for every file derived from this item. Equal to `name` unless
    /// another file in the same batch shares the stem.
    #[serde(default)]
    pub output_key: String,
    pub full_body_path: Option<PathBuf>,
    pub closeup_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GarmentItem {
    pub fn new(source: &Path) -> Self {
        let name = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            source: source.to_path_buf(),
            output_key: name.clone(),
            name,
            full_body_path: None,
            closeup_path: None,
            job_id: None,
            success: false,
            error: None,
        }
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = key.into();
        self
    }

    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }

    /// Catalog-facing product title: underscores become spaces, words capitalised.
    pub fn display_name(&self) -> String {
        title_case(&self.name)
    }
}

/// Aggregate of one batch run, in discovery order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub items: Vec<GarmentItem>,
    pub images_dir: Option<PathBuf>,
    pub document_path: Option<PathBuf>,
}

impl BatchReport {
    /// A batch that never started processing (e.g. no inputs found).
    pub fn empty(batch_id: Uuid, error: impl Into<String>) -> Self {
        Self {
            batch_id,
            success: false,
            error: Some(error.into()),
            total: 0,
            succeeded: 0,
            failed: 0,
            items: Vec::new(),
            images_dir: None,
            document_path: None,
        }
    }

    pub fn from_items(batch_id: Uuid, items: Vec<GarmentItem>, images_dir: PathBuf) -> Self {
        let succeeded = items.iter().filter(|i| i.success).count();
        Self {
            batch_id,
            success: true,
            error: None,
            total: items.len(),
            succeeded,
            failed: items.len() - succeeded,
            items,
            images_dir: Some(images_dir),
            document_path: None,
        }
    }

    pub fn successful(&self) -> impl Iterator<Item = &GarmentItem> {
        self.items.iter().filter(|i| i.success)
    }
}

/// Output keys for a set of source files, in the same order. A file whose
/// stem is shared (case-insensitively) with another gets its extension
/// appended; if that still collides, its position as well.
pub fn output_keys(sources: &[PathBuf]) -> Vec<String> {
    fn file_stem(path: &Path) -> String {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
    fn counts<'a>(keys: impl Iterator<Item = &'a String>) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for key in keys {
            *counts.entry(key.to_lowercase()).or_insert(0) += 1;
        }
        counts
    }

    let stems: Vec<String> = sources.iter().map(|p| file_stem(p)).collect();
    let stem_counts = counts(stems.iter());
    let keys: Vec<String> = sources
        .iter()
        .zip(&stems)
        .map(|(path, stem)| match path.extension() {
            Some(ext) if stem_counts[&stem.to_lowercase()] > 1 => {
                format!("{stem}_{}", ext.to_string_lossy())
            }
            _ => stem.clone(),
        })
        .collect();

    let key_counts = counts(keys.iter());
    keys.iter()
        .enumerate()
        .map(|(index, key)| {
            if key_counts[&key.to_lowercase()] > 1 {
                format!("{key}_{}", index + 1)
            } else {
                key.clone()
            }
        })
        .collect()
}

pub fn title_case(raw: &str) -> String {
    raw.replace(['_', '-'], " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("graphic_tee_black"), "Graphic Tee Black");
        assert_eq!(title_case("HOODIE"), "Hoodie");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_output_keys_disambiguate_shared_stems() {
        let sources = vec![
            PathBuf::from("in/hoodie.png"),
            PathBuf::from("in/tee.jpg"),
            PathBuf::from("in/tee.png"),
        ];
        assert_eq!(output_keys(&sources), vec!["hoodie", "tee_jpg", "tee_png"]);
    }

    #[test]
    fn test_output_keys_fall_back_to_position() {
        let sources = vec![PathBuf::from("in/Tee.PNG"), PathBuf::from("in/tee.png")];
        assert_eq!(output_keys(&sources), vec!["Tee_PNG_1", "tee_png_2"]);
    }

    #[test]
    fn test_report_counts() {
        let ok = GarmentItem {
            success: true,
            ..GarmentItem::new(Path::new("in/a.png"))
        };
        let bad = GarmentItem::new(Path::new("in/b.png")).failed("boom");
        let report = BatchReport::from_items(Uuid::new_v4(), vec![ok, bad], PathBuf::from("out"));
        assert_eq!(report.total, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.successful().count(), 1);
        assert_eq!(report.items[0].name, "a");
    }
}
