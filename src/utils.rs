use std::fs;
use std::path::{Path, PathBuf};

use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use serde_yaml::{Mapping, Value};

use crate::config::IMG_FORMATS;
use crate::error::Result;

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template(&format!(
            "{{spinner:.green}} [{}] [{{elapsed_precise}}] \
             [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
            label
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// All images under `dir`, recursively, in a stable order.
pub fn collect_images(dir: &Path) -> Vec<PathBuf> {
    let mut images: Vec<PathBuf> = IMG_FORMATS
        .iter()
        .flat_map(|ext| {
            let pattern = format!("{}/**/*.{}", dir.display(), ext);
            match glob(&pattern) {
                Ok(paths) => paths.filter_map(|entry| entry.ok()).collect::<Vec<_>>(),
                Err(e) => {
                    warn!("Bad image glob pattern {}: {}", pattern, e);
                    Vec::new()
                }
            }
        })
        .collect();
    images.sort();
    images.dedup();
    images
}

/// Set top-level keys in a dataset `data.yaml`, keeping existing key order.
///
/// Returns `false` without writing when the file does not exist.
pub fn update_data_yaml(path: &Path, edits: &[(&str, Value)]) -> Result<bool> {
    if !path.exists() {
        warn!("No data.yaml at {:?}, leaving dataset config untouched", path);
        return Ok(false);
    }

    let content = fs::read_to_string(path)?;
    let mut doc = match serde_yaml::from_str::<Value>(&content)? {
        Value::Mapping(map) => map,
        Value::Null => Mapping::new(),
        other => {
            warn!("data.yaml at {:?} is not a mapping ({:?}), rewriting it", path, other);
            Mapping::new()
        }
    };

    for (key, value) in edits {
        doc.insert(Value::String((*key).to_string()), value.clone());
    }

    fs::write(path, serde_yaml::to_string(&Value::Mapping(doc))?)?;
    Ok(true)
}
