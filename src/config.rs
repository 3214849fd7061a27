//! Explicit settings for each batch operation, validated once before any
//! file is touched.

use std::path::PathBuf;

use crate::crop::CropSpec;
use crate::error::{CropError, Result};

/// Image extensions picked up when scanning a dataset.
pub const IMG_FORMATS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "tiff"];

#[derive(Debug, Clone)]
pub struct CropConfig {
    pub images_dir: PathBuf,
    pub labels_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Only polygons of this class are cropped.
    pub target_class_id: u32,
    pub spec: CropSpec,
    /// Also write each source image with its polygon corners marked.
    pub annotate: bool,
}

impl CropConfig {
    pub fn validate(&self) -> Result<()> {
        self.spec.validate()?;
        require_dir(&self.images_dir, "images")?;
        require_dir(&self.labels_dir, "labels")?;
        if self.output_dir.starts_with(&self.images_dir) && self.annotate {
            return Err(CropError::Configuration(format!(
                "output directory {:?} must not sit inside the images directory when annotating",
                self.output_dir
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SplitConfig {
    /// Dataset root containing `images/`, `labels/` and optionally `data.yaml`.
    pub source_dir: PathBuf,
    pub dest_dir: PathBuf,
    pub train: f64,
    pub val: f64,
    pub test: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::new(),
            dest_dir: PathBuf::new(),
            train: 0.8,
            val: 0.1,
            test: 0.1,
            seed: 42,
        }
    }
}

impl SplitConfig {
    pub fn validate(&self) -> Result<()> {
        let weights = [self.train, self.val, self.test];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(CropError::Configuration(format!(
                "split weights must be non-negative, got {:?}",
                weights
            )));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(CropError::Configuration(
                "split weights must not all be zero".to_string(),
            ));
        }
        require_dir(&self.source_dir.join("images"), "images")?;
        if self.source_dir == self.dest_dir {
            return Err(CropError::Configuration(
                "split destination must differ from the source dataset".to_string(),
            ));
        }
        Ok(())
    }
}

fn require_dir(path: &std::path::Path, what: &str) -> Result<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(CropError::Configuration(format!(
            "{} directory {:?} does not exist",
            what, path
        )))
    }
}
