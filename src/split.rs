//! Split a flat `images/` + `labels/` dataset into train, val and test sets.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};

use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde_yaml::Value;

use crate::config::SplitConfig;
use crate::dataset::label_path_for;
use crate::error::Result;
use crate::utils::{collect_images, create_progress_bar, update_data_yaml};

pub const SPLITS: [&str; 3] = ["train", "val", "test"];

#[derive(Debug, Default, PartialEq)]
pub struct SplitData {
    pub train: Vec<PathBuf>,
    pub val: Vec<PathBuf>,
    pub test: Vec<PathBuf>,
}

impl SplitData {
    fn parts(&self) -> [(&'static str, &[PathBuf]); 3] {
        [
            ("train", self.train.as_slice()),
            ("val", self.val.as_slice()),
            ("test", self.test.as_slice()),
        ]
    }
}

#[derive(Debug, Default)]
pub struct SplitStats {
    pub train: usize,
    pub val: usize,
    pub test: usize,
    pub missing_labels: usize,
    pub failed: usize,
}

impl SplitStats {
    pub fn print_summary(&self) {
        info!(
            "Split into {} train / {} val / {} test ({} images without labels, {} copy failures)",
            self.train, self.val, self.test, self.missing_labels, self.failed
        );
    }
}

/// Shuffle with a seeded RNG and cut into three parts.
///
/// Val and test sizes are rounded up from their share of the total weight;
/// train takes the rest.
pub fn split_images(mut images: Vec<PathBuf>, config: &SplitConfig) -> SplitData {
    let mut rng = StdRng::seed_from_u64(config.seed);
    images.shuffle(&mut rng);

    let total = config.train + config.val + config.test;
    let n = images.len();
    let share = |w: f64| ((n as f64 * w / total).ceil() as usize).min(n);

    let test_size = share(config.test);
    let val_size = share(config.val).min(n - test_size);

    let test = images.drain(0..test_size).collect();
    let val = images.drain(0..val_size).collect();

    SplitData {
        train: images,
        val,
        test,
    }
}

fn copy_into(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, dst)?;
    Ok(())
}

/// Copy the dataset at `config.source_dir` into `<dest>/<split>/{images,labels}`
/// and point `data.yaml` at the new folders. The source is left untouched.
pub fn split_dataset(config: &SplitConfig) -> Result<SplitStats> {
    config.validate()?;

    let src_images = config.source_dir.join("images");
    let src_labels = config.source_dir.join("labels");
    let images = collect_images(&src_images);
    if images.is_empty() {
        warn!("No image files found in directory: {:?}", src_images);
    }

    let split = split_images(images, config);
    let missing = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    for (name, items) in split.parts() {
        if items.is_empty() {
            continue;
        }
        let dst_images = config.dest_dir.join(name).join("images");
        let dst_labels = config.dest_dir.join(name).join("labels");
        let pb = create_progress_bar(items.len() as u64, name);

        items.par_iter().for_each(|image| {
            let relative = image.strip_prefix(&src_images).unwrap_or(image);
            if let Err(e) = copy_into(image, &dst_images.join(relative)) {
                error!("Failed to copy {:?}: {}", image, e);
                failed.fetch_add(1, Relaxed);
            }

            let label = label_path_for(image, &src_images, &src_labels);
            if label.exists() {
                let dst = label_path_for(image, &src_images, &dst_labels);
                if let Err(e) = copy_into(&label, &dst) {
                    error!("Failed to copy {:?}: {}", label, e);
                    failed.fetch_add(1, Relaxed);
                }
            } else {
                missing.fetch_add(1, Relaxed);
            }
            pb.inc(1);
        });
        pb.finish_and_clear();
        info!("Wrote {} {} images", items.len(), name);
    }

    let src_yaml = config.source_dir.join("data.yaml");
    if src_yaml.exists() {
        let dst_yaml = config.dest_dir.join("data.yaml");
        copy_into(&src_yaml, &dst_yaml)?;

        let mut edits = vec![
            ("train", Value::from("train/images")),
            ("val", Value::from("val/images")),
        ];
        if !split.test.is_empty() {
            edits.push(("test", Value::from("test/images")));
        }
        update_data_yaml(&dst_yaml, &edits)?;
    } else {
        warn!("No data.yaml in {:?}; write one for the new splits by hand", config.source_dir);
    }

    Ok(SplitStats {
        train: split.train.len(),
        val: split.val.len(),
        test: split.test.len(),
        missing_labels: missing.into_inner(),
        failed: failed.into_inner(),
    })
}

/// Images under `<dir>/<split>/images` that have no label file in
/// `<dir>/<split>/labels`. Splits that don't exist are skipped.
pub fn check_dataset(dir: &Path) -> Vec<PathBuf> {
    let mut missing = Vec::new();

    for name in SPLITS {
        let split_dir = dir.join(name);
        if !split_dir.is_dir() {
            warn!("No {} directory found, skipping", name);
            continue;
        }

        let images_dir = split_dir.join("images");
        let labels_dir = split_dir.join("labels");
        for image in collect_images(&images_dir) {
            let label = label_path_for(&image, &images_dir, &labels_dir);
            if !label.exists() {
                error!("Missing label file for image: {:?} (Expected: {:?})", image, label);
                missing.push(image);
            }
        }
    }

    missing
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("img{}.jpg", i))).collect()
    }

    fn config(source_dir: PathBuf, dest_dir: PathBuf) -> SplitConfig {
        SplitConfig {
            source_dir,
            dest_dir,
            ..Default::default()
        }
    }

    #[test]
    fn test_split_sizes() {
        let cfg = config(PathBuf::new(), PathBuf::from("out"));
        let split = split_images(names(20), &cfg);
        assert_eq!(split.test.len(), 2);
        assert_eq!(split.val.len(), 2);
        assert_eq!(split.train.len(), 16);

        let split = split_images(names(5), &cfg);
        assert_eq!((split.train.len(), split.val.len(), split.test.len()), (3, 1, 1));
    }

    #[test]
    fn test_split_is_seeded() {
        let cfg = config(PathBuf::new(), PathBuf::from("out"));
        assert_eq!(split_images(names(30), &cfg), split_images(names(30), &cfg));
    }

    #[test]
    fn test_split_without_test_share() {
        let mut cfg = config(PathBuf::new(), PathBuf::from("out"));
        cfg.train = 0.9;
        cfg.val = 0.1;
        cfg.test = 0.0;
        let split = split_images(names(10), &cfg);
        assert!(split.test.is_empty());
        assert_eq!(split.val.len(), 1);
        assert_eq!(split.train.len(), 9);
    }

    #[test]
    fn test_split_dataset_on_disk() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("images")).unwrap();
        fs::create_dir_all(src.path().join("labels")).unwrap();
        for i in 0..10 {
            fs::write(src.path().join(format!("images/car{}.jpg", i)), b"jpg").unwrap();
            if i != 3 {
                let label = src.path().join(format!("labels/car{}.txt", i));
                fs::write(label, "0 0 0 1 0 1 1 0 1").unwrap();
            }
        }
        fs::write(src.path().join("data.yaml"), "nc: 1\nnames:\n- plate\n").unwrap();

        let out = dst.path().join("split");
        let stats = split_dataset(&config(src.path().to_path_buf(), out.clone())).unwrap();
        assert_eq!(stats.train + stats.val + stats.test, 10);
        assert_eq!((stats.val, stats.test), (1, 1));
        assert_eq!(stats.missing_labels, 1);
        assert_eq!(stats.failed, 0);

        let copied = collect_images(&out.join("train/images")).len()
            + collect_images(&out.join("val/images")).len()
            + collect_images(&out.join("test/images")).len();
        assert_eq!(copied, 10);
        assert_eq!(check_dataset(&out).len(), 1);

        let yaml = fs::read_to_string(out.join("data.yaml")).unwrap();
        let doc: Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(doc["train"].as_str(), Some("train/images"));
        assert_eq!(doc["test"].as_str(), Some("test/images"));
        assert_eq!(doc["nc"].as_u64(), Some(1));
    }
}
