//! Batch conversion of four-point polygon labels into box, oriented-box or
//! keypoint labels.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};

use clap::ValueEnum;
use glob::glob;
use log::{error, info, warn};
use rayon::prelude::*;
use serde_yaml::Value;

use crate::error::{CropError, Result};
use crate::geometry::{bounding_box, min_area_rect};
use crate::labels::{
    format_bbox, format_obb, format_pose, read_polygon_labels, relabel_line, LinePolicy,
    PolygonLabel,
};
use crate::utils::{create_progress_bar, update_data_yaml};

/// Keypoints per object and values per keypoint (`x y visibility`).
pub const KPT_SHAPE: [u32; 2] = [4, 3];

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum LabelFormat {
    /// Axis-aligned bounding box
    Bbox,
    /// Minimum-area rotated box
    Obb,
    /// Bounding box plus the four corners as keypoints
    Pose,
}

impl LabelFormat {
    /// Box and keypoint outputs only read the first four corners, so extra
    /// values are dropped. A rotated box fitted to a polygon with trailing
    /// values would silently ignore part of it, so those lines are rejected.
    pub fn line_policy(self) -> LinePolicy {
        match self {
            LabelFormat::Obb => LinePolicy::Strict,
            LabelFormat::Bbox | LabelFormat::Pose => LinePolicy::Truncate,
        }
    }
}

#[derive(Debug, Default)]
pub struct RelabelStats {
    pub files: usize,
    pub failed_files: usize,
    pub changed_lines: usize,
}

impl RelabelStats {
    pub fn print_summary(&self) {
        info!(
            "Relabelled {} lines in {} files ({} files failed)",
            self.changed_lines, self.files, self.failed_files
        );
    }
}

#[derive(Debug, Default)]
pub struct ConversionStats {
    pub files: usize,
    pub failed_files: usize,
    pub objects: usize,
    pub skipped_lines: usize,
}

impl ConversionStats {
    pub fn print_summary(&self) {
        info!(
            "Converted {} objects in {} files ({} files failed, {} lines skipped)",
            self.objects, self.files, self.failed_files, self.skipped_lines
        );
    }
}

/// Render one polygon in the target format. Coordinates stay normalized.
pub fn convert_polygon(label: &PolygonLabel, format: LabelFormat) -> String {
    let bb = bounding_box(&label.points);
    match format {
        LabelFormat::Bbox => format_bbox(label.class_id, &bb),
        LabelFormat::Pose => format_pose(label.class_id, &bb, &label.points),
        LabelFormat::Obb => match min_area_rect(&label.points) {
            Some(rect) => format_obb(label.class_id, &rect),
            None => format_bbox(label.class_id, &bb),
        },
    }
}

fn convert_file(src: &Path, dst: &Path, format: LabelFormat) -> Result<(usize, usize)> {
    let labels = read_polygon_labels(src, format.line_policy())?;
    let lines: Vec<String> = labels
        .polygons
        .iter()
        .map(|label| convert_polygon(label, format))
        .collect();
    fs::write(dst, lines.join("\n"))?;
    Ok((lines.len(), labels.skipped))
}

/// Convert every `.txt` label in `src_dir` into `dst_dir`.
///
/// Files are independent and converted in parallel; a failing file is logged
/// and counted without stopping the rest.
pub fn convert_labels(
    src_dir: &Path,
    dst_dir: &Path,
    format: LabelFormat,
) -> Result<ConversionStats> {
    fs::create_dir_all(dst_dir)?;

    let mut label_files: Vec<_> = fs::read_dir(src_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    label_files.sort();

    let pb = create_progress_bar(label_files.len() as u64, &format!("{:?}", format));
    let objects = AtomicUsize::new(0);
    let skipped = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    label_files.par_iter().for_each(|src| {
        let Some(name) = src.file_name() else {
            return;
        };
        match convert_file(src, &dst_dir.join(name), format) {
            Ok((converted, skipped_lines)) => {
                objects.fetch_add(converted, Relaxed);
                skipped.fetch_add(skipped_lines, Relaxed);
            }
            Err(e) => {
                error!("Failed to convert {:?}: {}", src, e);
                failed.fetch_add(1, Relaxed);
            }
        }
        pb.inc(1);
    });
    pb.finish_and_clear();

    Ok(ConversionStats {
        files: label_files.len(),
        failed_files: failed.into_inner(),
        objects: objects.into_inner(),
        skipped_lines: skipped.into_inner(),
    })
}

fn relabel_file(path: &Path, old_class: u32, new_class: u32) -> Result<usize> {
    let content = fs::read_to_string(path)?;
    let mut changed = 0;
    let lines: Vec<String> = content
        .lines()
        .map(|line| {
            let (out, hit) = relabel_line(line, old_class, new_class);
            changed += hit as usize;
            out
        })
        .collect();
    if changed > 0 {
        fs::write(path, lines.join("\n"))?;
    }
    Ok(changed)
}

/// Rewrite class `old_class` to `new_class` in every `.txt` file under
/// `labels_dir`, recursively and in place.
pub fn relabel_labels(labels_dir: &Path, old_class: u32, new_class: u32) -> Result<RelabelStats> {
    if !labels_dir.is_dir() {
        return Err(CropError::Configuration(format!(
            "labels directory does not exist: {:?}",
            labels_dir
        )));
    }

    let pattern = labels_dir.join("**").join("*.txt");
    let mut label_files: Vec<_> = glob(&pattern.to_string_lossy())
        .map_err(|e| CropError::Configuration(e.to_string()))?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();
    label_files.sort();

    let pb = create_progress_bar(label_files.len() as u64, "Relabel");
    let changed = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    label_files.par_iter().for_each(|path| {
        match relabel_file(path, old_class, new_class) {
            Ok(n) => {
                changed.fetch_add(n, Relaxed);
            }
            Err(e) => {
                error!("Failed to relabel {:?}: {}", path, e);
                failed.fetch_add(1, Relaxed);
            }
        }
        pb.inc(1);
    });
    pb.finish_and_clear();

    Ok(RelabelStats {
        files: label_files.len(),
        failed_files: failed.into_inner(),
        changed_lines: changed.into_inner(),
    })
}

/// Record the keypoint layout in the dataset's `data.yaml`.
pub fn write_kpt_shape(data_yaml: &Path) -> Result<()> {
    let shape = Value::Sequence(KPT_SHAPE.iter().map(|&n| Value::from(n)).collect());
    if update_data_yaml(data_yaml, &[("kpt_shape", shape)])? {
        info!("Added kpt_shape {:?} to {:?}", KPT_SHAPE, data_yaml);
    } else {
        warn!("Pose labels written without kpt_shape; add it to data.yaml by hand");
    }
    Ok(())
}
