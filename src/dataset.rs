//! Crop every target-class polygon of a YOLO polygon dataset into its own
//! unwarped image.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use log::{debug, error, info, warn};
use rayon::prelude::*;

use crate::config::CropConfig;
use crate::error::Result;
use crate::geometry::Quad;
use crate::labels::{read_polygon_labels, LinePolicy};
use crate::transform::four_point_transform;
use crate::utils::{collect_images, create_progress_bar};

const MARKER_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const MARKER_RADIUS: i32 = 5;

#[derive(Debug, Default)]
pub struct CropStats {
    pub images: usize,
    pub crops: usize,
    pub missing_labels: usize,
    pub unreadable_images: usize,
    pub unreadable_labels: usize,
    pub skipped_lines: usize,
    pub failed_crops: usize,
}

impl CropStats {
    pub fn print_summary(&self) {
        info!(
            "Saved {} crops from {} images ({} without labels, {} unreadable images, \
             {} unreadable label files, {} bad lines, {} failed crops)",
            self.crops,
            self.images,
            self.missing_labels,
            self.unreadable_images,
            self.unreadable_labels,
            self.skipped_lines,
            self.failed_crops
        );
    }
}

#[derive(Default)]
struct Counters {
    crops: AtomicUsize,
    missing_labels: AtomicUsize,
    unreadable_images: AtomicUsize,
    unreadable_labels: AtomicUsize,
    skipped_lines: AtomicUsize,
    failed_crops: AtomicUsize,
}

/// Label file for `image_path`: same relative location under `labels_dir`,
/// extension swapped for `.txt`.
pub fn label_path_for(image_path: &Path, images_dir: &Path, labels_dir: &Path) -> PathBuf {
    let relative = image_path.strip_prefix(images_dir).unwrap_or(image_path);
    labels_dir.join(relative).with_extension("txt")
}

/// Output path of the `index`-th crop taken from `image_path`.
pub fn crop_path_for(image_path: &Path, config: &CropConfig, index: usize) -> PathBuf {
    let relative = image_path.strip_prefix(&config.images_dir).unwrap_or(image_path);
    let stem = relative.file_stem().unwrap_or_default().to_string_lossy();
    let parent = relative.parent().unwrap_or(Path::new(""));
    config
        .output_dir
        .join(parent)
        .join(format!("{}_obj{}.png", stem, index))
}

fn draw_quad(canvas: &mut RgbImage, quad: &Quad) {
    for (i, p) in quad.0.iter().enumerate() {
        let next = quad.0[(i + 1) % 4];
        draw_line_segment_mut(
            canvas,
            (p.x as f32, p.y as f32),
            (next.x as f32, next.y as f32),
            MARKER_COLOR,
        );
        draw_filled_circle_mut(canvas, (p.x as i32, p.y as i32), MARKER_RADIUS, MARKER_COLOR);
    }
}

fn save_crop(crop: &RgbImage, out: &Path) -> Result<()> {
    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent)?;
    }
    crop.save(out)?;
    Ok(())
}

/// Crop one image. Only a label file that cannot be read is returned as an
/// error; every per-polygon failure is logged and counted here.
fn process_image(image_path: &Path, config: &CropConfig, counters: &Counters) -> Result<()> {
    let label_path = label_path_for(image_path, &config.images_dir, &config.labels_dir);
    if !label_path.exists() {
        warn!(
            "No label file found for {:?}. Skipping. (Expected: {:?})",
            image_path, label_path
        );
        counters.missing_labels.fetch_add(1, Relaxed);
        return Ok(());
    }

    let img = match image::open(image_path) {
        Ok(img) => img.to_rgb8(),
        Err(e) => {
            warn!("Could not read image {:?}: {}. Skipping.", image_path, e);
            counters.unreadable_images.fetch_add(1, Relaxed);
            return Ok(());
        }
    };
    let (width, height) = img.dimensions();

    let labels = read_polygon_labels(&label_path, LinePolicy::Strict)?;
    counters.skipped_lines.fetch_add(labels.skipped, Relaxed);

    let mut annotated = config.annotate.then(|| img.clone());
    let mut saved = 0;
    let mut index = 0;

    for (line, polygon) in labels.polygons.iter().enumerate() {
        if polygon.class_id != config.target_class_id {
            continue;
        }
        let quad = Quad::from_normalized(&polygon.coords(), width, height);
        if let Some(canvas) = annotated.as_mut() {
            draw_quad(canvas, &quad);
        }

        match four_point_transform(&img, &quad.0, &config.spec) {
            Ok(crop) => {
                let out = crop_path_for(image_path, config, index);
                index += 1;
                match save_crop(&crop, &out) {
                    Ok(()) => {
                        debug!("Saved {:?} ({}x{})", out, crop.width(), crop.height());
                        saved += 1;
                    }
                    Err(e) => {
                        error!("Could not save crop {:?}: {}", out, e);
                        counters.failed_crops.fetch_add(1, Relaxed);
                    }
                }
            }
            Err(e) => {
                error!(
                    "Perspective crop failed for polygon {} in {:?}, coords {:?}: {}",
                    line + 1,
                    image_path,
                    quad.0,
                    e
                );
                counters.failed_crops.fetch_add(1, Relaxed);
            }
        }
    }

    if saved == 0 {
        info!(
            "No target objects (class ID {}) found or processed in {:?}",
            config.target_class_id, image_path
        );
    }
    counters.crops.fetch_add(saved, Relaxed);

    if let Some(canvas) = annotated {
        let first = crop_path_for(image_path, config, 0);
        let stem = image_path.file_stem().unwrap_or_default().to_string_lossy();
        let out = first.with_file_name(format!("{}_annotated.png", stem));
        if let Err(e) = save_crop(&canvas, &out) {
            error!("Could not save annotated image {:?}: {}", out, e);
        }
    }

    Ok(())
}

/// Crop every target-class polygon in the dataset described by `config`.
///
/// Images are processed in parallel. A bad image, label line or quadrilateral
/// is logged and counted; the batch always runs to the end.
pub fn crop_dataset(config: &CropConfig) -> Result<CropStats> {
    config.validate()?;
    fs::create_dir_all(&config.output_dir)?;

    let images = collect_images(&config.images_dir);
    if images.is_empty() {
        warn!("No image files found in directory: {:?}", config.images_dir);
    }

    let counters = Counters::default();
    let pb = create_progress_bar(images.len() as u64, "Cropping");

    images.par_iter().for_each(|image_path| {
        if let Err(e) = process_image(image_path, config, &counters) {
            error!("Could not read labels for {:?}: {}", image_path, e);
            counters.unreadable_labels.fetch_add(1, Relaxed);
        }
        pb.inc(1);
    });
    pb.finish_and_clear();

    Ok(CropStats {
        images: images.len(),
        crops: counters.crops.into_inner(),
        missing_labels: counters.missing_labels.into_inner(),
        unreadable_images: counters.unreadable_images.into_inner(),
        unreadable_labels: counters.unreadable_labels.into_inner(),
        skipped_lines: counters.skipped_lines.into_inner(),
        failed_crops: counters.failed_crops.into_inner(),
    })
}
