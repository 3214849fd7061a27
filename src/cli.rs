use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{CropConfig, SplitConfig};
use crate::convert::LabelFormat;
use crate::crop::{CropSpec, Gain};

#[derive(Parser, Debug)]
#[command(name = "plate-warp")]
#[command(
    version,
    about = "License plate dataset tools: perspective crops, label conversion and splitting"
)]
pub struct Cli {
    /// Show per-item details
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Crop and unwarp every target polygon of a YOLO polygon dataset
    Crop(CropArgs),
    /// Convert 4-point polygon labels to bbox, obb or pose labels
    Convert(ConvertArgs),
    /// Rewrite one class ID to another in every label file, in place
    Relabel(RelabelArgs),
    /// Split an images/labels dataset into train, val and test
    Split(SplitArgs),
    /// List images that have no matching label file
    Check(CheckArgs),
}

#[derive(Args, Debug)]
pub struct CropArgs {
    /// Directory of source images (searched recursively)
    #[arg(long)]
    pub images: PathBuf,

    /// Directory of YOLO polygon labels mirroring the images layout
    #[arg(long)]
    pub labels: PathBuf,

    /// Directory for the cropped images
    #[arg(short, long, default_value = "cropped_objects")]
    pub output: PathBuf,

    /// Class ID of the objects to crop
    #[arg(long, default_value_t = 0)]
    pub class_id: u32,

    /// Fixed output size (e.g., "300x100"); overrides the dynamic options
    #[arg(long, value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Maximum crop width under automatic gain (0 disables the cap)
    #[arg(long, default_value_t = 640)]
    pub max_width: u32,

    /// Maximum crop height under automatic gain (0 disables the cap)
    #[arg(long, default_value_t = 640)]
    pub max_height: u32,

    /// Scale-down factor, or "auto" / -1 to fit the maximum size
    #[arg(long, default_value = "auto", value_parser = Gain::parse, allow_hyphen_values = true)]
    pub gain: Gain,

    /// Also save each source image with the polygons drawn on it
    #[arg(long)]
    pub annotate: bool,
}

impl CropArgs {
    pub fn spec(&self) -> CropSpec {
        match self.size {
            Some((width, height)) => CropSpec::Fixed { width, height },
            None => CropSpec::Dynamic {
                max_width: self.max_width,
                max_height: self.max_height,
                gain: self.gain,
            },
        }
    }

    pub fn to_config(&self) -> CropConfig {
        CropConfig {
            images_dir: self.images.clone(),
            labels_dir: self.labels.clone(),
            output_dir: self.output.clone(),
            target_class_id: self.class_id,
            spec: self.spec(),
            annotate: self.annotate,
        }
    }
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Directory of polygon label files
    #[arg(long)]
    pub labels: PathBuf,

    /// Directory for the converted label files
    #[arg(short, long)]
    pub output: PathBuf,

    /// Target label format
    #[arg(short, long, value_enum, default_value = "bbox")]
    pub format: LabelFormat,

    /// data.yaml to receive kpt_shape when converting to pose
    #[arg(long)]
    pub data_yaml: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RelabelArgs {
    /// Directory of label files (searched recursively)
    #[arg(long)]
    pub labels: PathBuf,

    /// Class ID to replace
    #[arg(long)]
    pub from: u32,

    /// Class ID to write instead
    #[arg(long)]
    pub to: u32,
}

#[derive(Args, Debug)]
pub struct SplitArgs {
    /// Dataset root holding images/, labels/ and data.yaml
    #[arg(long)]
    pub source: PathBuf,

    /// Destination root for the train/val/test folders
    #[arg(long)]
    pub dest: PathBuf,

    /// Train share
    #[arg(long, default_value_t = 0.8)]
    pub train: f64,

    /// Validation share
    #[arg(long, default_value_t = 0.1)]
    pub val: f64,

    /// Test share
    #[arg(long, default_value_t = 0.1)]
    pub test: f64,

    /// Seed for shuffling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl SplitArgs {
    pub fn to_config(&self) -> SplitConfig {
        SplitConfig {
            source_dir: self.source.clone(),
            dest_dir: self.dest.clone(),
            train: self.train,
            val: self.val,
            test: self.test,
            seed: self.seed,
        }
    }
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Split dataset root (containing train/, val/, test/)
    pub dataset: PathBuf,
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let parts: Vec<&str> = s.split(['x', 'X']).collect();
    if parts.len() != 2 {
        return Err(format!("Invalid size format '{}', expected WxH", s));
    }

    let width: u32 = parts[0]
        .parse()
        .map_err(|_| format!("Invalid width value: {}", parts[0]))?;
    let height: u32 = parts[1]
        .parse()
        .map_err(|_| format!("Invalid height value: {}", parts[1]))?;

    if width == 0 || height == 0 {
        return Err("Size values must be positive".to_string());
    }

    Ok((width, height))
}
