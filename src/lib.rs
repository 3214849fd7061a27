pub mod cli;
pub mod config;
pub mod convert;
pub mod crop;
pub mod dataset;
pub mod error;
pub mod geometry;
pub mod labels;
pub mod split;
pub mod transform;
pub mod utils;

pub use cli::Cli;
pub use config::{CropConfig, SplitConfig};
pub use convert::{convert_labels, relabel_labels, LabelFormat};
pub use crop::{resolve_output_size, CropSpec, Gain};
pub use dataset::crop_dataset;
pub use error::{CropError, Result};
pub use geometry::{order_corners, Point, Quad};
pub use split::{check_dataset, split_dataset};
pub use transform::{four_point_transform, perspective_matrix, warp_perspective};
