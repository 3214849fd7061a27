//! Error types shared by the cropping core and the dataset tools.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CropError>;

#[derive(Debug, Error)]
pub enum CropError {
    /// The four points do not describe a usable quadrilateral.
    #[error("geometry error: {0}")]
    Geometry(String),

    /// The resolved crop would exceed the per-warp pixel limit.
    #[error("crop of {width}x{height} exceeds the output size limit")]
    OutputTooLarge { width: u32, height: u32 },

    /// Invalid crop or dataset configuration, reported before any work starts.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("malformed label in {path:?} (line {line}): {reason}")]
    Label {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("data.yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CropError::Geometry("collinear corners".to_string());
        assert_eq!(err.to_string(), "geometry error: collinear corners");

        let err = CropError::OutputTooLarge {
            width: 90000,
            height: 90000,
        };
        assert_eq!(err.to_string(), "crop of 90000x90000 exceeds the output size limit");

        let err = CropError::Label {
            path: PathBuf::from("a.txt"),
            line: 3,
            reason: "expected 9 values".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "malformed label in \"a.txt\" (line 3): expected 9 values"
        );
    }
}
