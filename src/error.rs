use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VadaError {
    #[error("Image loading error: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("No foreground object found after segmentation")]
    NoForeground,

    #[error("Image too small for analysis ({width}x{height})")]
    ImageTooSmall { width: u32, height: u32 },

    #[error("Style transfer failed: {0}")]
    StyleTransfer(String),
}

impl VadaError {
    /// Missing, unreadable or undecodable input.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            VadaError::ImageLoad(_) | VadaError::InputNotFound(_) | VadaError::ImageTooSmall { .. }
        )
    }

    pub fn is_segmentation_failure(&self) -> bool {
        matches!(self, VadaError::NoForeground)
    }
}

pub type Result<T> = std::result::Result<T, VadaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_taxonomy() {
        assert!(VadaError::InputNotFound(PathBuf::from("missing.png")).is_input_error());
        assert!(VadaError::ImageTooSmall { width: 1, height: 1 }.is_input_error());
        assert!(VadaError::NoForeground.is_segmentation_failure());
        assert!(!VadaError::NoForeground.is_input_error());
        assert!(!VadaError::StyleTransfer("boom".into()).is_segmentation_failure());
    }

    #[test]
    fn test_error_messages() {
        let err = VadaError::InputNotFound(PathBuf::from("a/b.png"));
        assert_eq!(err.to_string(), "Input file not found: a/b.png");
        let err = VadaError::ImageTooSmall { width: 2, height: 3 };
        assert_eq!(err.to_string(), "Image too small for analysis (2x3)");
    }
}
