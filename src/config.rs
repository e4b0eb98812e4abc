//! Tunable parameters for segmentation, scoring and annotation.
//!
//! Defaults reproduce the standardized index. A configuration can be kept
//! next to a batch of results as JSON:
//!
//! ```no_run
//! use vada_scope::AnalysisConfig;
//!
//! let config = AnalysisConfig::from_json_file("vada.json")?;
//! config.validate()?;
//! # Ok::<(), vada_scope::error::VadaError>(())
//! ```

use std::{fs, path::{Path, PathBuf}};

use serde::{Deserialize, Serialize};

use crate::error::{Result, VadaError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub segmentation: SegmentationConfig,
    pub scoring: ScoringConfig,
    pub annotation: AnnotationConfig,
    /// Directory receiving annotated images and reports.
    pub output_dir: PathBuf,
    /// Only affects [`crate::VadaAnalyzer::analyze_batch`].
    pub parallel: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            segmentation: SegmentationConfig::default(),
            scoring: ScoringConfig::default(),
            annotation: AnnotationConfig::default(),
            output_dir: PathBuf::from("analyzed_results"),
            parallel: true,
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn with_output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        let seg = &self.segmentation;
        if !(seg.seed_margin > 0.0 && seg.seed_margin < 0.5) {
            return Err(VadaError::InvalidParameter(format!(
                "seed margin must be in (0, 0.5), got {}",
                seg.seed_margin
            )));
        }
        if seg.iterations == 0 {
            return Err(VadaError::InvalidParameter(
                "at least one refinement iteration is required".into(),
            ));
        }

        let w = &self.scoring.weights;
        if [w.size, w.shape, w.hole, w.color].iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(VadaError::InvalidParameter(
                "score weights must be finite and non-negative".into(),
            ));
        }

        let range = &self.scoring.golden_brown;
        if (0..3).any(|c| range.lower[c] > range.upper[c]) {
            return Err(VadaError::InvalidParameter(format!(
                "HSV lower bound {:?} exceeds upper bound {:?}",
                range.lower, range.upper
            )));
        }

        if self.annotation.thickness == 0 {
            return Err(VadaError::InvalidParameter("contour thickness must be positive".into()));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Graph-cut refinement rounds.
    pub iterations: usize,
    /// Fraction of width/height left outside the seed rectangle on each side.
    pub seed_margin: f64,
    /// Grayscale values below this inside the object count as hole.
    pub hole_threshold: u8,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            iterations: 5,
            seed_margin: 0.1,
            hole_threshold: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub size: f64,
    pub shape: f64,
    pub hole: f64,
    pub color: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            size: 0.01,
            shape: 0.40,
            hole: 0.30,
            color: 0.29,
        }
    }
}

impl ScoreWeights {
    /// Weighted sum scaled to 0..100.
    pub fn index(&self, size: f64, shape: f64, hole: f64, color: f64) -> f64 {
        100.0 * (self.size * size + self.shape * shape + self.hole * hole + self.color * color)
    }
}

/// Inclusive band in 8-bit HSV (hue 0..180).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub fn golden_brown() -> Self {
        Self {
            lower: [10, 80, 50],
            upper: [30, 255, 200],
        }
    }

    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| hsv[c] >= self.lower[c] && hsv[c] <= self.upper[c])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: ScoreWeights,
    pub golden_brown: HsvRange,
    pub ideal_golden_ratio: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            golden_brown: HsvRange::golden_brown(),
            ideal_golden_ratio: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    pub outer_color: [u8; 3],
    pub hole_color: [u8; 3],
    pub text_color: [u8; 3],
    pub thickness: u32,
    pub draw_text: bool,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            outer_color: [0, 255, 0],
            hole_color: [255, 0, 0],
            text_color: [255, 255, 0],
            thickness: 3,
            draw_text: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.segmentation.iterations, 5);
        assert_eq!(config.scoring.golden_brown, HsvRange::golden_brown());
        let w = config.scoring.weights;
        assert!((w.size + w.shape + w.hole + w.color - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AnalysisConfig::default();
        config.segmentation.seed_margin = 0.5;
        assert!(config.validate().is_err());

        // a zero margin leaves no background seed
        config.segmentation.seed_margin = 0.0;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.scoring.weights.hole = -0.1;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.scoring.golden_brown.lower[0] = 40;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.segmentation.iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{ "segmentation": { "iterations": 3 }, "parallel": false }"#).unwrap();
        assert_eq!(config.segmentation.iterations, 3);
        assert_eq!(config.segmentation.hole_threshold, 50);
        assert!(!config.parallel);
        assert_eq!(config.output_dir, PathBuf::from("analyzed_results"));
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = AnalysisConfig::default().with_output_dir("out");
        config.to_json_file(&path).unwrap();
        assert_eq!(AnalysisConfig::from_json_file(&path).unwrap(), config);
    }

    #[test]
    fn test_hsv_range_contains() {
        let range = HsvRange::golden_brown();
        assert!(range.contains([15, 179, 200]));
        assert!(!range.contains([4, 200, 180]));
    }
}
