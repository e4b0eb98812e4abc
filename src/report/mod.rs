pub mod annotate;
pub mod dashboard;
pub mod glyphs;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize, Serializer};

use crate::{VadaAnalysis, error::Result};

fn two_decimals<S: Serializer>(value: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64((value * 100.0).round() / 100.0)
}

/// Structured outcome handed to reporting consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub filename: String,
    #[serde(rename = "VPI_S", serialize_with = "two_decimals")]
    pub vpi_s: f64,
    #[serde(rename = "S_size")]
    pub s_size: f64,
    #[serde(rename = "S_shape")]
    pub s_shape: f64,
    #[serde(rename = "S_hole")]
    pub s_hole: f64,
    #[serde(rename = "S_color")]
    pub s_color: f64,
    pub annotated_image_path: PathBuf,
}

impl From<&VadaAnalysis> for AnalysisRecord {
    fn from(analysis: &VadaAnalysis) -> Self {
        let scores = &analysis.evaluation.scores;
        Self {
            filename: analysis.filename.clone(),
            vpi_s: scores.vpi,
            s_size: scores.size,
            s_shape: scores.shape,
            s_hole: scores.hole,
            s_color: scores.color,
            annotated_image_path: analysis.annotated_image_path.clone(),
        }
    }
}

impl AnalysisRecord {
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedAnalysis {
    pub path: PathBuf,
    pub reason: String,
}

/// Summary of a batch run: every input lands in exactly one of the two lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub analyzed: Vec<AnalysisRecord>,
    pub failed: Vec<FailedAnalysis>,
}

impl BatchReport {
    pub fn from_results(results: &[(PathBuf, Result<VadaAnalysis>)]) -> Self {
        let mut report = Self::default();
        for (path, result) in results {
            match result {
                Ok(analysis) => report.analyzed.push(AnalysisRecord::from(analysis)),
                Err(err) => report.failed.push(FailedAnalysis {
                    path: path.clone(),
                    reason: err.to_string(),
                }),
            }
        }
        report
    }

    pub fn mean_vpi(&self) -> Option<f64> {
        if self.analyzed.is_empty() {
            return None;
        }
        Some(self.analyzed.iter().map(|r| r.vpi_s).sum::<f64>() / self.analyzed.len() as f64)
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VadaError;

    fn record(vpi: f64) -> AnalysisRecord {
        AnalysisRecord {
            filename: "vada".into(),
            vpi_s: vpi,
            s_size: 0.5,
            s_shape: 0.9,
            s_hole: 1.0,
            s_color: 0.95,
            annotated_image_path: PathBuf::from("out/annotated_vada.png"),
        }
    }

    #[test]
    fn test_record_uses_consumer_keys_and_rounds_index() {
        let json = record(87.45678).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["VPI_S"], serde_json::json!(87.46));
        assert_eq!(value["S_hole"], serde_json::json!(1.0));
        assert_eq!(value["filename"], "vada");
        assert_eq!(value["annotated_image_path"], "out/annotated_vada.png");
    }

    #[test]
    fn test_batch_report_mean() {
        let report = BatchReport {
            analyzed: vec![record(60.0), record(80.0)],
            failed: vec![FailedAnalysis { path: "x.png".into(), reason: VadaError::NoForeground.to_string() }],
        };
        assert_eq!(report.mean_vpi(), Some(70.0));
        assert_eq!(BatchReport::default().mean_vpi(), None);
        assert!(report.to_json().unwrap().contains("No foreground object"));
    }
}
