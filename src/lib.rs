use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use image::{DynamicImage, RgbImage};
use log::{debug, info};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::{
    error::{Result, VadaError},
    report::{AnalysisRecord, annotate::Annotator, dashboard::Dashboard},
    scoring::{Measurements, ScoreSet, Scorer},
    segmentation::{ForegroundEstimator, Segmentation, VadaSegmenter},
    style_transfer::{ResizeTransfer, StyleTransfer},
};

pub mod config;
pub mod error;
pub mod geometry;
pub mod image_utils;
pub mod report;
pub mod scoring;
pub mod segmentation;
pub mod style_transfer;

pub use config::{AnalysisConfig, AnnotationConfig, HsvRange, ScoreWeights, ScoringConfig, SegmentationConfig};

/// End-to-end pipeline: style transfer, segmentation, scoring, annotation.
///
/// The translation step is injected and shared; everything else is built
/// from [`AnalysisConfig`]. One image is processed synchronously per call.
pub struct VadaAnalyzer {
    transfer: Arc<dyn StyleTransfer>,
    /// Set by [`VadaAnalyzer::with_estimator`]; survives later config changes.
    estimator: Option<Arc<dyn ForegroundEstimator>>,
    segmenter: VadaSegmenter,
    scorer: Scorer,
    annotator: Annotator,
    config: AnalysisConfig,
}

impl VadaAnalyzer {
    pub fn new(transfer: Arc<dyn StyleTransfer>) -> Self {
        let config = AnalysisConfig::default();
        Self {
            transfer,
            estimator: None,
            segmenter: VadaSegmenter::from_config(&config.segmentation),
            scorer: Scorer::with_config(config.scoring.clone()),
            annotator: Annotator::with_config(config.annotation.clone()),
            config,
        }
    }

    pub fn with_config(mut self, config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        self.segmenter = self.build_segmenter();
        self.scorer = Scorer::with_config(self.config.scoring.clone());
        self.annotator = Annotator::with_config(self.config.annotation.clone());
        Ok(self)
    }

    /// Replaces the foreground estimator. The scorer is unaffected, and a
    /// later [`VadaAnalyzer::with_config`] only updates the hole threshold.
    pub fn with_estimator<E: ForegroundEstimator + 'static>(mut self, estimator: E) -> Self {
        self.estimator = Some(Arc::new(estimator));
        self.segmenter = self.build_segmenter();
        self
    }

    fn build_segmenter(&self) -> VadaSegmenter {
        match &self.estimator {
            Some(estimator) => VadaSegmenter::from_shared(Arc::clone(estimator))
                .with_hole_threshold(self.config.segmentation.hole_threshold),
            None => VadaSegmenter::from_config(&self.config.segmentation),
        }
    }

    pub fn with_transfer(mut self, transfer: Arc<dyn StyleTransfer>) -> Self {
        self.transfer = transfer;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Runs the pipeline in memory without touching the filesystem.
    pub fn evaluate(&self, image: &DynamicImage) -> Result<Evaluation> {
        let (width, height) = (image.width(), image.height());
        if width < 2 || height < 2 {
            return Err(VadaError::ImageTooSmall { width, height });
        }

        let translated = self.transfer.transfer(image)?;
        if let Some(expected) = self.transfer.output_size() {
            if translated.dimensions() != expected {
                return Err(VadaError::StyleTransfer(format!(
                    "{} produced {}x{}, expected {}x{}",
                    self.transfer.name(),
                    translated.width(),
                    translated.height(),
                    expected.0,
                    expected.1
                )));
            }
        }
        debug!(
            "{} -> {}x{}, segmenting with {}",
            self.transfer.name(),
            translated.width(),
            translated.height(),
            self.segmenter.estimator_name()
        );

        let segmentation = self.segmenter.segment(&translated)?;
        let measurements = self.scorer.measure(&translated, &segmentation);
        let scores = self.scorer.score_measurements(&measurements);
        let annotated = self.annotator.annotate(&translated, &segmentation, &scores);

        Ok(Evaluation {
            scores,
            measurements,
            segmentation,
            translated,
            annotated,
        })
    }

    /// Analyzes one file and persists `annotated_<stem>.png` under the output directory.
    pub fn analyze_path<P: AsRef<Path>>(&self, path: P) -> Result<VadaAnalysis> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(VadaError::InputNotFound(path.to_path_buf()));
        }

        let image = image::open(path)?;
        let filename = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "image".to_string());

        self.analyze_image(&image, &filename)
    }

    pub fn analyze_image(&self, image: &DynamicImage, filename: &str) -> Result<VadaAnalysis> {
        let evaluation = self.evaluate(image)?;

        fs::create_dir_all(&self.config.output_dir)?;
        let annotated_image_path = self
            .config
            .output_dir
            .join(format!("annotated_{}.png", filename));
        evaluation.annotated.save(&annotated_image_path)?;

        info!("{}: VPI-S {:.2}", filename, evaluation.scores.vpi);

        Ok(VadaAnalysis {
            filename: filename.to_string(),
            evaluation,
            annotated_image_path,
        })
    }

    /// Analyzes independent files, in parallel when the configuration allows.
    /// Results keep the input order.
    pub fn analyze_batch<P: AsRef<Path> + Sync>(&self, paths: &[P]) -> Vec<(PathBuf, Result<VadaAnalysis>)> {
        let run = |p: &P| (p.as_ref().to_path_buf(), self.analyze_path(p));

        if self.config.parallel {
            paths.par_iter().map(run).collect()
        } else {
            paths.iter().map(run).collect()
        }
    }
}

impl Default for VadaAnalyzer {
    fn default() -> Self {
        Self::new(Arc::new(ResizeTransfer::new()))
    }
}

/// In-memory result of one pipeline run.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub scores: ScoreSet,
    pub measurements: Measurements,
    pub segmentation: Segmentation,
    /// The image the measurements were taken on.
    pub translated: RgbImage,
    pub annotated: RgbImage,
}

#[derive(Debug, Clone)]
pub struct VadaAnalysis {
    pub filename: String,
    pub evaluation: Evaluation,
    pub annotated_image_path: PathBuf,
}

impl VadaAnalysis {
    pub fn scores(&self) -> &ScoreSet {
        &self.evaluation.scores
    }

    pub fn record(&self) -> AnalysisRecord {
        AnalysisRecord::from(self)
    }

    pub fn save_dashboard<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        Dashboard::new().save(&self.evaluation.annotated, &self.evaluation.scores, path)
    }
}
