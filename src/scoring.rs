//! Four-factor perfection index.
//!
//! `S_size = D_avg / W`, `S_shape = 4π·A / P²`, `S_hole = 1 − D_hole / D_avg`
//! and `S_color = 1 − |ρ_ideal − ρ_gb|`, combined with fixed weights. Zero
//! denominators give a zero sub-score instead of an error. `S_size` is not
//! clamped above 1 and `S_color` not below 0.

use std::f64::consts::PI;

use image::RgbImage;
use imageproc::geometry::arc_length;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    config::{ScoreWeights, ScoringConfig},
    image_utils::{count_nonzero, in_range, mask_and, rgb_to_hsv},
    segmentation::Segmentation,
};

/// Raw quantities the sub-scores are derived from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    pub image_width: u32,
    /// Minimum enclosing circle diameter of the outer contour.
    pub d_avg: f64,
    pub d_hole: f64,
    pub net_area: i64,
    pub perimeter: f64,
    pub golden_brown_pixels: u64,
    pub golden_brown_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreSet {
    pub size: f64,
    pub shape: f64,
    pub hole: f64,
    pub color: f64,
    /// Standardized perfection index, 0..100 for sub-scores in 0..1.
    pub vpi: f64,
}

impl ScoreSet {
    pub fn from_components(size: f64, shape: f64, hole: f64, color: f64, weights: &ScoreWeights) -> Self {
        Self {
            size,
            shape,
            hole,
            color,
            vpi: weights.index(size, shape, hole, color),
        }
    }
}

pub struct Scorer {
    config: ScoringConfig,
}

impl Scorer {
    pub fn new() -> Self {
        Self {
            config: ScoringConfig::default(),
        }
    }

    pub fn with_config(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn score(&self, image: &RgbImage, segmentation: &Segmentation) -> ScoreSet {
        let measurements = self.measure(image, segmentation);
        self.score_measurements(&measurements)
    }

    pub fn measure(&self, image: &RgbImage, segmentation: &Segmentation) -> Measurements {
        let d_avg = segmentation.outer_circle().map(|c| c.diameter()).unwrap_or(0.0);
        let d_hole = segmentation.hole_diameter();
        let net_area = segmentation.net_area();
        let perimeter = arc_length(&segmentation.outer.points, true);

        let hsv = rgb_to_hsv(image);
        let golden = in_range(&hsv, &self.config.golden_brown);
        let golden_brown_pixels = count_nonzero(&mask_and(&golden, &segmentation.foreground_mask));
        let golden_brown_ratio = if net_area > 0 {
            golden_brown_pixels as f64 / net_area as f64
        } else {
            0.0
        };

        let measurements = Measurements {
            image_width: image.width(),
            d_avg,
            d_hole,
            net_area,
            perimeter,
            golden_brown_pixels,
            golden_brown_ratio,
        };
        debug!("{:?}", measurements);
        measurements
    }

    pub fn score_measurements(&self, m: &Measurements) -> ScoreSet {
        let size = if m.image_width > 0 {
            m.d_avg / m.image_width as f64
        } else {
            0.0
        };

        let shape = if m.perimeter > 0.0 {
            4.0 * PI * m.net_area as f64 / (m.perimeter * m.perimeter)
        } else {
            warn!("outer contour has zero perimeter, shape score set to 0");
            0.0
        };

        let hole = if m.d_avg > 0.0 {
            1.0 - m.d_hole / m.d_avg
        } else {
            warn!("enclosing circle has zero diameter, hole score set to 0");
            0.0
        };

        if m.net_area <= 0 {
            warn!("net area is {}, golden-brown ratio set to 0", m.net_area);
        }
        let color = 1.0 - (self.config.ideal_golden_ratio - m.golden_brown_ratio).abs();

        ScoreSet::from_components(size, shape, hole, color, &self.config.weights)
    }
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new()
    }
}
