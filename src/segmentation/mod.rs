pub mod grabcut;
pub mod max_flow;

use std::sync::Arc;

use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::{BorderType, Contour, find_contours};
use log::debug;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::{
    SegmentationConfig,
    error::{Result, VadaError},
    geometry::{Circle, fill_contour, largest_contour, min_enclosing_circle},
    image_utils::{apply_mask, count_nonzero, dark_pixels, mask_and, rgb_to_gray},
};

pub use grabcut::GrabCut;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrimapLabel {
    Background,
    Foreground,
    ProbableBackground,
    ProbableForeground,
}

impl TrimapLabel {
    pub fn is_foreground(self) -> bool {
        matches!(self, TrimapLabel::Foreground | TrimapLabel::ProbableForeground)
    }

    pub fn is_probable(self) -> bool {
        matches!(self, TrimapLabel::ProbableBackground | TrimapLabel::ProbableForeground)
    }
}

/// Axis-aligned seed region used as the weak foreground prior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl SeedRect {
    /// Central rectangle leaving `margin` of each dimension on every side.
    pub fn with_margin(width: u32, height: u32, margin: f64) -> Self {
        Self {
            x: (width as f64 * margin) as u32,
            y: (height as f64 * margin) as u32,
            width: (width as f64 * (1.0 - 2.0 * margin)) as u32,
            height: (height as f64 * (1.0 - 2.0 * margin)) as u32,
        }
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Four-way labelling produced by a [`ForegroundEstimator`], indexed `[[y, x]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Trimap {
    labels: Array2<TrimapLabel>,
}

impl Trimap {
    pub fn new(width: u32, height: u32, label: TrimapLabel) -> Self {
        Self {
            labels: Array2::from_elem((height as usize, width as usize), label),
        }
    }

    /// Definite background outside `rect`, probable foreground inside.
    pub fn from_rect(width: u32, height: u32, rect: &SeedRect) -> Self {
        let mut trimap = Self::new(width, height, TrimapLabel::Background);
        for y in 0..height {
            for x in 0..width {
                if rect.contains(x, y) {
                    trimap.set(x, y, TrimapLabel::ProbableForeground);
                }
            }
        }
        trimap
    }

    pub fn width(&self) -> u32 {
        self.labels.ncols() as u32
    }

    pub fn height(&self) -> u32 {
        self.labels.nrows() as u32
    }

    pub fn get(&self, x: u32, y: u32) -> TrimapLabel {
        self.labels[[y as usize, x as usize]]
    }

    pub fn set(&mut self, x: u32, y: u32, label: TrimapLabel) {
        self.labels[[y as usize, x as usize]] = label;
    }

    pub fn labels(&self) -> &Array2<TrimapLabel> {
        &self.labels
    }

    /// Counts in declaration order: background, foreground, probable
    /// background, probable foreground.
    pub fn label_counts(&self) -> [usize; 4] {
        let mut counts = [0usize; 4];
        for label in self.labels.iter() {
            let slot = match label {
                TrimapLabel::Background => 0,
                TrimapLabel::Foreground => 1,
                TrimapLabel::ProbableBackground => 2,
                TrimapLabel::ProbableForeground => 3,
            };
            counts[slot] += 1;
        }
        counts
    }

    /// Both background labels map to 0, both foreground labels to 255.
    pub fn to_mask(&self) -> GrayImage {
        let mut mask = GrayImage::new(self.width(), self.height());
        for ((y, x), label) in self.labels.indexed_iter() {
            if label.is_foreground() {
                mask.put_pixel(x as u32, y as u32, Luma([255]));
            }
        }
        mask
    }
}

/// Pluggable foreground/background separation. Implementations must be
/// reentrant: one instance may be shared by concurrent batch workers.
pub trait ForegroundEstimator: Send + Sync {
    fn estimate(&self, image: &RgbImage) -> Result<Trimap>;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct Segmentation {
    pub outer: Contour<i32>,
    pub hole: Option<Contour<i32>>,
    /// Filled interior of `outer`.
    pub foreground_mask: GrayImage,
    /// Every dark candidate pixel inside the foreground, not only the largest hole.
    pub hole_mask: GrayImage,
    pub trimap: Trimap,
}

impl Segmentation {
    pub fn outer_circle(&self) -> Option<Circle> {
        min_enclosing_circle(&self.outer.points)
    }

    pub fn hole_circle(&self) -> Option<Circle> {
        self.hole
            .as_ref()
            .and_then(|hole| min_enclosing_circle(&hole.points))
    }

    pub fn hole_diameter(&self) -> f64 {
        self.hole_circle().map(|c| c.diameter()).unwrap_or(0.0)
    }

    /// Foreground pixels minus hole candidate pixels. Can be zero or negative
    /// only for degenerate masks.
    pub fn net_area(&self) -> i64 {
        count_nonzero(&self.foreground_mask) as i64 - count_nonzero(&self.hole_mask) as i64
    }
}

pub struct VadaSegmenter {
    estimator: Arc<dyn ForegroundEstimator>,
    hole_threshold: u8,
}

impl VadaSegmenter {
    pub fn new<E: ForegroundEstimator + 'static>(estimator: E) -> Self {
        Self::from_shared(Arc::new(estimator))
    }

    pub fn from_shared(estimator: Arc<dyn ForegroundEstimator>) -> Self {
        Self {
            estimator,
            hole_threshold: 50,
        }
    }

    pub fn from_config(config: &SegmentationConfig) -> Self {
        let grabcut = GrabCut::new()
            .with_iterations(config.iterations)
            .with_margin(config.seed_margin);
        Self::new(grabcut).with_hole_threshold(config.hole_threshold)
    }

    pub fn with_hole_threshold(mut self, threshold: u8) -> Self {
        self.hole_threshold = threshold;
        self
    }

    pub fn estimator_name(&self) -> &str {
        self.estimator.name()
    }

    pub fn segment(&self, image: &RgbImage) -> Result<Segmentation> {
        let (width, height) = image.dimensions();
        let trimap = self.estimator.estimate(image)?;
        debug!(
            "{} trimap [bg, fg, pr_bg, pr_fg] = {:?}",
            self.estimator.name(),
            trimap.label_counts()
        );

        let binary = trimap.to_mask();
        let mut contours = external_contours(&binary);
        debug!("{} external contour(s) in foreground mask", contours.len());

        let index = largest_contour(&contours).ok_or(VadaError::NoForeground)?;
        let outer = contours.swap_remove(index);

        let foreground_mask = fill_contour(&outer.points, width, height);
        let hole_mask = self.hole_candidates(image, &foreground_mask);

        let mut hole_contours = external_contours(&hole_mask);
        let hole = largest_contour(&hole_contours).map(|i| hole_contours.swap_remove(i));
        debug!(
            "hole candidates: {} pixel(s), {} region(s)",
            count_nonzero(&hole_mask),
            hole_contours.len() + hole.iter().count()
        );

        Ok(Segmentation {
            outer,
            hole,
            foreground_mask,
            hole_mask,
            trimap,
        })
    }

    /// Dark pixels, thresholded only inside the object and clipped back to it.
    fn hole_candidates(&self, image: &RgbImage, foreground_mask: &GrayImage) -> GrayImage {
        let gray = rgb_to_gray(image);
        let object_only = apply_mask(&gray, foreground_mask);
        mask_and(&dark_pixels(&object_only, self.hole_threshold), foreground_mask)
    }
}

fn external_contours(mask: &GrayImage) -> Vec<Contour<i32>> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .collect()
}
