use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_filled_circle_mut, point::Point};

use super::glyphs::{draw_text, text_height};
use crate::{config::AnnotationConfig, scoring::ScoreSet, segmentation::Segmentation};

/// Burns contours and the final index into a copy of the analyzed image.
pub struct Annotator {
    config: AnnotationConfig,
}

impl Annotator {
    pub fn new() -> Self {
        Self {
            config: AnnotationConfig::default(),
        }
    }

    pub fn with_config(config: AnnotationConfig) -> Self {
        Self { config }
    }

    pub fn annotate(&self, image: &RgbImage, segmentation: &Segmentation, scores: &ScoreSet) -> RgbImage {
        let mut annotated = image.clone();

        self.draw_contour(&mut annotated, &segmentation.outer.points, Rgb(self.config.outer_color));
        if let Some(hole) = &segmentation.hole {
            self.draw_contour(&mut annotated, &hole.points, Rgb(self.config.hole_color));
        }

        if self.config.draw_text {
            let scale = (image.width() / 128).max(1);
            let margin = (20 * scale as i32 / 2).min(image.height() as i32 - text_height(scale) as i32).max(0);
            draw_text(
                &mut annotated,
                margin,
                margin,
                &score_caption(scores.vpi),
                scale,
                Rgb(self.config.text_color),
            );
        }

        annotated
    }

    fn draw_contour(&self, image: &mut RgbImage, points: &[Point<i32>], color: Rgb<u8>) {
        let radius = (self.config.thickness / 2) as i32;
        for p in points {
            if radius == 0 {
                if p.x >= 0 && p.y >= 0 && (p.x as u32) < image.width() && (p.y as u32) < image.height() {
                    image.put_pixel(p.x as u32, p.y as u32, color);
                }
            } else {
                draw_filled_circle_mut(image, (p.x, p.y), radius, color);
            }
        }
    }
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new()
    }
}

pub fn score_caption(vpi: f64) -> String {
    format!("VPI-S: {:.2} / 100", vpi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::{Trimap, TrimapLabel};
    use image::{GrayImage, Luma};
    use imageproc::contours::{BorderType, Contour};

    fn ring(center: (i32, i32), radius: i32) -> Contour<i32> {
        let points = (0..360)
            .map(|deg| {
                let t = (deg as f64).to_radians();
                Point::new(
                    center.0 + (radius as f64 * t.cos()).round() as i32,
                    center.1 + (radius as f64 * t.sin()).round() as i32,
                )
            })
            .collect();
        Contour { points, border_type: BorderType::Outer, parent: None }
    }

    fn segmentation(hole: Option<Contour<i32>>) -> Segmentation {
        Segmentation {
            outer: ring((64, 64), 40),
            hole,
            foreground_mask: GrayImage::from_pixel(128, 128, Luma([0])),
            hole_mask: GrayImage::new(128, 128),
            trimap: Trimap::new(128, 128, TrimapLabel::Background),
        }
    }

    fn scores() -> ScoreSet {
        ScoreSet { size: 0.6, shape: 0.9, hole: 1.0, color: 1.0, vpi: 95.6 }
    }

    #[test]
    fn test_caption_format() {
        assert_eq!(score_caption(87.456), "VPI-S: 87.46 / 100");
        assert_eq!(score_caption(5.0), "VPI-S: 5.00 / 100");
    }

    #[test]
    fn test_annotation_draws_outer_and_hole() {
        let image = RgbImage::from_pixel(128, 128, Rgb([10, 10, 10]));
        let annotator = Annotator::new();
        let annotated = annotator.annotate(&image, &segmentation(Some(ring((64, 64), 10))), &scores());

        assert_eq!(annotated.get_pixel(104, 64), &Rgb([0, 255, 0]));
        assert_eq!(annotated.get_pixel(74, 64), &Rgb([255, 0, 0]));
        assert!(annotated.pixels().any(|p| *p == Rgb([255, 255, 0])));
        // the source is left untouched
        assert!(image.pixels().all(|p| *p == Rgb([10, 10, 10])));
    }

    #[test]
    fn test_annotation_without_hole_or_text() {
        let image = RgbImage::from_pixel(128, 128, Rgb([10, 10, 10]));
        let config = AnnotationConfig { draw_text: false, ..AnnotationConfig::default() };
        let annotated = Annotator::with_config(config).annotate(&image, &segmentation(None), &scores());

        assert!(!annotated.pixels().any(|p| *p == Rgb([255, 0, 0])));
        assert!(!annotated.pixels().any(|p| *p == Rgb([255, 255, 0])));
    }
}
