//! "Official report" image: annotated photo, a semicircular gauge for the
//! final index and horizontal bars for the four sub-scores.

use std::path::Path;

use image::{Rgb, RgbImage, imageops::{self, FilterType}};
use imageproc::{drawing::draw_filled_rect_mut, rect::Rect};

use super::glyphs::{draw_text, draw_text_centered, text_height};
use crate::{error::Result, scoring::ScoreSet};

const BACKGROUND: Rgb<u8> = Rgb([240, 240, 240]);
const INK: Rgb<u8> = Rgb([20, 20, 20]);
const TRACK: Rgb<u8> = Rgb([221, 221, 221]);
const BAR_COLORS: [Rgb<u8>; 4] = [
    Rgb([31, 119, 180]),
    Rgb([255, 127, 14]),
    Rgb([44, 160, 44]),
    Rgb([214, 39, 40]),
];

/// Red below 40, orange below 75, green otherwise.
pub fn gauge_color(vpi: f64) -> Rgb<u8> {
    if vpi < 40.0 {
        Rgb([220, 20, 20])
    } else if vpi < 75.0 {
        Rgb([255, 165, 0])
    } else {
        Rgb([0, 128, 0])
    }
}

pub struct Dashboard {
    width: u32,
    height: u32,
    title: String,
}

impl Dashboard {
    pub fn new() -> Self {
        Self {
            width: 1200,
            height: 700,
            title: "VADA PERFECTION INDEX - OFFICIAL REPORT".into(),
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width.max(400);
        self.height = height.max(300);
        self
    }

    pub fn with_title<S: Into<String>>(mut self, title: S) -> Self {
        self.title = title.into();
        self
    }

    pub fn render(&self, annotated: &RgbImage, scores: &ScoreSet) -> RgbImage {
        let mut canvas = RgbImage::from_pixel(self.width, self.height, BACKGROUND);
        let (w, h) = (self.width as i32, self.height as i32);

        draw_text_centered(&mut canvas, w / 2, h / 30, &self.title, 3, INK);
        let top = h / 30 + text_height(3) as i32 + h / 25;

        self.draw_photo(&mut canvas, annotated, top);
        self.draw_gauge(&mut canvas, scores.vpi, top);
        self.draw_bars(&mut canvas, scores);

        canvas
    }

    pub fn save<P: AsRef<Path>>(&self, annotated: &RgbImage, scores: &ScoreSet, path: P) -> Result<()> {
        self.render(annotated, scores).save(path)?;
        Ok(())
    }

    fn draw_photo(&self, canvas: &mut RgbImage, annotated: &RgbImage, top: i32) {
        let half = self.width / 2;
        draw_text_centered(canvas, half as i32 / 2, top, "VISUAL ANALYSIS", 2, INK);

        let y0 = top as u32 + text_height(2) + 10;
        let max_w = half.saturating_sub(40);
        let max_h = self.height.saturating_sub(y0 + 20);
        if annotated.width() == 0 || annotated.height() == 0 || max_w == 0 || max_h == 0 {
            return;
        }

        let scale = (max_w as f64 / annotated.width() as f64).min(max_h as f64 / annotated.height() as f64);
        let fit_w = ((annotated.width() as f64 * scale) as u32).max(1);
        let fit_h = ((annotated.height() as f64 * scale) as u32).max(1);
        let photo = imageops::resize(annotated, fit_w, fit_h, FilterType::Triangle);

        let x0 = (half - fit_w) / 2;
        imageops::replace(canvas, &photo, x0 as i64, y0 as i64);
    }

    fn draw_gauge(&self, canvas: &mut RgbImage, vpi: f64, top: i32) {
        let panel_x = self.width / 2;
        let panel_w = self.width - panel_x;
        let center_x = (panel_x + panel_w / 2) as f64;

        draw_text_centered(canvas, center_x as i32, top, "FINAL VPI-S SCORE", 2, INK);

        let outer = (panel_w as f64 * 0.3).min(self.height as f64 * 0.3);
        let inner = outer * 0.75;
        let center_y = top as f64 + text_height(2) as f64 + 20.0 + outer;
        let sweep = vpi.clamp(0.0, 100.0) * 1.8;
        let fill = gauge_color(vpi);

        let x_start = (center_x - outer).floor().max(0.0) as u32;
        let x_end = ((center_x + outer).ceil() as u32).min(self.width);
        let y_start = (center_y - outer).floor().max(0.0) as u32;
        let y_end = (center_y.ceil() as u32).min(self.height);

        for y in y_start..y_end {
            for x in x_start..x_end {
                let dx = x as f64 - center_x;
                let dy = center_y - y as f64;
                let r = dx.hypot(dy);
                if r < inner || r > outer || dy < 0.0 {
                    continue;
                }
                let angle = dy.atan2(dx).to_degrees();
                let color = if sweep > 0.0 && angle <= sweep { fill } else { TRACK };
                canvas.put_pixel(x, y, color);
            }
        }

        let value = format!("{:.2}", vpi);
        let value_y = center_y as i32 - text_height(5) as i32 - 4;
        draw_text_centered(canvas, center_x as i32, value_y, &value, 5, INK);
        draw_text_centered(canvas, center_x as i32, center_y as i32 + 8, "/ 100", 2, INK);
    }

    fn draw_bars(&self, canvas: &mut RgbImage, scores: &ScoreSet) {
        let panel_x = self.width / 2 + 20;
        let panel_w = self.width / 2 - 40;
        let top = self.height * 2 / 3;
        let label_w = 90u32;
        let track_w = panel_w.saturating_sub(label_w + 80);
        let row_h = ((self.height - top) / 5).max(12);
        let bar_h = row_h * 3 / 5;

        draw_text(canvas, panel_x as i32, top as i32 - 24, "COMPONENT SCORES", 2, INK);

        let rows = [
            ("COLOR", scores.color),
            ("HOLE", scores.hole),
            ("SHAPE", scores.shape),
            ("SIZE", scores.size),
        ];

        for (i, (label, value)) in rows.iter().enumerate() {
            let y = top + 10 + i as u32 * row_h;
            let text_y = (y + bar_h / 2) as i32 - text_height(2) as i32 / 2;
            draw_text(canvas, panel_x as i32, text_y, label, 2, INK);

            let bar_x = panel_x + label_w;
            let length = (value.clamp(0.0, 1.0) * track_w as f64).round() as u32;
            if length > 0 && bar_h > 0 {
                draw_filled_rect_mut(
                    canvas,
                    Rect::at(bar_x as i32, y as i32).of_size(length, bar_h),
                    BAR_COLORS[i],
                );
            }
            let value_x = (bar_x + length + 8) as i32;
            draw_text(canvas, value_x, text_y, &format!("{:.2}", value), 2, INK);
        }
    }
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}
