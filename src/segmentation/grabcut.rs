//! Iterated graph-cut foreground estimation seeded from a rectangle.
//!
//! Each iteration assigns every pixel to a component of its class colour
//! model, refits both Gaussian mixtures, and relabels the probable pixels
//! with a minimum cut over the 8-connected pixel graph.

use std::f64::consts::SQRT_2;

use image::RgbImage;
use log::debug;

use super::{ForegroundEstimator, SeedRect, Trimap, TrimapLabel, max_flow::FlowGraph};
use crate::error::{Result, VadaError};

const COMPONENTS: usize = 5;
const KMEANS_ROUNDS: usize = 10;
const COVARIANCE_FLOOR: f64 = 0.01;

type Color = [f64; 3];

pub struct GrabCut {
    iterations: usize,
    margin: f64,
    gamma: f64,
}

impl GrabCut {
    pub fn new() -> Self {
        Self {
            iterations: 5,
            margin: 0.1,
            gamma: 50.0,
        }
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn seed_rect(&self, width: u32, height: u32) -> SeedRect {
        SeedRect::with_margin(width, height, self.margin)
    }

    /// Refines an existing trimap in place. Definite labels are never changed.
    pub fn refine(&self, image: &RgbImage, trimap: &mut Trimap) -> Result<()> {
        let (width, height) = image.dimensions();
        if trimap.width() != width || trimap.height() != height {
            return Err(VadaError::InvalidParameter(format!(
                "trimap is {}x{} but image is {}x{}",
                trimap.width(),
                trimap.height(),
                width,
                height
            )));
        }

        let colors: Vec<Color> = image
            .pixels()
            .map(|p| [p[0] as f64, p[1] as f64, p[2] as f64])
            .collect();
        let labels: Vec<TrimapLabel> = trimap.labels().iter().copied().collect();

        let (bg_samples, fg_samples) = split_samples(&colors, &labels);
        if bg_samples.is_empty() || fg_samples.is_empty() {
            return Err(VadaError::InvalidParameter(
                "seed rectangle must leave both background and foreground samples".into(),
            ));
        }

        let mut bg_gmm = Gmm::fit(&bg_samples, &kmeans(&bg_samples, COMPONENTS));
        let mut fg_gmm = Gmm::fit(&fg_samples, &kmeans(&fg_samples, COMPONENTS));

        let links = NeighbourLinks::new(&colors, width as usize, height as usize, self.gamma);
        let lambda = 9.0 * self.gamma;
        let mut labels = labels;

        for iteration in 0..self.iterations {
            let (bg_samples, fg_samples) = split_samples(&colors, &labels);
            if bg_samples.is_empty() || fg_samples.is_empty() {
                debug!("grabcut: one class vanished after {} iteration(s)", iteration);
                break;
            }

            let bg_assign: Vec<usize> = bg_samples.iter().map(|c| bg_gmm.most_likely(c)).collect();
            let fg_assign: Vec<usize> = fg_samples.iter().map(|c| fg_gmm.most_likely(c)).collect();
            bg_gmm = Gmm::fit(&bg_samples, &bg_assign);
            fg_gmm = Gmm::fit(&fg_samples, &fg_assign);

            let mut graph = FlowGraph::new(colors.len(), colors.len() * 6);
            for (i, color) in colors.iter().enumerate() {
                let (source_cap, sink_cap) = match labels[i] {
                    TrimapLabel::Background => (0.0, lambda),
                    TrimapLabel::Foreground => (lambda, 0.0),
                    _ => (bg_gmm.cost(color), fg_gmm.cost(color)),
                };
                graph.add_terminal_weights(i, source_cap, sink_cap);
            }
            links.add_to(&mut graph);

            let flow = graph.max_flow();
            let source_side = graph.source_side();

            let mut changed = 0usize;
            for (i, label) in labels.iter_mut().enumerate() {
                if !label.is_probable() {
                    continue;
                }
                let next = if source_side[i] {
                    TrimapLabel::ProbableForeground
                } else {
                    TrimapLabel::ProbableBackground
                };
                if next != *label {
                    changed += 1;
                }
                *label = next;
            }
            debug!(
                "grabcut iteration {}: cut {:.2}, {} label(s) changed",
                iteration + 1,
                flow,
                changed
            );
        }

        for (i, label) in labels.into_iter().enumerate() {
            let x = (i % width as usize) as u32;
            let y = (i / width as usize) as u32;
            trimap.set(x, y, label);
        }

        Ok(())
    }
}

impl Default for GrabCut {
    fn default() -> Self {
        Self::new()
    }
}

impl ForegroundEstimator for GrabCut {
    fn estimate(&self, image: &RgbImage) -> Result<Trimap> {
        let (width, height) = image.dimensions();
        let rect = self.seed_rect(width, height);
        if rect.is_empty() {
            return Err(VadaError::ImageTooSmall { width, height });
        }

        let mut trimap = Trimap::from_rect(width, height, &rect);
        self.refine(image, &mut trimap)?;
        Ok(trimap)
    }

    fn name(&self) -> &str {
        "grabcut"
    }
}

fn split_samples(colors: &[Color], labels: &[TrimapLabel]) -> (Vec<Color>, Vec<Color>) {
    let mut bg = Vec::new();
    let mut fg = Vec::new();
    for (color, label) in colors.iter().zip(labels) {
        if label.is_foreground() {
            fg.push(*color);
        } else {
            bg.push(*color);
        }
    }
    (bg, fg)
}

fn squared_distance(a: &Color, b: &Color) -> f64 {
    (0..3).map(|c| (a[c] - b[c]).powi(2)).sum()
}

/// Cluster index per sample. Centres start from a farthest-point sweep so the
/// result does not depend on a random seed; fewer than `k` distinct colours
/// leave the surplus clusters empty.
fn kmeans(samples: &[Color], k: usize) -> Vec<usize> {
    let mut centers: Vec<Color> = vec![samples[0]];
    let mut nearest: Vec<f64> = samples.iter().map(|s| squared_distance(s, &samples[0])).collect();

    while centers.len() < k {
        let (index, distance) = nearest
            .iter()
            .enumerate()
            .fold((0, 0.0), |best, (i, &d)| if d > best.1 { (i, d) } else { best });
        if distance <= 0.0 {
            break;
        }
        let center = samples[index];
        for (n, s) in nearest.iter_mut().zip(samples) {
            *n = n.min(squared_distance(s, &center));
        }
        centers.push(center);
    }

    let mut assignment = vec![0usize; samples.len()];
    for _ in 0..KMEANS_ROUNDS {
        for (slot, sample) in assignment.iter_mut().zip(samples) {
            *slot = closest_center(sample, &centers);
        }

        let mut sums = vec![[0.0f64; 3]; centers.len()];
        let mut counts = vec![0usize; centers.len()];
        for (sample, &slot) in samples.iter().zip(&assignment) {
            for c in 0..3 {
                sums[slot][c] += sample[c];
            }
            counts[slot] += 1;
        }
        for (center, (sum, &count)) in centers.iter_mut().zip(sums.iter().zip(&counts)) {
            if count > 0 {
                *center = [sum[0] / count as f64, sum[1] / count as f64, sum[2] / count as f64];
            }
        }
    }

    assignment
}

fn closest_center(sample: &Color, centers: &[Color]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, center) in centers.iter().enumerate() {
        let d = squared_distance(sample, center);
        if d < best_distance {
            best = i;
            best_distance = d;
        }
    }
    best
}

#[derive(Debug, Clone, Copy)]
struct Component {
    weight: f64,
    mean: Color,
    inverse: [[f64; 3]; 3],
    log_norm: f64,
}

impl Component {
    fn log_density(&self, color: &Color) -> f64 {
        let d = [color[0] - self.mean[0], color[1] - self.mean[1], color[2] - self.mean[2]];
        let mut mahalanobis = 0.0;
        for r in 0..3 {
            for c in 0..3 {
                mahalanobis += d[r] * self.inverse[r][c] * d[c];
            }
        }
        self.log_norm - 0.5 * mahalanobis
    }
}

/// Full-covariance Gaussian mixture over RGB.
#[derive(Debug, Clone)]
struct Gmm {
    components: Vec<Component>,
}

impl Gmm {
    fn fit(samples: &[Color], assignment: &[usize]) -> Self {
        let mut sums = [[0.0f64; 3]; COMPONENTS];
        let mut products = [[[0.0f64; 3]; 3]; COMPONENTS];
        let mut counts = [0usize; COMPONENTS];

        for (sample, &k) in samples.iter().zip(assignment) {
            for r in 0..3 {
                sums[k][r] += sample[r];
                for c in 0..3 {
                    products[k][r][c] += sample[r] * sample[c];
                }
            }
            counts[k] += 1;
        }

        let total = samples.len() as f64;
        let mut components = Vec::with_capacity(COMPONENTS);
        for k in 0..COMPONENTS {
            if counts[k] == 0 {
                continue;
            }
            let n = counts[k] as f64;
            let mean = [sums[k][0] / n, sums[k][1] / n, sums[k][2] / n];
            let mut cov = [[0.0f64; 3]; 3];
            for r in 0..3 {
                for c in 0..3 {
                    cov[r][c] = products[k][r][c] / n - mean[r] * mean[c];
                }
            }
            for (d, row) in cov.iter_mut().enumerate() {
                row[d] += COVARIANCE_FLOOR;
            }

            let det = determinant(&cov);
            let inverse = invert(&cov, det);
            components.push(Component {
                weight: n / total,
                mean,
                inverse,
                log_norm: (n / total).ln() - 0.5 * det.ln(),
            });
        }

        Self { components }
    }

    /// Negative log-likelihood of `color`, computed with log-sum-exp.
    fn cost(&self, color: &Color) -> f64 {
        let logs: Vec<f64> = self.components.iter().map(|c| c.log_density(color)).collect();
        let max = logs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if !max.is_finite() {
            return f64::MAX / 4.0;
        }
        let sum: f64 = logs.iter().map(|l| (l - max).exp()).sum();
        -(max + sum.ln())
    }

    fn most_likely(&self, color: &Color) -> usize {
        let mut best = 0;
        let mut best_log = f64::NEG_INFINITY;
        for (i, component) in self.components.iter().enumerate() {
            if component.weight <= 0.0 {
                continue;
            }
            let l = component.log_density(color);
            if l > best_log {
                best = i;
                best_log = l;
            }
        }
        best
    }
}

fn determinant(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

fn invert(m: &[[f64; 3]; 3], det: f64) -> [[f64; 3]; 3] {
    let inv_det = 1.0 / det;
    [
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
        ],
    ]
}

/// Contrast-sensitive smoothness weights to the left, up-left, up and
/// up-right neighbour of every pixel.
struct NeighbourLinks {
    edges: Vec<(usize, usize, f64)>,
}

impl NeighbourLinks {
    fn new(colors: &[Color], width: usize, height: usize, gamma: f64) -> Self {
        let offsets: [(isize, isize, f64); 4] = [(-1, 0, 1.0), (-1, -1, SQRT_2), (0, -1, 1.0), (1, -1, SQRT_2)];

        let mut pairs = Vec::with_capacity(colors.len() * 4);
        let mut total = 0.0;
        for y in 0..height {
            for x in 0..width {
                for &(dx, dy, distance) in &offsets {
                    let nx = x as isize + dx;
                    let ny = y as isize + dy;
                    if nx < 0 || ny < 0 || nx >= width as isize {
                        continue;
                    }
                    let i = y * width + x;
                    let j = ny as usize * width + nx as usize;
                    let diff = squared_distance(&colors[i], &colors[j]);
                    total += diff;
                    pairs.push((i, j, diff, distance));
                }
            }
        }

        let beta = if pairs.is_empty() || total <= f64::EPSILON {
            0.0
        } else {
            1.0 / (2.0 * total / pairs.len() as f64)
        };

        let edges = pairs
            .into_iter()
            .map(|(i, j, diff, distance)| (i, j, gamma / distance * (-beta * diff).exp()))
            .collect();

        Self { edges }
    }

    fn add_to(&self, graph: &mut FlowGraph) {
        for &(i, j, weight) in &self.edges {
            graph.add_edge(i, j, weight, weight);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};
    use imageproc::drawing::draw_filled_circle_mut;

    #[test]
    fn test_builders_set_parameters() {
        let grabcut = GrabCut::new().with_iterations(2).with_margin(0.2).with_gamma(10.0);
        assert_eq!(grabcut.iterations, 2);
        assert_eq!(grabcut.gamma, 10.0);
        assert_eq!(grabcut.seed_rect(100, 50), SeedRect::with_margin(100, 50, 0.2));
    }

    #[test]
    fn test_kmeans_separates_distinct_colors() {
        let mut samples = vec![[0.0, 0.0, 0.0]; 10];
        samples.extend(vec![[255.0, 255.0, 255.0]; 10]);
        let assignment = kmeans(&samples, COMPONENTS);
        assert!(assignment[..10].iter().all(|&a| a == assignment[0]));
        assert!(assignment[10..].iter().all(|&a| a == assignment[10]));
        assert_ne!(assignment[0], assignment[10]);
    }

    #[test]
    fn test_gmm_prefers_its_own_colors() {
        let samples = vec![[200.0, 130.0, 60.0]; 20];
        let gmm = Gmm::fit(&samples, &vec![0; 20]);
        assert!(gmm.cost(&[200.0, 130.0, 60.0]) < gmm.cost(&[20.0, 200.0, 240.0]));
        assert!(gmm.cost(&[20.0, 200.0, 240.0]).is_finite());
    }

    #[test]
    fn test_determinant_and_inverse() {
        let m = [[2.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 5.0]];
        let det = determinant(&m);
        assert!((det - 40.0).abs() < 1e-12);
        let inv = invert(&m, det);
        assert!((inv[0][0] - 0.5).abs() < 1e-12);
        assert!((inv[2][2] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_separates_disc_from_plain_background() {
        let mut image = RgbImage::from_pixel(80, 80, Rgb([170, 200, 235]));
        draw_filled_circle_mut(&mut image, (40, 40), 25, Rgb([200, 130, 60]));

        let trimap = GrabCut::new().estimate(&image).unwrap();
        let mask = trimap.to_mask();

        assert_eq!(mask.get_pixel(40, 40), &Luma([255]));
        assert_eq!(mask.get_pixel(10, 10), &Luma([0]));
        // corners of the seed rectangle are background-coloured
        assert_eq!(mask.get_pixel(9, 9), &Luma([0]));
        assert_eq!(mask.get_pixel(70, 70), &Luma([0]));
        let foreground = mask.pixels().filter(|p| p[0] > 0).count() as f64;
        let disc = std::f64::consts::PI * 25.0 * 25.0;
        assert!((foreground - disc).abs() / disc < 0.1);
    }

    #[test]
    fn test_uniform_image_has_no_foreground() {
        let image = RgbImage::from_pixel(40, 40, Rgb([120, 120, 120]));
        let trimap = GrabCut::new().estimate(&image).unwrap();
        assert!(trimap.labels().iter().all(|l| !l.is_foreground()));
    }

    #[test]
    fn test_tiny_image_is_rejected() {
        let image = RgbImage::new(1, 1);
        let err = GrabCut::new().estimate(&image).unwrap_err();
        assert!(matches!(err, VadaError::ImageTooSmall { .. }));
    }
}
