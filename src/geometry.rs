//! Planar measurements on traced contours.

use std::collections::VecDeque;

use image::{GrayImage, Luma};
use imageproc::{
    contours::Contour,
    geometry::{contour_area, convex_hull},
    point::Point,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: (f64, f64),
    pub radius: f64,
}

impl Circle {
    pub fn diameter(&self) -> f64 {
        2.0 * self.radius
    }

    fn contains(&self, p: (f64, f64)) -> bool {
        let dx = p.0 - self.center.0;
        let dy = p.1 - self.center.1;
        (dx * dx + dy * dy).sqrt() <= self.radius * (1.0 + 1e-9) + 1e-7
    }

    fn from_two(a: (f64, f64), b: (f64, f64)) -> Self {
        let center = ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0);
        let radius = ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt() / 2.0;
        Self { center, radius }
    }

    fn from_three(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> Self {
        let d = 2.0 * (a.0 * (b.1 - c.1) + b.0 * (c.1 - a.1) + c.0 * (a.1 - b.1));
        if d.abs() < 1e-12 {
            // collinear: the widest pair spans the other point
            let candidates = [Self::from_two(a, b), Self::from_two(a, c), Self::from_two(b, c)];
            return candidates
                .into_iter()
                .fold(candidates[0], |best, c| if c.radius > best.radius { c } else { best });
        }

        let a2 = a.0 * a.0 + a.1 * a.1;
        let b2 = b.0 * b.0 + b.1 * b.1;
        let c2 = c.0 * c.0 + c.1 * c.1;
        let ux = (a2 * (b.1 - c.1) + b2 * (c.1 - a.1) + c2 * (a.1 - b.1)) / d;
        let uy = (a2 * (c.0 - b.0) + b2 * (a.0 - c.0) + c2 * (b.0 - a.0)) / d;
        let radius = ((a.0 - ux).powi(2) + (a.1 - uy).powi(2)).sqrt();

        Self { center: (ux, uy), radius }
    }
}

/// Smallest circle containing every point, or `None` for an empty slice.
pub fn min_enclosing_circle(points: &[Point<i32>]) -> Option<Circle> {
    match points.len() {
        0 => return None,
        1 => {
            return Some(Circle {
                center: (points[0].x as f64, points[0].y as f64),
                radius: 0.0,
            });
        }
        _ => {}
    }

    let hull = convex_hull(points);
    let source = if hull.len() >= 2 { hull } else { points.to_vec() };
    let mut pts: Vec<(f64, f64)> = source.iter().map(|p| (p.x as f64, p.y as f64)).collect();
    shuffle(&mut pts);

    let mut circle = Circle { center: pts[0], radius: 0.0 };
    for i in 1..pts.len() {
        if circle.contains(pts[i]) {
            continue;
        }
        circle = Circle { center: pts[i], radius: 0.0 };
        for j in 0..i {
            if circle.contains(pts[j]) {
                continue;
            }
            circle = Circle::from_two(pts[i], pts[j]);
            for k in 0..j {
                if !circle.contains(pts[k]) {
                    circle = Circle::from_three(pts[i], pts[j], pts[k]);
                }
            }
        }
    }

    Some(circle)
}

// Hull points arrive in angular order, the worst case for the incremental
// construction. A fixed xorshift permutation keeps results reproducible.
fn shuffle(points: &mut [(f64, f64)]) {
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    for i in (1..points.len()).rev() {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let j = (state % (i as u64 + 1)) as usize;
        points.swap(i, j);
    }
}

/// Index of the contour with the largest enclosed area. The first one wins ties.
pub fn largest_contour(contours: &[Contour<i32>]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;

    for (i, contour) in contours.iter().enumerate() {
        let area = contour_area(&contour.points);
        match best {
            Some((_, best_area)) if area <= best_area => {}
            _ => best = Some((i, area)),
        }
    }

    best.map(|(i, _)| i)
}

/// Solid mask (255 inside, boundary included) of the region enclosed by `points`.
///
/// Everything reachable from outside the image through 4-connected steps that
/// do not cross the boundary is exterior; the rest is filled.
pub fn fill_contour(points: &[Point<i32>], width: u32, height: u32) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    if points.is_empty() || width == 0 || height == 0 {
        return mask;
    }

    let pw = width as usize + 2;
    let ph = height as usize + 2;
    let mut boundary = vec![false; pw * ph];
    for p in points {
        if p.x >= 0 && p.y >= 0 && (p.x as u32) < width && (p.y as u32) < height {
            boundary[(p.y as usize + 1) * pw + p.x as usize + 1] = true;
        }
    }

    let mut outside = vec![false; pw * ph];
    let mut queue = VecDeque::new();
    outside[0] = true;
    queue.push_back((0usize, 0usize));

    while let Some((x, y)) = queue.pop_front() {
        let neighbours = [
            (x.wrapping_sub(1), y),
            (x + 1, y),
            (x, y.wrapping_sub(1)),
            (x, y + 1),
        ];
        for (nx, ny) in neighbours {
            if nx >= pw || ny >= ph {
                continue;
            }
            let idx = ny * pw + nx;
            if !outside[idx] && !boundary[idx] {
                outside[idx] = true;
                queue.push_back((nx, ny));
            }
        }
    }

    for y in 0..height {
        for x in 0..width {
            if !outside[(y as usize + 1) * pw + x as usize + 1] {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
    }

    mask
}
