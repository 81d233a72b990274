//! Boundary tracing and minimum-area oriented boxes
//!
//! Boundaries come from `imageproc::contours::find_contours`. Each one carries
//! the smallest rotated rectangle enclosing its points, found with rotating
//! calipers over the convex hull.

use image::{GrayImage, Rgb, RgbImage};
use imageproc::contours::find_contours;
use imageproc::drawing::draw_line_segment_mut;
use imageproc::point::Point;

const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);
const GREEN: Rgb<u8> = Rgb([0, 255, 0]);

/// Integer rectangle that may extend past the image it was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl PixelRect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    /// True when the rectangle is non-empty and lies within `width` x `height`
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x >= 0
            && self.y >= 0
            && self.right() as i64 <= width as i64
            && self.bottom() as i64 <= height as i64
    }
}

/// Minimum-area rotated rectangle
///
/// `angle` is in degrees within (-45, 45]; `width` is the extent along the
/// axis at `angle` and `height` the extent perpendicular to it. Image
/// coordinates have y pointing down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedBox {
    pub center: (f32, f32),
    pub width: f32,
    pub height: f32,
    pub angle: f32,
}

impl OrientedBox {
    pub fn new(center: (f32, f32), width: f32, height: f32, angle: f32) -> Self {
        let mut oriented = Self { center, width, height, angle };
        oriented.normalize();
        oriented
    }

    fn normalize(&mut self) {
        while self.angle > 45.0 {
            self.angle -= 90.0;
            std::mem::swap(&mut self.width, &mut self.height);
        }
        while self.angle <= -45.0 {
            self.angle += 90.0;
            std::mem::swap(&mut self.width, &mut self.height);
        }
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Corner points in order around the box
    pub fn corners(&self) -> [(f32, f32); 4] {
        let (sin, cos) = self.angle.to_radians().sin_cos();
        let (hw, hh) = (self.width / 2.0, self.height / 2.0);
        let (cx, cy) = self.center;

        let corner = |u: f32, v: f32| (cx + u * cos - v * sin, cy + u * sin + v * cos);

        [corner(-hw, -hh), corner(hw, -hh), corner(hw, hh), corner(-hw, hh)]
    }

    /// Smallest integer rectangle containing the rotated box
    pub fn bounding_rect(&self) -> PixelRect {
        let corners = self.corners();
        let min_x = corners.iter().map(|c| c.0).fold(f32::INFINITY, f32::min);
        let min_y = corners.iter().map(|c| c.1).fold(f32::INFINITY, f32::min);
        let max_x = corners.iter().map(|c| c.0).fold(f32::NEG_INFINITY, f32::max);
        let max_y = corners.iter().map(|c| c.1).fold(f32::NEG_INFINITY, f32::max);

        let x = min_x.floor() as i32;
        let y = min_y.floor() as i32;
        PixelRect::new(x, y, max_x.ceil() as i32 - x, max_y.ceil() as i32 - y)
    }

    /// Fit the box to a point set
    pub fn enclosing(points: &[Point<i32>]) -> Self {
        let hull = convex_hull(points);

        if hull.len() < 3 {
            let (min_x, max_x, min_y, max_y) = extents(points);
            return Self::new(
                ((min_x + max_x) / 2.0, (min_y + max_y) / 2.0),
                max_x - min_x,
                max_y - min_y,
                0.0,
            );
        }

        let mut best: Option<(f32, OrientedBox)> = None;
        let n = hull.len();

        for i in 0..n {
            let a = hull[i];
            let b = hull[(i + 1) % n];
            let (ex, ey) = (b.0 - a.0, b.1 - a.1);
            let length = (ex * ex + ey * ey).sqrt();
            if length < f32::EPSILON {
                continue;
            }

            let (nx, ny) = (ex / length, ey / length);
            let (px, py) = (-ny, nx);

            let mut min_n = f32::MAX;
            let mut max_n = f32::MIN;
            let mut min_p = f32::MAX;
            let mut max_p = f32::MIN;
            for &(x, y) in &hull {
                let along = x * nx + y * ny;
                let across = x * px + y * py;
                min_n = min_n.min(along);
                max_n = max_n.max(along);
                min_p = min_p.min(across);
                max_p = max_p.max(across);
            }

            let width = max_n - min_n;
            let height = max_p - min_p;
            let area = width * height;

            if best.as_ref().map_or(true, |(best_area, _)| area < *best_area - 1e-3) {
                let mid_n = (min_n + max_n) / 2.0;
                let mid_p = (min_p + max_p) / 2.0;
                let center = (mid_n * nx + mid_p * px, mid_n * ny + mid_p * py);
                let angle = ny.atan2(nx).to_degrees();
                best = Some((area, OrientedBox::new(center, width, height, angle)));
            }
        }

        match best {
            Some((_, oriented)) => oriented,
            None => {
                let (min_x, max_x, min_y, max_y) = extents(points);
                Self::new(((min_x + max_x) / 2.0, (min_y + max_y) / 2.0), 0.0, 0.0, 0.0)
            }
        }
    }
}

fn extents(points: &[Point<i32>]) -> (f32, f32, f32, f32) {
    if points.is_empty() {
        return (0.0, 0.0, 0.0, 0.0);
    }
    let min_x = points.iter().map(|p| p.x).min().unwrap_or(0) as f32;
    let max_x = points.iter().map(|p| p.x).max().unwrap_or(0) as f32;
    let min_y = points.iter().map(|p| p.y).min().unwrap_or(0) as f32;
    let max_y = points.iter().map(|p| p.y).max().unwrap_or(0) as f32;
    (min_x, max_x, min_y, max_y)
}

fn cross(o: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

/// Monotone chain hull, counter-clockwise without repeated end point
fn convex_hull(points: &[Point<i32>]) -> Vec<(f32, f32)> {
    let mut sorted: Vec<(i32, i32)> = points.iter().map(|p| (p.x, p.y)).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let pts: Vec<(f32, f32)> = sorted.into_iter().map(|(x, y)| (x as f32, y as f32)).collect();
    if pts.len() < 3 {
        return pts;
    }

    let mut lower: Vec<(f32, f32)> = Vec::with_capacity(pts.len());
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<(f32, f32)> = Vec::with_capacity(pts.len());
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// A traced outline and its oriented box
#[derive(Debug, Clone)]
pub struct Boundary {
    pub points: Vec<Point<i32>>,
    pub oriented: OrientedBox,
}

impl Boundary {
    pub fn new(points: Vec<Point<i32>>) -> Self {
        let oriented = OrientedBox::enclosing(&points);
        Self { points, oriented }
    }

    /// Axis-aligned bounds of the outline pixels
    pub fn pixel_bounds(&self) -> PixelRect {
        let (min_x, max_x, min_y, max_y) = extents(&self.points);
        PixelRect::new(
            min_x as i32,
            min_y as i32,
            (max_x - min_x) as i32 + 1,
            (max_y - min_y) as i32 + 1,
        )
    }
}

/// Trace every outline in an edge map (non-zero pixels are foreground)
pub fn trace_boundaries(edges: &GrayImage) -> Vec<Boundary> {
    find_contours::<i32>(edges)
        .into_iter()
        .filter(|contour| !contour.points.is_empty())
        .map(|contour| Boundary::new(contour.points))
        .collect()
}

/// Outline each boundary whose box area exceeds `min_area` on a copy of `gray`
pub fn draw_boundaries(gray: &GrayImage, boundaries: &[Boundary], min_area: f32) -> RgbImage {
    let mut canvas = RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y).0[0];
        Rgb([v, v, v])
    });

    for boundary in boundaries.iter().filter(|b| b.oriented.area() > min_area) {
        for point in &boundary.points {
            if point.x >= 0 && point.y >= 0 && (point.x as u32) < canvas.width() && (point.y as u32) < canvas.height() {
                canvas.put_pixel(point.x as u32, point.y as u32, YELLOW);
            }
        }

        let corners = boundary.oriented.corners();
        for i in 0..4 {
            draw_line_segment_mut(&mut canvas, corners[i], corners[(i + 1) % 4], GREEN);
        }
    }

    canvas
}
