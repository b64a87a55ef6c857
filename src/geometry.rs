// src/geometry.rs
//
// Integer points and corner-based rectangles shared by the labeler and the
// annotation layer, plus the angle and scaling helpers used for droplet
// matching and label corner selection. Rectangles keep min/max corner pairs
// because label text boxes and contour boxes are built from two corners.

use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl Rect {
    pub fn new(upper_left: Point, lower_right: Point) -> Self {
        Self {
            min_x: upper_left.x,
            min_y: upper_left.y,
            max_x: lower_right.x,
            max_y: lower_right.y,
        }
    }

    pub fn upper_left(&self) -> Point {
        Point::new(self.min_x, self.min_y)
    }

    pub fn lower_right(&self) -> Point {
        Point::new(self.max_x, self.max_y)
    }

    /// True when the rectangles share any area. Touching edges count.
    pub fn intersects(&self, other: &Rect) -> bool {
        if self.min_x > other.max_x || self.max_x < other.min_x {
            return false;
        }
        if self.min_y > other.max_y || self.max_y < other.min_y {
            return false;
        }
        true
    }

    /// True when any side of this rectangle pokes beyond `other`.
    pub fn outside(&self, other: &Rect) -> bool {
        self.min_x < other.min_x
            || self.min_y < other.min_y
            || self.max_x > other.max_x
            || self.max_y > other.max_y
    }

    /// Overlap rectangle, or a zero rectangle when there is none.
    pub fn intersection(&self, other: &Rect) -> Rect {
        if !self.intersects(other) {
            return Rect::default();
        }
        Rect {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        }
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn area(&self) -> i32 {
        (self.max_x - self.min_x) * (self.max_y - self.min_y)
    }

    /// Center as a float pair, so bearing math between label centers
    /// doesn't collapse on small boxes.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.max_x - self.min_x) as f64 / 2.0 + self.min_x as f64,
            (self.max_y - self.min_y) as f64 / 2.0 + self.min_y as f64,
        )
    }
}

/// Euclidean distance between two centroids.
pub fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

/// Signed base-10 log rescale for shape-match scores, which range from
/// subnormal float to enormous. Zero maps to 999 so identical shapes land
/// far outside the useful band instead of at negative infinity.
pub fn log_transform(n: f64) -> f64 {
    if n != 0.0 {
        -n.signum() * n.abs().log10()
    } else {
        999.0
    }
}

/// Compass bearing in degrees from point `a` to point `b`, 0 = up,
/// clockwise, in [0, 360).
pub fn bearing_angle(a: (f64, f64), b: (f64, f64)) -> f64 {
    let degrees = (b.0 - a.0).atan2(a.1 - b.1).rem_euclid(2.0 * PI).to_degrees();
    // A hair west of north can round all the way up to 360.
    if degrees >= 360.0 {
        0.0
    } else {
        degrees
    }
}

/// Circular mean of the angles present, in degrees, rounded to two
/// decimals. `None` entries are ignored; all-`None` yields `None`.
pub fn average_angles(angles: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = angles.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    let n = present.len() as f64;
    let sin_sum: f64 = present.iter().map(|a| a.to_radians().sin()).sum();
    let cos_sum: f64 = present.iter().map(|a| a.to_radians().cos()).sum();
    let mut avg = (sin_sum / n).atan2(cos_sum / n).to_degrees();
    if avg < 0.0 {
        avg += 360.0;
    }
    let rounded = (avg * 100.0).round() / 100.0;
    // Rounding can push a value just under north up to 360 exactly.
    Some(if rounded >= 360.0 { 0.0 } else { rounded })
}

/// The opposite compass direction.
pub fn reverse_angle(angle: f64) -> f64 {
    (angle + 180.0).rem_euclid(360.0)
}
