//! Screen-space geometry
//!
//! Plain `f64` value types. Rectangles are compared structurally, which is
//! what frame deduplication relies on.

use serde::{Deserialize, Serialize};

/// A location in screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`
    pub fn distance_to(&self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Width and height
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle `(x, y, width, height)` with y growing downwards
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle of `size` at the origin
    pub const fn from_size(size: Size) -> Self {
        Self::new(0.0, 0.0, size.width, size.height)
    }

    pub fn min_x(&self) -> f64 {
        self.x
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn min_y(&self) -> f64 {
        self.y
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    /// Zero width or zero height
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Whether `point` lies inside (min edges inclusive, max edges exclusive)
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.min_x()
            && point.x < self.max_x()
            && point.y >= self.min_y()
            && point.y < self.max_y()
    }

    /// Overlapping region, `None` when the rectangles are disjoint
    ///
    /// Rectangles that only touch yield a zero-sized intersection.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x0 = self.min_x().max(other.min_x());
        let x1 = self.max_x().min(other.max_x());
        let y0 = self.min_y().max(other.min_y());
        let y1 = self.max_y().min(other.max_y());

        if x1 < x0 || y1 < y0 {
            return None;
        }

        Some(Rect::new(x0, y0, x1 - x0, y1 - y0))
    }

    /// Same rectangle moved to vertical origin `y`
    pub fn with_y(&self, y: f64) -> Rect {
        Rect { y, ..*self }
    }
}
