//! Bounding box types and operations.

use serde::{Deserialize, Serialize};

/// Smallest half-size (degrees) used when the points collapse to a line or a
/// single coordinate.
pub const MIN_HALF_SIZE: f64 = 0.01;

/// A geographic bounding box in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Compute the envelope of a set of `(x, y)` points.
    ///
    /// Returns `None` for an empty set. The result is never degenerate: an
    /// axis with zero extent is widened by [`MIN_HALF_SIZE`] on both sides.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut iter = points.into_iter().filter(|(x, y)| x.is_finite() && y.is_finite());
        let (x0, y0) = iter.next()?;
        let mut bbox = Self::new(x0, y0, x0, y0);

        for (x, y) in iter {
            bbox.min_x = bbox.min_x.min(x);
            bbox.min_y = bbox.min_y.min(y);
            bbox.max_x = bbox.max_x.max(x);
            bbox.max_y = bbox.max_y.max(y);
        }

        Some(bbox.ensure_min_size(MIN_HALF_SIZE))
    }

    /// Widen any axis narrower than `2 * half_size` around its center.
    pub fn ensure_min_size(mut self, half_size: f64) -> Self {
        if self.width() < 2.0 * half_size {
            let cx = (self.min_x + self.max_x) / 2.0;
            self.min_x = cx - half_size;
            self.max_x = cx + half_size;
        }
        if self.height() < 2.0 * half_size {
            let cy = (self.min_y + self.max_y) / 2.0;
            self.min_y = cy - half_size;
            self.max_y = cy + half_size;
        }
        self
    }

    /// Width of the bounding box in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the bounding box in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Check if a point is contained within this bbox.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// As `[min_x, min_y, max_x, max_y]`, the order map clients expect.
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }
}
