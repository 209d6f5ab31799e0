//! Bounding box input unit and the filter's measurement parameterisation.

use nalgebra::Vector4;

/// Height floor applied when converting a box into a measurement, so that
/// degenerate detections cannot divide by zero or poison the filter with NaN.
const MIN_MEASUREMENT_HEIGHT: f64 = 1e-3;

/// A 2D point in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// An axis-aligned bounding box in `(left, top, right, bottom)` pixel
/// coordinates, as produced by an external object detector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BBox {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl BBox {
    /// The empty sentinel box returned by out-of-range trace lookups.
    pub const EMPTY: BBox = BBox {
        left: 0.0,
        top: 0.0,
        right: 0.0,
        bottom: 0.0,
    };

    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    #[inline]
    pub fn center(&self) -> Point {
        Point::new(
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }

    /// Euclidean distance between the centers of two boxes, in pixels.
    pub fn center_distance(&self, other: &BBox) -> f64 {
        self.center().distance(&other.center())
    }
}

/// The filter's measurement parameterisation `(center x, center y, aspect
/// ratio, height)` where the aspect ratio is `width / height`.
///
/// Constructed from a [`BBox`]; never stored on a track directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub center_x: f64,
    pub center_y: f64,
    pub aspect_ratio: f64,
    pub height: f64,
}

impl Measurement {
    /// View as a measurement-space column vector `(cx, cy, a, h)`.
    #[inline]
    pub fn as_vector(&self) -> Vector4<f64> {
        Vector4::new(self.center_x, self.center_y, self.aspect_ratio, self.height)
    }
}

impl From<&BBox> for Measurement {
    fn from(bbox: &BBox) -> Self {
        let center = bbox.center();
        let height = bbox.height().max(MIN_MEASUREMENT_HEIGHT);
        Self {
            center_x: center.x,
            center_y: center.y,
            aspect_ratio: bbox.width() / height,
            height,
        }
    }
}
