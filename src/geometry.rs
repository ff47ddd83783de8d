//! Planar vector math and interior angle measurement.
//!
//! All routines are pure and operate on [`Point2D`] treated as a vector
//! where needed.

use crate::Point2D;

/// Component-wise difference `a - b`.
#[inline]
pub fn sub(a: Point2D, b: Point2D) -> Point2D {
    Point2D::new(a.x - b.x, a.y - b.y)
}

#[inline]
pub fn dot(a: Point2D, b: Point2D) -> f64 {
    a.x * b.x + a.y * b.y
}

/// Euclidean length of a vector.
#[inline]
pub fn norm(v: Point2D) -> f64 {
    v.x.hypot(v.y)
}

/// Euclidean distance between two points.
#[inline]
pub fn distance(a: Point2D, b: Point2D) -> f64 {
    norm(sub(a, b))
}

/// Interior angle in degrees at `vertex`, between the vectors from `vertex`
/// to `prev` and from `vertex` to `next`.
///
/// Result is in [0, 180]: 180 for a straight continuation, 0 for a full
/// reversal. The cosine is clamped to [-1, 1] before `acos` so rounding on
/// nearly collinear input never yields NaN.
///
/// Returns `None` when the angle is undefined: either neighbor coincides with
/// `vertex` (a zero-length edge) or a coordinate is not finite.
///
/// # Example
/// ```
/// use despike::{angle_at_vertex, Point2D};
///
/// let angle = angle_at_vertex(
///     Point2D::new(0.0, 0.0),
///     Point2D::new(5.0, 0.0),
///     Point2D::new(5.0, 5.0),
/// )
/// .unwrap();
/// assert!((angle - 90.0).abs() < 1e-9);
/// ```
pub fn angle_at_vertex(prev: Point2D, vertex: Point2D, next: Point2D) -> Option<f64> {
    let v1 = sub(prev, vertex);
    let v2 = sub(next, vertex);

    let mag = norm(v1) * norm(v2);
    if !mag.is_finite() || mag == 0.0 {
        return None;
    }

    let cos_theta = (dot(v1, v2) / mag).clamp(-1.0, 1.0);
    Some(cos_theta.acos().to_degrees())
}
