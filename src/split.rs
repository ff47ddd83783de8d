//! Multipart decomposition.

use crate::kernel::GeometryKernel;
use crate::Polyline;

/// Split a polyline into one single-part polyline per part, in part order.
///
/// A single-part input comes back as a one-element vector.
pub fn explode_multipart<K: GeometryKernel + ?Sized>(kernel: &K, polyline: &Polyline) -> Vec<Polyline> {
    kernel.explode(polyline)
}
