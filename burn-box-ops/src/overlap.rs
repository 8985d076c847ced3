//! # Pairwise Box Overlap
//!
//! Computes the intersection-over-union between every box of one collection and every box
//! of another collection that share the same leading dimensions. For YOLO-style grids the
//! inputs are `[N, S, S, B, 4]` and the result is `[N, S, S, B, B]`, but any rank `>= 2`
//! works: `[P, 4]` against `[T, 4]` yields a plain `[P, T]` matrix.
//!
//! The pair axis is materialized by repeating each coordinate column, so no per-cell loop
//! is ever executed on the host.

use burn::prelude::*;

use crate::corners::Corners;

/// Default epsilon added to the union before dividing.
pub const DEFAULT_IOU_EPSILON: f64 = 1e-7;

/// Computes the pairwise IoU of `[..., P, 4]` and `[..., T, 4]` center-form boxes.
///
/// Entry `[..., p, t]` of the output is the IoU between box `p` of `boxes` and box `t` of
/// `others`. Intersection extents are clamped at zero, so disjoint boxes produce exactly
/// `0.0`. Zero-area pairs produce `0.0` thanks to `eps` in the denominator.
///
/// # Shapes
///
/// - boxes: `[..., P, 4]`
/// - others: `[..., T, 4]`
/// - output: `[..., P, T]`
///
/// # Panics
///
/// Panics if the rank is below 2, if either input does not end with 4 fields, or if the
/// leading dimensions differ.
pub fn pairwise_iou<B: Backend, const D: usize>(
    boxes: Tensor<B, D>,
    others: Tensor<B, D>,
    eps: f64,
) -> Tensor<B, D> {
    assert!(D >= 2, "Pairwise IoU needs at least a [boxes, 4] tensor");

    let box_dims = boxes.dims();
    let other_dims = others.dims();
    assert_eq!(
        &box_dims[..D - 2],
        &other_dims[..D - 2],
        "Leading dimensions of boxes ({box_dims:?}) must match others ({other_dims:?})"
    );

    let num_boxes = box_dims[D - 2];
    let num_others = other_dims[D - 2];

    // [..., P, 1] -> [..., P, T]
    let lhs = Corners::from_center(boxes).map(|t| t.repeat_dim(D - 1, num_others));
    // [..., T, 1] -> [..., 1, T] -> [..., P, T]
    let rhs = Corners::from_center(others)
        .map(|t| t.swap_dims(D - 2, D - 1).repeat_dim(D - 2, num_boxes));

    let inter_x1 = lhs.x1.max_pair(rhs.x1);
    let inter_y1 = lhs.y1.max_pair(rhs.y1);
    let inter_x2 = lhs.x2.min_pair(rhs.x2);
    let inter_y2 = lhs.y2.min_pair(rhs.y2);

    let intersection =
        (inter_x2 - inter_x1).clamp_min(0.0) * (inter_y2 - inter_y1).clamp_min(0.0);
    let union = lhs.area + rhs.area - intersection.clone();

    intersection / union.add_scalar(eps)
}
