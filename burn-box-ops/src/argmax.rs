//! # First-index Arg-max
//!
//! `Tensor::argmax` leaves the choice among equal maxima to the backend. Matching predictors
//! to targets needs a reproducible answer, so this variant always returns the lowest index
//! that attains the maximum.

use burn::prelude::*;

/// Returns the lowest index attaining the maximum along `dim`.
///
/// The reduced dimension is kept with size `1`, like `Tensor::argmax`. The selection is
/// computed with comparisons and a `min_dim` over candidate indices, without host-side
/// branching.
///
/// # Panics
///
/// Panics if `dim` is out of range or the reduced dimension is empty.
pub fn first_argmax<B: Backend, const D: usize>(
    tensor: Tensor<B, D>,
    dim: usize,
) -> Tensor<B, D, Int> {
    assert!(dim < D, "Dimension {dim} is out of range for a rank-{D} tensor");

    let dims = tensor.dims();
    let size = dims[dim];
    assert!(size > 0, "Cannot take the arg-max of an empty dimension {dim}");

    let device = tensor.device();
    let max = tensor.clone().max_dim(dim).repeat_dim(dim, size);
    let below_max = tensor.lower(max);

    let mut index_shape = [1usize; D];
    index_shape[dim] = size;
    let mut indices: Tensor<B, D, Int> =
        Tensor::<B, 1, Int>::arange(0..size as i64, &device).reshape(index_shape);
    for (axis, &len) in dims.iter().enumerate() {
        if axis != dim {
            indices = indices.repeat_dim(axis, len);
        }
    }

    // Non-maximal positions are pushed past the last valid index.
    indices.mask_fill(below_max, size as i64).min_dim(dim)
}
