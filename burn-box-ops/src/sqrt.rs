//! Square root that stays defined for momentarily negative inputs and keeps a finite
//! gradient at zero.

use burn::prelude::*;

/// Computes `sqrt(max(x, 0) + eps)`.
///
/// Lanes with `x <= 0` never reach the square root: they are filled with the constant
/// `sqrt(eps)` and receive a zero gradient, so the backward pass stays finite even with
/// `eps = 0`. Positive lanes get the usual `1 / (2 * sqrt(x + eps))`.
pub fn safe_sqrt<B: Backend, const D: usize>(tensor: Tensor<B, D>, eps: f64) -> Tensor<B, D> {
    let clamped = tensor.clone().lower_equal_elem(0.0);

    // Clamped lanes are rooted at 1 and then overwritten, keeping their gradient at 0.
    tensor
        .mask_fill(clamped.clone(), 1.0)
        .add_scalar(eps)
        .sqrt()
        .mask_fill(clamped, eps.sqrt())
}
