//! Bounding-box operations for the Burn deep learning framework
//!
//! This crate provides the box geometry that grid detectors need during training but that
//! is not available in the core Burn framework: center/corner conversion, pairwise IoU,
//! a deterministic arg-max and a clamped square root. All operations are plain tensor
//! arithmetic, so they run on any backend and are differentiable under `Autodiff`.

use burn::prelude::*;

mod argmax;
mod corners;
mod overlap;
mod sqrt;

// Convenient re-exports
pub use argmax::first_argmax;
pub use corners::{cxcywh_to_xyxy, Corners};
pub use overlap::{pairwise_iou, DEFAULT_IOU_EPSILON};
pub use sqrt::safe_sqrt;

/// Box operations for Burn tensors
pub trait TensorBoxOps<B: Backend, const D: usize> {
    /// Pairwise IoU of `[..., P, 4]` boxes against `[..., T, 4]` boxes, see [`pairwise_iou`].
    fn pairwise_iou(self, others: Self, eps: f64) -> Self;

    /// Lowest index of the maximum along `dim`, see [`first_argmax`].
    fn first_argmax(self, dim: usize) -> Tensor<B, D, Int>;

    /// Clamped square root, see [`safe_sqrt`].
    fn safe_sqrt(self, eps: f64) -> Self;
}

impl<B: Backend, const D: usize> TensorBoxOps<B, D> for Tensor<B, D> {
    fn pairwise_iou(self, others: Self, eps: f64) -> Self {
        overlap::pairwise_iou(self, others, eps)
    }

    fn first_argmax(self, dim: usize) -> Tensor<B, D, Int> {
        argmax::first_argmax(self, dim)
    }

    fn safe_sqrt(self, eps: f64) -> Self {
        sqrt::safe_sqrt(self, eps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{ndarray::NdArray, Autodiff},
        tensor::{Distribution, Tensor},
    };

    type TestBackend = Autodiff<NdArray<f32>>;

    #[test]
    fn test_tensor_box_ops() {
        let device = Default::default();
        let boxes = Tensor::<TestBackend, 5>::random(
            [2, 7, 7, 2, 4],
            Distribution::Uniform(0.0, 1.0),
            &device,
        );

        let iou = boxes.clone().pairwise_iou(boxes, DEFAULT_IOU_EPSILON);
        assert_eq!(iou.dims(), [2, 7, 7, 2, 2]);

        let best = iou.first_argmax(4);
        assert_eq!(best.dims(), [2, 7, 7, 2, 1]);
    }
}
