//! # Center-form to Corner-form Conversion
//!
//! Boxes arrive as `(cx, cy, w, h)` in the last dimension of a tensor. The overlap
//! computation works on corner coordinates `(x1, y1, x2, y2)`, kept here as separate
//! single-column tensors so that each coordinate can be broadcast independently.

use burn::prelude::*;

/// Corner coordinates and area of a box collection.
///
/// Every field has the shape of the source tensor with the last dimension reduced to `1`.
#[derive(Debug, Clone)]
pub struct Corners<B: Backend, const D: usize> {
    /// Left edge, `cx - w / 2`.
    pub x1: Tensor<B, D>,
    /// Top edge, `cy - h / 2`.
    pub y1: Tensor<B, D>,
    /// Right edge, `cx + w / 2`.
    pub x2: Tensor<B, D>,
    /// Bottom edge, `cy + h / 2`.
    pub y2: Tensor<B, D>,
    /// Area from the center-form `w * h`, not from the corners.
    pub area: Tensor<B, D>,
}

impl<B: Backend, const D: usize> Corners<B, D> {
    /// Splits a `[..., 4]` center-form box tensor into corner coordinates.
    ///
    /// Widths and heights are used as given; negative extents are not corrected.
    ///
    /// # Panics
    ///
    /// Panics if the last dimension is not `4`.
    pub fn from_center(boxes: Tensor<B, D>) -> Self {
        let last = D - 1;
        let fields = boxes.dims()[last];
        assert_eq!(
            fields, 4,
            "Center-form boxes must have 4 fields in the last dimension, got {fields}"
        );

        let cx = boxes.clone().narrow(last, 0, 1);
        let cy = boxes.clone().narrow(last, 1, 1);
        let w = boxes.clone().narrow(last, 2, 1);
        let h = boxes.narrow(last, 3, 1);

        let half_w = w.clone().div_scalar(2.0);
        let half_h = h.clone().div_scalar(2.0);

        Self {
            x1: cx.clone() - half_w.clone(),
            y1: cy.clone() - half_h.clone(),
            x2: cx + half_w,
            y2: cy + half_h,
            area: w * h,
        }
    }

    /// Applies the same shape transformation to every field.
    pub fn map(self, f: impl Fn(Tensor<B, D>) -> Tensor<B, D>) -> Self {
        Self {
            x1: f(self.x1),
            y1: f(self.y1),
            x2: f(self.x2),
            y2: f(self.y2),
            area: f(self.area),
        }
    }

    /// Joins the corners back into a `[..., 4]` tensor ordered `(x1, y1, x2, y2)`.
    pub fn into_tensor(self) -> Tensor<B, D> {
        Tensor::cat(vec![self.x1, self.y1, self.x2, self.y2], D - 1)
    }
}

/// Converts `[..., 4]` center-form boxes into `[..., 4]` corner-form boxes.
pub fn cxcywh_to_xyxy<B: Backend, const D: usize>(boxes: Tensor<B, D>) -> Tensor<B, D> {
    Corners::from_center(boxes).into_tensor()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::ndarray::NdArray, tensor::TensorData};

    type TestBackend = NdArray<f32>;

    #[test]
    fn corners_from_center_unit_box() {
        let device = Default::default();
        let boxes = Tensor::<TestBackend, 2>::from_data(
            TensorData::from([[0.5, 0.5, 1.0, 1.0], [0.25, 0.75, 0.5, 0.1]]),
            &device,
        );

        let corners = cxcywh_to_xyxy(boxes)
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        let expected = [0.0, 0.0, 1.0, 1.0, 0.0, 0.7, 0.5, 0.8];

        for (actual, expected) in corners.iter().zip(expected) {
            assert!(
                (actual - expected).abs() < 1e-6,
                "corner {actual} != {expected}"
            );
        }
    }

    #[test]
    fn corners_area_uses_center_form_extent() {
        let device = Default::default();
        let boxes = Tensor::<TestBackend, 2>::from_data(
            TensorData::from([[0.5, 0.5, 0.5, 0.25], [0.0, 0.0, 0.0, 3.0]]),
            &device,
        );

        let area = Corners::from_center(boxes)
            .area
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert_eq!(area, vec![0.125, 0.0]);
    }

    #[test]
    #[should_panic = "Center-form boxes must have 4 fields"]
    fn corners_wrong_field_count_panics() {
        let device = Default::default();
        let boxes = Tensor::<TestBackend, 2>::zeros([2, 5], &device);
        let _corners = Corners::from_center(boxes);
    }
}
