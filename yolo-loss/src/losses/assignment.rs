//! Responsibility assignment between predicted and target box slots.
//!
//! Every predicted slot is paired with the target slot it overlaps most within the same
//! cell (arg-max over the target axis, lowest index on ties). This is the per-predictor
//! direction: two predictors may pick the same target, and a target may be picked by none.
//! The per-target rule of the original YOLO paper (each ground-truth box picks its single
//! best predictor) is intentionally not used, so with `B > 1` a predictor that overlaps an
//! empty target slot is still pulled towards that slot's values.
//!
//! Cells without objects get a deterministic but meaningless pairing; the loss masks it out.

use burn::prelude::*;
use burn_box_ops::first_argmax;

/// Result of pairing every predicted slot with a target slot.
#[derive(Debug, Clone)]
pub struct Responsibility<B: Backend> {
    /// Pairwise IoU, `[N, S, S, B_pred, B_target]`.
    pub overlap: Tensor<B, 5>,
    /// Index of the target slot assigned to each predicted slot, `[N, S, S, B]`.
    pub indices: Tensor<B, 4, Int>,
    /// Target values gathered per predicted slot, `[N, S, S, B, 5 + C]`.
    pub aligned_targets: Tensor<B, 5>,
    /// IoU between each predicted slot and its assigned target, `[N, S, S, B, 1]`.
    pub matched_iou: Tensor<B, 5>,
}

/// Pairs every predicted slot with the target slot of highest overlap.
///
/// # Shapes
///
/// - overlap: `[N, S, S, B, B]`
/// - targets: `[N, S, S, B, 5 + C]`
///
/// # Panics
///
/// Panics if the overlap matrix does not cover the target slots.
pub fn assign_responsibility<B: Backend>(
    overlap: Tensor<B, 5>,
    targets: Tensor<B, 5>,
) -> Responsibility<B> {
    let [batch_size, rows, cols, boxes, target_boxes] = overlap.dims();
    let [_, _, _, slots, stride] = targets.dims();
    assert_eq!(
        target_boxes, slots,
        "Overlap matrix covers {target_boxes} target slots but targets have {slots}"
    );

    // [N, S, S, B, 1]
    let best = first_argmax(overlap.clone(), 4);

    let aligned_targets = targets.gather(3, best.clone().repeat_dim(4, stride));
    let matched_iou = overlap.clone().gather(4, best.clone());

    Responsibility {
        overlap,
        indices: best.reshape([batch_size, rows, cols, boxes]),
        aligned_targets,
        matched_iou,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TestBackend;
    use burn::tensor::TensorData;

    /// One cell, two slots, one class: `[1, 1, 1, 2, 6]`.
    fn cell_targets(slots: [[f32; 6]; 2]) -> Tensor<TestBackend, 5> {
        let values: Vec<f32> = slots.iter().flatten().copied().collect();
        Tensor::from_data(TensorData::new(values, [1, 1, 1, 2, 6]), &Default::default())
    }

    fn cell_overlap(values: [[f32; 2]; 2]) -> Tensor<TestBackend, 5> {
        let values: Vec<f32> = values.iter().flatten().copied().collect();
        Tensor::from_data(TensorData::new(values, [1, 1, 1, 2, 2]), &Default::default())
    }

    #[test]
    fn assignment_gathers_best_target_per_predictor() {
        let targets = cell_targets([
            [0.2, 0.2, 0.1, 0.1, 1.0, 1.0],
            [0.8, 0.8, 0.3, 0.3, 1.0, 0.0],
        ]);
        // Predictor 0 overlaps target 1 best, predictor 1 overlaps target 0 best.
        let overlap = cell_overlap([[0.1, 0.6], [0.7, 0.0]]);

        let assignment = assign_responsibility(overlap, targets);

        assert_eq!(
            assignment.indices.into_data().to_vec::<i64>().unwrap(),
            vec![1, 0]
        );
        assert_eq!(
            assignment.aligned_targets.into_data().to_vec::<f32>().unwrap(),
            vec![0.8, 0.8, 0.3, 0.3, 1.0, 0.0, 0.2, 0.2, 0.1, 0.1, 1.0, 1.0]
        );
        assert_eq!(
            assignment.matched_iou.into_data().to_vec::<f32>().unwrap(),
            vec![0.6, 0.7]
        );
    }

    #[test]
    fn assignment_ties_pick_lowest_target_index() {
        let targets = cell_targets([[0.5; 6], [0.25; 6]]);
        let overlap = cell_overlap([[0.4, 0.4], [0.0, 0.0]]);

        let assignment = assign_responsibility(overlap, targets);
        assert_eq!(
            assignment.indices.into_data().to_vec::<i64>().unwrap(),
            vec![0, 0]
        );
    }

    #[test]
    fn assignment_is_reproducible() {
        let device = Default::default();
        let overlap = Tensor::<TestBackend, 5>::random(
            [2, 3, 3, 2, 2],
            burn::tensor::Distribution::Uniform(0.0, 1.0),
            &device,
        );
        let targets = Tensor::<TestBackend, 5>::random(
            [2, 3, 3, 2, 7],
            burn::tensor::Distribution::Uniform(0.0, 1.0),
            &device,
        );

        let first = assign_responsibility(overlap.clone(), targets.clone());
        let second = assign_responsibility(overlap, targets);

        assert_eq!(first.indices.dims(), [2, 3, 3, 2]);
        assert_eq!(first.aligned_targets.dims(), [2, 3, 3, 2, 7]);
        assert_eq!(first.indices.into_data(), second.indices.into_data());
        assert_eq!(
            first.aligned_targets.into_data(),
            second.aligned_targets.into_data()
        );
    }
}
