//! Sum-squared detection loss over an `S x S` grid of `B` box slots.
//!
//! For every predicted slot the loss picks a responsible target slot (see
//! [`assign_responsibility`]) and then adds up five squared-error terms:
//!
//! ```text
//! coordinate   = λ_coord · Σ 1obj · [(x - x̂)² + (y - ŷ)²]
//! dimension    = λ_coord · Σ 1obj · [(√w - √ŵ)² + (√h - √ĥ)²]
//! object       =           Σ 1resp · (c - IoU)²
//! no-object    = λ_noobj · Σ (1 - 1resp) · c²
//! class        =           Σ 1obj · Σ_k (p_k - p̂_k)²
//! ```
//!
//! where `1obj` marks cells containing at least one target box and `1resp` marks predictors
//! whose assigned target slot carries an object. The result is not normalized by batch size
//! unless a [`Reduction::Mean`] is requested.

use burn::{
    config::Config,
    module::{Content, DisplaySettings, Module, ModuleDisplay},
    nn::loss::Reduction,
    tensor::{backend::Backend, Tensor},
};
use burn_box_ops::{pairwise_iou, safe_sqrt};
use tracing::{debug, trace};

use super::{
    assignment::{assign_responsibility, Responsibility},
    terms::LossTerms,
};
use crate::{
    config::{ConfidenceTarget, GridConfig},
    error::{YoloLossError, YoloLossResult},
    layout::DetectionLayout,
};

/// Configuration for creating a [YOLO loss](YoloLoss).
#[derive(Config, Debug)]
pub struct YoloLossConfig {
    /// Grid the predictions and targets are laid out on.
    #[config(default = "GridConfig::new()")]
    pub grid: GridConfig,
    /// Weight of the coordinate and dimension terms. Default: 5.0
    #[config(default = 5.0)]
    pub lambda_coord: f64,
    /// Weight of the confidence term for non-responsible predictors. Default: 0.5
    #[config(default = 0.5)]
    pub lambda_noobj: f64,
    /// Added to the IoU union. Default: 1e-7
    #[config(default = 1e-7)]
    pub iou_epsilon: f64,
    /// Added under the square root of widths and heights. Default: 1e-9
    #[config(default = 1e-9)]
    pub sqrt_epsilon: f64,
    /// What a responsible predictor's confidence is regressed towards.
    #[config(default = "ConfidenceTarget::Iou")]
    pub confidence_target: ConfidenceTarget,
}

impl YoloLossConfig {
    /// Initialize [YOLO loss](YoloLoss).
    ///
    /// # Errors
    ///
    /// Returns [`YoloLossError::InvalidConfiguration`] if any parameter is out of range.
    pub fn init(&self) -> YoloLossResult<YoloLoss> {
        self.validate()?;
        Ok(YoloLoss::from_config(self))
    }

    /// Checks the grid, the weights and the stabilizing epsilons.
    pub fn validate(&self) -> YoloLossResult<()> {
        self.grid.validate()?;

        for (name, value) in [
            ("lambda_coord", self.lambda_coord),
            ("lambda_noobj", self.lambda_noobj),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(YoloLossError::InvalidConfiguration {
                    reason: format!("{name} must be finite and non-negative, got {value}"),
                });
            }
        }

        if !self.iou_epsilon.is_finite() || self.iou_epsilon <= 0.0 {
            return Err(YoloLossError::InvalidConfiguration {
                reason: format!("iou_epsilon must be positive, got {}", self.iou_epsilon),
            });
        }

        if !self.sqrt_epsilon.is_finite() || self.sqrt_epsilon < 0.0 {
            return Err(YoloLossError::InvalidConfiguration {
                reason: format!(
                    "sqrt_epsilon must be non-negative, got {}",
                    self.sqrt_epsilon
                ),
            });
        }

        Ok(())
    }
}

/// Grid detection loss in the style of YOLO v1.
///
/// Holds no trainable parameters; deriving [`Module`] lets it live inside a training model.
#[derive(Module, Clone, Debug)]
#[module(custom_display)]
pub struct YoloLoss {
    grid_size: usize,
    boxes_per_cell: usize,
    num_classes: usize,
    lambda_coord: f64,
    lambda_noobj: f64,
    iou_epsilon: f64,
    sqrt_epsilon: f64,
    iou_confidence: bool,
}

impl Default for YoloLoss {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleDisplay for YoloLoss {
    fn custom_settings(&self) -> Option<DisplaySettings> {
        DisplaySettings::new()
            .with_new_line_after_attribute(false)
            .optional()
    }

    fn custom_content(&self, content: Content) -> Option<Content> {
        content
            .add("grid_size", &self.grid_size)
            .add("boxes_per_cell", &self.boxes_per_cell)
            .add("num_classes", &self.num_classes)
            .add("lambda_coord", &self.lambda_coord)
            .add("lambda_noobj", &self.lambda_noobj)
            .add("iou_confidence", &self.iou_confidence)
            .optional()
    }
}

impl YoloLoss {
    /// Create a new YOLO loss with the default 7x7x2 grid over 20 classes.
    pub fn new() -> Self {
        Self::from_config(&YoloLossConfig::new())
    }

    fn from_config(config: &YoloLossConfig) -> Self {
        Self {
            grid_size: config.grid.grid_size,
            boxes_per_cell: config.grid.boxes_per_cell,
            num_classes: config.grid.num_classes,
            lambda_coord: config.lambda_coord,
            lambda_noobj: config.lambda_noobj,
            iou_epsilon: config.iou_epsilon,
            sqrt_epsilon: config.sqrt_epsilon,
            iou_confidence: config.confidence_target == ConfidenceTarget::Iou,
        }
    }

    /// Layout of the tensors this loss accepts.
    pub const fn layout(&self) -> DetectionLayout {
        DetectionLayout::new(self.grid_size, self.boxes_per_cell, self.num_classes)
    }

    /// Weight of the coordinate and dimension terms.
    pub const fn lambda_coord(&self) -> f64 {
        self.lambda_coord
    }

    /// Weight of the no-object confidence term.
    pub const fn lambda_noobj(&self) -> f64 {
        self.lambda_noobj
    }

    /// What a responsible predictor's confidence is regressed towards.
    pub const fn confidence_target(&self) -> ConfidenceTarget {
        if self.iou_confidence {
            ConfidenceTarget::Iou
        } else {
            ConfidenceTarget::Objectness
        }
    }

    /// Compute the loss summed over the whole batch.
    ///
    /// # Shapes
    ///
    /// - predictions: `[batch_size, S, S, B * (5 + C)]`
    /// - targets: `[batch_size, S, S, B * (5 + C)]`
    /// - output: `[1]`
    ///
    /// # Errors
    ///
    /// Returns an error if the two shapes differ or do not match the grid.
    pub fn forward<B: Backend>(
        &self,
        predictions: Tensor<B, 4>,
        targets: Tensor<B, 4>,
    ) -> YoloLossResult<Tensor<B, 1>> {
        self.forward_with_reduction(predictions, targets, Reduction::Sum)
    }

    /// Compute the loss with an explicit batch reduction.
    ///
    /// `Reduction::Auto` sums, like [`forward`](Self::forward).
    pub fn forward_with_reduction<B: Backend>(
        &self,
        predictions: Tensor<B, 4>,
        targets: Tensor<B, 4>,
        reduction: Reduction,
    ) -> YoloLossResult<Tensor<B, 1>> {
        Ok(self.forward_detailed(predictions, targets)?.reduce(reduction))
    }

    /// Compute the loss of every batch element.
    ///
    /// # Shapes
    ///
    /// - output: `[batch_size]`
    pub fn forward_no_reduction<B: Backend>(
        &self,
        predictions: Tensor<B, 4>,
        targets: Tensor<B, 4>,
    ) -> YoloLossResult<Tensor<B, 1>> {
        Ok(self.forward_detailed(predictions, targets)?.total())
    }

    /// Compute every loss term separately, per batch element.
    ///
    /// Targets are detached; gradients only reach `predictions`.
    pub fn forward_detailed<B: Backend>(
        &self,
        predictions: Tensor<B, 4>,
        targets: Tensor<B, 4>,
    ) -> YoloLossResult<LossTerms<B>> {
        self.assertions(&predictions, &targets)?;

        let layout = self.layout();
        let [batch_size, rows, cols, _] = predictions.dims();
        let boxes = layout.boxes_per_cell();
        debug!(
            batch_size,
            grid = rows,
            boxes_per_cell = boxes,
            num_classes = layout.num_classes(),
            "computing detection loss"
        );

        let predictions = layout.split_boxes(predictions);
        let targets = layout.split_boxes(targets.detach());

        // [N, S, S, B, 1]
        let cell_mask = self
            .object_mask(targets.clone())
            .reshape([batch_size, rows, cols, 1, 1])
            .repeat_dim(3, boxes);

        let Responsibility {
            aligned_targets,
            matched_iou,
            ..
        } = self.assign(predictions.clone(), targets);

        let coordinate = squared(
            layout.centers(predictions.clone()) - layout.centers(aligned_targets.clone()),
        )
        .sum_dim(4)
            * cell_mask.clone();

        let predicted_roots = safe_sqrt(layout.sizes(predictions.clone()), self.sqrt_epsilon);
        let target_roots = safe_sqrt(layout.sizes(aligned_targets.clone()), self.sqrt_epsilon);
        let dimension = squared(predicted_roots - target_roots).sum_dim(4) * cell_mask.clone();

        let classification = squared(
            layout.classes(predictions.clone()) - layout.classes(aligned_targets.clone()),
        )
        .sum_dim(4)
            * cell_mask.clone();

        let assigned_objectness = layout.confidence(aligned_targets);
        let responsible = assigned_objectness.clone().greater_elem(0.0).float() * cell_mask;
        let confidence_target = match self.confidence_target() {
            ConfidenceTarget::Iou => matched_iou,
            ConfidenceTarget::Objectness => assigned_objectness,
        } * responsible.clone();

        let confidence_error = squared(layout.confidence(predictions) - confidence_target);
        let not_responsible = Tensor::ones_like(&responsible) - responsible.clone();
        let object_confidence = confidence_error.clone() * responsible;
        let no_object_confidence = confidence_error * not_responsible;

        Ok(LossTerms {
            coordinate: per_element(coordinate).mul_scalar(self.lambda_coord),
            dimension: per_element(dimension).mul_scalar(self.lambda_coord),
            object_confidence: per_element(object_confidence),
            no_object_confidence: per_element(no_object_confidence)
                .mul_scalar(self.lambda_noobj),
            classification: per_element(classification),
        })
    }

    /// Cells holding at least one target box with positive objectness.
    ///
    /// # Shapes
    ///
    /// - targets: `[batch_size, S, S, B, 5 + C]`
    /// - output: `[batch_size, S, S, 1]`, `1.0` for object cells and `0.0` elsewhere
    pub fn object_mask<B: Backend>(&self, targets: Tensor<B, 5>) -> Tensor<B, 4> {
        let [batch_size, rows, cols, _, _] = targets.dims();
        self.layout()
            .confidence(targets)
            .max_dim(3)
            .reshape([batch_size, rows, cols, 1])
            .greater_elem(0.0)
            .float()
    }

    /// Pairs every predicted slot with the target slot it overlaps most.
    ///
    /// The overlap is computed on detached predictions, so the assignment and the IoU
    /// confidence target are constants for the backward pass.
    ///
    /// # Shapes
    ///
    /// - predictions: `[batch_size, S, S, B, 5 + C]`
    /// - targets: `[batch_size, S, S, B, 5 + C]`
    pub fn assign<B: Backend>(
        &self,
        predictions: Tensor<B, 5>,
        targets: Tensor<B, 5>,
    ) -> Responsibility<B> {
        let layout = self.layout();
        let overlap = pairwise_iou(
            layout.boxes(predictions.detach()),
            layout.boxes(targets.clone()),
            self.iou_epsilon,
        );
        trace!(dims = ?overlap.dims(), "assigning responsible predictors");

        assign_responsibility(overlap, targets)
    }

    fn assertions<B: Backend>(
        &self,
        predictions: &Tensor<B, 4>,
        targets: &Tensor<B, 4>,
    ) -> YoloLossResult<()> {
        let pred_dims = predictions.dims();
        let target_dims = targets.dims();
        if pred_dims != target_dims {
            return Err(YoloLossError::ShapeMismatch {
                predictions: pred_dims.to_vec(),
                targets: target_dims.to_vec(),
            });
        }

        self.layout().check_dims(pred_dims)
    }
}

fn squared<B: Backend>(tensor: Tensor<B, 5>) -> Tensor<B, 5> {
    tensor.clone() * tensor
}

/// Sums everything but the batch axis, `[N, ...] -> [N]`.
fn per_element<B: Backend>(tensor: Tensor<B, 5>) -> Tensor<B, 1> {
    let [batch_size, ..] = tensor.dims();
    tensor
        .reshape([batch_size as i32, -1])
        .sum_dim(1)
        .reshape([batch_size])
}

#[cfg(test)]
mod tests {
    use burn::tensor::{TensorData, Tolerance};

    use super::*;
    use crate::tests::TestBackend;

    #[test]
    fn yolo_loss_default_matches_paper_weights() {
        let loss = YoloLoss::new();

        assert_eq!(loss.layout().grid_size(), 7);
        assert_eq!(loss.layout().box_stride(), 25);
        assert_eq!(loss.layout().depth(), 50);
        assert!((loss.lambda_coord() - 5.0).abs() < 1e-12);
        assert!((loss.lambda_noobj() - 0.5).abs() < 1e-12);
        assert_eq!(loss.confidence_target(), ConfidenceTarget::Iou);
    }

    #[test]
    fn yolo_loss_config_rejects_out_of_range_parameters() {
        let negative = YoloLossConfig::new().with_lambda_coord(-1.0).init();
        assert!(negative.unwrap_err().is_configuration());

        let nan = YoloLossConfig::new().with_lambda_noobj(f64::NAN).init();
        assert!(nan.unwrap_err().is_configuration());

        let eps = YoloLossConfig::new().with_iou_epsilon(0.0).init();
        assert!(eps.unwrap_err().is_configuration());

        let grid = YoloLossConfig::new()
            .with_grid(GridConfig::new().with_boxes_per_cell(0))
            .init();
        assert!(grid.unwrap_err().is_configuration());
    }

    #[test]
    fn yolo_loss_config_accepts_zero_weights() {
        let loss = YoloLossConfig::new()
            .with_lambda_coord(0.0)
            .with_lambda_noobj(0.0)
            .with_sqrt_epsilon(0.0)
            .init()
            .unwrap();
        assert_eq!(loss.lambda_coord(), 0.0);
    }

    #[test]
    fn yolo_loss_object_mask_marks_cells_with_any_object() {
        let device = Default::default();
        let loss = YoloLossConfig::new()
            .with_grid(GridConfig::new().with_grid_size(1).with_num_classes(1))
            .init()
            .unwrap();

        // Two images with one cell each; only the second slot of image 1 holds an object.
        let targets = Tensor::<TestBackend, 5>::from_data(
            TensorData::new(
                vec![
                    0.5, 0.5, 0.2, 0.2, 0.0, 0.0, //
                    0.5, 0.5, 0.2, 0.2, 0.0, 0.0, //
                    0.5, 0.5, 0.2, 0.2, 0.0, 0.0, //
                    0.5, 0.5, 0.2, 0.2, 1.0, 1.0,
                ],
                [2, 1, 1, 2, 6],
            ),
            &device,
        );

        let expected = TensorData::from([[[[0.0]]], [[[1.0]]]]);
        loss.object_mask(targets)
            .into_data()
            .assert_approx_eq::<f32>(&expected, Tolerance::default());
    }

    #[test]
    fn yolo_loss_reports_grid_and_depth_errors() {
        let device = Default::default();
        let loss = YoloLoss::new();
        let depth = loss.layout().depth();

        let wrong_grid = loss.forward(
            Tensor::<TestBackend, 4>::zeros([1, 5, 5, depth], &device),
            Tensor::<TestBackend, 4>::zeros([1, 5, 5, depth], &device),
        );
        assert!(matches!(
            wrong_grid,
            Err(YoloLossError::GridMismatch { expected: 7, .. })
        ));

        let wrong_depth = loss.forward(
            Tensor::<TestBackend, 4>::zeros([1, 7, 7, 29], &device),
            Tensor::<TestBackend, 4>::zeros([1, 7, 7, 29], &device),
        );
        assert!(matches!(
            wrong_depth,
            Err(YoloLossError::InvalidDepth { depth: 29, .. })
        ));
    }

    #[test]
    fn yolo_loss_display_lists_parameters() {
        let display = format!("{}", YoloLoss::new());

        assert!(display.starts_with("YoloLoss"));
        assert!(display.contains("grid_size: 7"));
        assert!(display.contains("lambda_coord"));
    }
}
