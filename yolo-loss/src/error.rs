use thiserror::Error;

/// The error type for detection loss operations.
///
/// Configuration and shape problems are reported before any tensor arithmetic runs.
/// Numerical degeneracies (zero-area boxes, empty unions, negative widths) are never errors;
/// they are absorbed by clamps and epsilons inside the computation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum YoloLossError {
    /// A grid, box, class or batch dimension is zero, or a weight/epsilon is unusable.
    #[error("Invalid loss configuration: {reason}")]
    InvalidConfiguration {
        /// The reason why the configuration is invalid.
        reason: String,
    },

    /// Prediction and target tensors do not have the same shape.
    #[error("Shape mismatch: predictions {predictions:?} do not match targets {targets:?}")]
    ShapeMismatch {
        /// Shape of the prediction tensor.
        predictions: Vec<usize>,
        /// Shape of the target tensor.
        targets: Vec<usize>,
    },

    /// The spatial dimensions of the input do not match the configured grid.
    #[error("Grid mismatch: expected a {expected}x{expected} grid, got {actual:?}")]
    GridMismatch {
        /// The configured grid side.
        expected: usize,
        /// The spatial dimensions found in the input.
        actual: [usize; 2],
    },

    /// The flat depth cannot be split into the configured box slots.
    #[error(
        "Invalid depth: {depth} is not {boxes_per_cell} boxes of {box_stride} fields each"
    )]
    InvalidDepth {
        /// The depth found in the input.
        depth: usize,
        /// The configured number of boxes per cell.
        boxes_per_cell: usize,
        /// The number of fields per box, `5 + num_classes`.
        box_stride: usize,
    },
}

impl YoloLossError {
    /// Returns `true` for errors caused by an unusable configuration.
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::InvalidConfiguration { .. })
    }

    /// Returns `true` for errors caused by input tensors that do not fit the layout.
    pub const fn is_shape_mismatch(&self) -> bool {
        matches!(
            self,
            Self::ShapeMismatch { .. } | Self::GridMismatch { .. } | Self::InvalidDepth { .. }
        )
    }
}

/// A specialized `Result` type for detection loss operations.
pub type YoloLossResult<T> = Result<T, YoloLossError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_categories_are_disjoint() {
        let config = YoloLossError::InvalidConfiguration {
            reason: "grid_size must be positive".to_owned(),
        };
        let shape = YoloLossError::ShapeMismatch {
            predictions: vec![1, 7, 7, 50],
            targets: vec![1, 7, 7, 25],
        };

        assert!(config.is_configuration());
        assert!(!config.is_shape_mismatch());
        assert!(shape.is_shape_mismatch());
        assert!(!shape.is_configuration());
    }

    #[test]
    fn error_messages_name_the_offending_shapes() {
        let depth = YoloLossError::InvalidDepth {
            depth: 29,
            boxes_per_cell: 2,
            box_stride: 25,
        };
        assert_eq!(
            depth.to_string(),
            "Invalid depth: 29 is not 2 boxes of 25 fields each"
        );

        let grid = YoloLossError::GridMismatch {
            expected: 7,
            actual: [7, 5],
        };
        assert_eq!(
            grid.to_string(),
            "Grid mismatch: expected a 7x7 grid, got [7, 5]"
        );
    }
}
