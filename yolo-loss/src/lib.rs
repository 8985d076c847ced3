//! Grid-based object detection loss for the Burn deep learning framework.
//!
//! A detector following the YOLO v1 recipe predicts, for each cell of an `S x S` grid,
//! `B` candidate boxes `(cx, cy, w, h, confidence)` plus `C` class scores per box. This
//! crate turns such a prediction and an encoded target of the same shape into a scalar
//! sum-squared loss that Burn's autodiff can differentiate.
//!
//! The computation has three stages:
//!
//! - **Overlap**: pairwise IoU between every predicted and every target slot of a cell,
//!   via [`burn_box_ops::pairwise_iou`].
//! - **Assignment**: each predicted slot takes the target slot it overlaps most
//!   ([`assign_responsibility`]).
//! - **Masked loss**: coordinate, dimension, confidence and class errors, masked by the
//!   cells that contain objects ([`YoloLoss`]).
//!
//! ## Usage Example
//!
//! ```rust
//! use burn::{backend::NdArray, prelude::*};
//! use yolo_loss_burn::{GridConfig, YoloLossConfig};
//!
//! let loss = YoloLossConfig::new()
//!     .with_grid(GridConfig::new().with_num_classes(3))
//!     .init()
//!     .unwrap();
//!
//! let device = Default::default();
//! let depth = loss.layout().depth();
//! let predictions = Tensor::<NdArray, 4>::zeros([2, 7, 7, depth], &device);
//! let targets = Tensor::<NdArray, 4>::zeros([2, 7, 7, depth], &device);
//!
//! let value = loss.forward(predictions, targets).unwrap();
//! assert_eq!(value.dims(), [1]);
//! ```
//!
//! Shapes and configuration are validated before any tensor arithmetic and reported as
//! [`YoloLossError`]. The loss is not normalized by batch size unless
//! [`YoloLoss::forward_with_reduction`] is called with `Reduction::Mean`.

pub mod config;
pub mod error;
pub mod layout;
pub mod losses;

pub use config::{ConfidenceTarget, GridConfig};
pub use error::{YoloLossError, YoloLossResult};
pub use layout::{BoxField, CellView, DetectionLayout, CLASS_OFFSET};
pub use losses::{
    assign_responsibility, LossTerms, Responsibility, YoloLoss, YoloLossConfig,
};
