//! Detection loss and its building blocks.

pub mod assignment;
pub mod terms;
pub mod yolo;

pub use assignment::{assign_responsibility, Responsibility};
pub use terms::LossTerms;
pub use yolo::{YoloLoss, YoloLossConfig};
