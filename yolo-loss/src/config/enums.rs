//! Enumeration types for loss configuration.

use burn::prelude::*;

/// Defines what a responsible predictor's confidence is regressed towards.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum ConfidenceTarget {
    /// The IoU between the predictor and its assigned target box (detached).
    Iou,
    /// The objectness stored in the assigned target slot (`1` for real objects).
    Objectness,
}
