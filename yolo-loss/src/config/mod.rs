//! Configuration module for the detection loss.
//!
//! - `core`: the grid layout structure shared by the loss and its callers
//! - `enums`: enumeration types used in configurations

pub mod core;
pub mod enums;

pub use self::core::GridConfig;
pub use self::enums::ConfidenceTarget;
