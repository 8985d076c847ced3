//! Common utilities for the loss demos.

pub mod backend;
pub mod synthetic;

pub use backend::{
    create_device, SelectedAutodiffBackend, SelectedBackend, SelectedDevice, BACKEND_NAME,
};
pub use synthetic::{encode_targets, random_objects, random_predictions, SyntheticObject};
