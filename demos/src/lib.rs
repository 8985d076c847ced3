//! YOLO Loss Demos
//!
//! Small applications around the detection loss: a benchmark of the forward and backward
//! passes and an inspector that prints how a synthetic batch is scored.
//!
//! ## Available Demos
//!
//! - `bench`: Times repeated forward+backward passes on random data
//! - `inspect`: Breaks one loss evaluation down into terms and per-cell assignments
//!
//! ## Usage
//!
//! ```bash
//! # Benchmark with the default 7x7x2 grid over 20 classes
//! cargo run --release --bin bench
//!
//! # Benchmark a configuration file on the GPU
//! cargo run --release --bin bench --no-default-features --features wgpu -- --config demo.json
//!
//! # Inspect a synthetic batch
//! RUST_LOG=info cargo run --bin inspect -- --objects 3
//! ```

pub mod common;
pub mod config;

// Re-export commonly used items
pub use common::{
    create_device, encode_targets, random_objects, random_predictions, SelectedAutodiffBackend,
    SelectedBackend, SelectedDevice, SyntheticObject, BACKEND_NAME,
};
pub use config::DemoConfig;
