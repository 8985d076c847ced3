//! Detection Loss Benchmark
//!
//! Times forward+backward passes of the loss on a random batch, the way one training step
//! would run it.
//!
//! ## Usage
//!
//! ```bash
//! # Default 7x7x2 grid over 20 classes, batch of 16
//! cargo run --release --bin bench
//!
//! # Larger batch on the GPU
//! cargo run --release --bin bench --no-default-features --features wgpu -- --batch-size 64
//! ```

use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use burn::{prelude::*, tensor::cast::ToElement};
use clap::Parser;
use tracing::info;
use yolo_loss_burn::{DetectionLayout, YoloLoss};
use yolo_loss_demos::{
    create_device, encode_targets, random_objects, random_predictions, DemoConfig,
    SelectedAutodiffBackend, SelectedDevice, BACKEND_NAME,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override batch size
    #[arg(long)]
    batch_size: Option<usize>,

    /// Override number of timed iterations
    #[arg(long)]
    iterations: Option<usize>,

    /// Override grid side
    #[arg(long)]
    grid_size: Option<usize>,

    /// Override number of classes
    #[arg(long)]
    num_classes: Option<usize>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DemoConfig::load(path)?,
        None => DemoConfig::default(),
    };
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(iterations) = args.iterations {
        config.iterations = iterations;
    }
    if let Some(grid_size) = args.grid_size {
        config.loss.grid.grid_size = grid_size;
    }
    if let Some(num_classes) = args.num_classes {
        config.loss.grid.num_classes = num_classes;
    }
    config.validate()?;

    let loss = config.loss.init()?;
    let layout = loss.layout();
    let device = create_device();
    info!(
        backend = BACKEND_NAME,
        batch_size = config.batch_size,
        grid = layout.grid_size(),
        boxes_per_cell = layout.boxes_per_cell(),
        num_classes = layout.num_classes(),
        "starting loss benchmark"
    );

    let objects = random_objects::<SelectedAutodiffBackend>(
        &layout,
        config.batch_size,
        config.objects_per_image,
        &device,
    )?;
    let targets = Tensor::<SelectedAutodiffBackend, 4>::from_data(
        encode_targets(&layout, config.batch_size, &objects)?,
        &device,
    );

    for _ in 0..config.warmup_iterations {
        training_step(&loss, &layout, &targets, config.batch_size, &device)?;
    }

    let start = Instant::now();
    let mut last_loss = 0.0;
    for iteration in 0..config.iterations {
        last_loss = training_step(&loss, &layout, &targets, config.batch_size, &device)?;
        tracing::debug!(iteration, loss = last_loss, "iteration finished");
    }
    let elapsed = start.elapsed();
    let per_iteration = mean_duration(elapsed, config.iterations);

    info!(
        iterations = config.iterations,
        total_ms = elapsed.as_secs_f64() * 1e3,
        per_iteration_ms = per_iteration.as_secs_f64() * 1e3,
        last_loss,
        "benchmark finished"
    );
    println!("Backend: {BACKEND_NAME}");
    println!("Loss: {loss}");
    println!(
        "{} iterations in {:.2?} ({:.2?} per forward+backward)",
        config.iterations, elapsed, per_iteration
    );

    Ok(())
}

/// Runs one forward and backward pass on fresh random predictions.
fn training_step(
    loss: &YoloLoss,
    layout: &DetectionLayout,
    targets: &Tensor<SelectedAutodiffBackend, 4>,
    batch_size: usize,
    device: &SelectedDevice,
) -> Result<f64> {
    let predictions =
        random_predictions::<SelectedAutodiffBackend>(layout, batch_size, device).require_grad();

    let value = loss.forward(predictions.clone(), targets.clone())?;
    let grads = value.backward();
    let gradient = predictions
        .grad(&grads)
        .context("Predictions did not receive a gradient")?;

    // Reading the gradient back waits for the backward pass on asynchronous backends.
    let _ = gradient.abs().sum().into_scalar();

    Ok(value.into_scalar().to_f64())
}

/// Average duration of one of `iterations` runs; any count is representable.
fn mean_duration(total: Duration, iterations: usize) -> Duration {
    total.div_f64(iterations.max(1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_duration_handles_counts_beyond_u32() {
        let iterations = u32::MAX as usize + 2;
        let total = Duration::from_secs(iterations as u64);

        let mean = mean_duration(total, iterations);
        assert!((mean.as_secs_f64() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn mean_duration_divides_evenly() {
        let mean = mean_duration(Duration::from_millis(300), 3);
        assert!((mean.as_secs_f64() - 0.1).abs() < 1e-9);
    }
}
