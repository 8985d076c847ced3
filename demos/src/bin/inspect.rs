//! Detection Loss Inspector
//!
//! Scores one synthetic batch and prints the loss terms together with the predictor that
//! was made responsible for each object cell.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin inspect
//! cargo run --bin inspect -- --objects 5 --config demo.json
//! ```

use std::{collections::BTreeMap, path::PathBuf};

use anyhow::{Context, Result};
use burn::prelude::*;
use clap::Parser;
use tracing::info;
use yolo_loss_burn::BoxField;
use yolo_loss_demos::{
    create_device, encode_targets, random_objects, random_predictions, DemoConfig,
    SelectedBackend, BACKEND_NAME,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Images in the synthetic batch
    #[arg(long, default_value = "1")]
    batch_size: usize,

    /// Override objects per image
    #[arg(long)]
    objects: Option<usize>,
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
    config.batch_size = args.batch_size;
    if let Some(objects) = args.objects {
        config.objects_per_image = objects;
    }
    config.validate()?;

    let loss = config.loss.init()?;
    let layout = loss.layout();
    let device = create_device();
    info!(backend = BACKEND_NAME, %loss, "inspecting detection loss");

    let objects = random_objects::<SelectedBackend>(
        &layout,
        config.batch_size,
        config.objects_per_image,
        &device,
    )?;
    for object in &objects {
        info!(?object, cell = ?object.cell(layout.grid_size()), "synthetic object");
    }

    let target_data = encode_targets(&layout, config.batch_size, &objects)?;
    let targets = Tensor::<SelectedBackend, 4>::from_data(target_data.clone(), &device);
    let predictions = random_predictions::<SelectedBackend>(&layout, config.batch_size, &device);

    let terms = loss.forward_detailed(predictions.clone(), targets.clone())?;
    let summary: BTreeMap<_, _> = terms.summary().into_iter().collect();
    println!("Loss terms (summed over {} images):", config.batch_size);
    for (name, value) in &summary {
        println!("  {name:>22}: {value:.6}");
    }

    let assignment = loss.assign(
        layout.split_boxes(predictions.clone()),
        layout.split_boxes(targets),
    );
    let indices = assignment
        .indices
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|err| anyhow::anyhow!("Failed to read assignment indices: {err:?}"))?;
    let matched_iou = assignment
        .matched_iou
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|err| anyhow::anyhow!("Failed to read matched IoU: {err:?}"))?;
    let target_values = target_data
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|err| anyhow::anyhow!("Failed to read targets: {err:?}"))?;
    let prediction_values = predictions
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|err| anyhow::anyhow!("Failed to read predictions: {err:?}"))?;

    let side = layout.grid_size();
    let boxes = layout.boxes_per_cell();
    println!("Responsible predictors:");
    for batch in 0..config.batch_size {
        for row in 0..side {
            for col in 0..side {
                let target_cell = layout.cell(&target_values, batch, row, col);
                if !target_cell.has_object() {
                    continue;
                }
                let predicted_cell = layout.cell(&prediction_values, batch, row, col);

                println!("  image {batch} cell ({row}, {col}):");
                for slot in 0..boxes {
                    let flat = ((batch * side + row) * side + col) * boxes + slot;
                    let target_slot = usize::try_from(indices[flat])
                        .context("Assignment produced a negative index")?;
                    let [cx, cy, w, h] = predicted_cell.bbox(slot);
                    println!(
                        "    predictor {slot} ({cx:.3}, {cy:.3}, {w:.3}, {h:.3}) conf {:.3} -> \
                         target {target_slot} (objectness {:.0}, class {}) IoU {:.3}",
                        predicted_cell.field(slot, BoxField::Confidence),
                        target_cell.field(target_slot, BoxField::Confidence),
                        target_cell.best_class(target_slot),
                        matched_iou[flat],
                    );
                }
            }
        }
    }

    Ok(())
}
