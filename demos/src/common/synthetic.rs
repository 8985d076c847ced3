//! Synthetic targets and predictions.
//!
//! [`encode_targets`] is a reference encoder: it turns image-normalized boxes into the flat
//! grid tensor the loss expects, the way a detection data pipeline would.

use anyhow::{ensure, Result};
use burn::{
    prelude::*,
    tensor::{Distribution, TensorData},
};
use serde::{Deserialize, Serialize};
use yolo_loss_burn::{BoxField, DetectionLayout, CLASS_OFFSET};

/// One ground-truth box in image-normalized coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyntheticObject {
    /// Batch element the object belongs to.
    pub image: usize,
    /// Box center, `[0, 1]` across the image.
    pub cx: f32,
    pub cy: f32,
    /// Box size relative to the image.
    pub width: f32,
    pub height: f32,
    pub class: usize,
}

impl SyntheticObject {
    /// Grid cell `(row, col)` containing the box center.
    pub fn cell(&self, grid_size: usize) -> (usize, usize) {
        let side = grid_size as f32;
        let clamp = |v: f32| ((v * side).floor().max(0.0) as usize).min(grid_size - 1);
        (clamp(self.cy), clamp(self.cx))
    }
}

/// Encodes objects into a `[batch_size, S, S, B * (5 + C)]` target tensor.
///
/// Each object goes into the first free slot of the cell containing its center, with
/// `cx, cy` relative to that cell, `w, h` relative to the image, objectness `1` and a
/// one-hot class. Objects that find their cell full are dropped with a warning.
///
/// # Errors
///
/// Returns an error if an object refers to a missing image or class, or lies outside the
/// image.
pub fn encode_targets(
    layout: &DetectionLayout,
    batch_size: usize,
    objects: &[SyntheticObject],
) -> Result<TensorData> {
    let side = layout.grid_size();
    let mut values = vec![0.0f32; batch_size * side * side * layout.depth()];

    for object in objects {
        ensure!(
            object.image < batch_size,
            "Object refers to image {} but the batch has {batch_size}",
            object.image
        );
        ensure!(
            object.class < layout.num_classes(),
            "Object class {} is out of range for {} classes",
            object.class,
            layout.num_classes()
        );
        ensure!(
            (0.0..=1.0).contains(&object.cx) && (0.0..=1.0).contains(&object.cy),
            "Object center ({}, {}) lies outside the image",
            object.cx,
            object.cy
        );
        ensure!(
            object.width > 0.0 && object.height > 0.0,
            "Object size ({}, {}) must be positive",
            object.width,
            object.height
        );

        let (row, col) = object.cell(side);
        let free_slot = (0..layout.boxes_per_cell()).find(|&slot| {
            values[layout.offset(object.image, row, col, slot, BoxField::Confidence.offset())]
                == 0.0
        });
        let Some(slot) = free_slot else {
            tracing::warn!(
                image = object.image,
                row,
                col,
                "grid cell already full, dropping object"
            );
            continue;
        };

        let start = layout.offset(object.image, row, col, slot, 0);
        values[start..start + 5].copy_from_slice(&[
            object.cx * side as f32 - col as f32,
            object.cy * side as f32 - row as f32,
            object.width,
            object.height,
            1.0,
        ]);
        values[start + CLASS_OFFSET + object.class] = 1.0;
    }

    Ok(TensorData::new(
        values,
        [batch_size, side, side, layout.depth()],
    ))
}

/// Uniform `[0, 1)` predictions shaped like the layout.
pub fn random_predictions<B: Backend>(
    layout: &DetectionLayout,
    batch_size: usize,
    device: &B::Device,
) -> Tensor<B, 4> {
    let side = layout.grid_size();
    Tensor::random(
        [batch_size, side, side, layout.depth()],
        Distribution::Uniform(0.0, 1.0),
        device,
    )
}

/// Random objects drawn with the backend's generator, `per_image` for each image.
pub fn random_objects<B: Backend>(
    layout: &DetectionLayout,
    batch_size: usize,
    per_image: usize,
    device: &B::Device,
) -> Result<Vec<SyntheticObject>> {
    let count = batch_size * per_image;
    if count == 0 {
        return Ok(Vec::new());
    }

    let draws = Tensor::<B, 2>::random([count, 5], Distribution::Uniform(0.0, 1.0), device)
        .into_data()
        .to_vec::<f32>()
        .map_err(|err| anyhow::anyhow!("Failed to read random draws: {err:?}"))?;

    let num_classes = layout.num_classes();
    Ok(draws
        .chunks(5)
        .enumerate()
        .map(|(index, draw)| SyntheticObject {
            image: index / per_image,
            cx: draw[0],
            cy: draw[1],
            width: 0.05 + 0.9 * draw[2],
            height: 0.05 + 0.9 * draw[3],
            class: ((draw[4] * num_classes as f32) as usize).min(num_classes - 1),
        })
        .collect())
}
