//! Fixed-stride view of the flat detection tensor.
//!
//! Networks and encoders exchange `[N, S, S, B * (5 + C)]` tensors. The loss works on the
//! `[N, S, S, B, 5 + C]` view, and callers that inspect values on the host use
//! [`CellView`] over the flat buffer. Both are described once by [`DetectionLayout`] so
//! that the field offsets are never recomputed by hand.

use burn::prelude::*;

use crate::error::{YoloLossError, YoloLossResult};

/// Named fields at the start of every box slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoxField {
    /// Box center, x coordinate.
    CenterX,
    /// Box center, y coordinate.
    CenterY,
    /// Box width.
    Width,
    /// Box height.
    Height,
    /// Objectness confidence.
    Confidence,
}

impl BoxField {
    /// Every named field in storage order.
    pub const ALL: [Self; 5] = [
        Self::CenterX,
        Self::CenterY,
        Self::Width,
        Self::Height,
        Self::Confidence,
    ];

    /// Offset of the field inside a box slot.
    pub const fn offset(self) -> usize {
        match self {
            Self::CenterX => 0,
            Self::CenterY => 1,
            Self::Width => 2,
            Self::Height => 3,
            Self::Confidence => 4,
        }
    }
}

/// Offset of the first class score inside a box slot.
pub const CLASS_OFFSET: usize = 5;

/// Validated grid layout: `S`, `B` and `C` are all positive.
///
/// Obtain one through [`GridConfig::layout`](crate::GridConfig::layout).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionLayout {
    grid_size: usize,
    boxes_per_cell: usize,
    num_classes: usize,
}

impl DetectionLayout {
    pub(crate) const fn new(
        grid_size: usize,
        boxes_per_cell: usize,
        num_classes: usize,
    ) -> Self {
        Self {
            grid_size,
            boxes_per_cell,
            num_classes,
        }
    }

    pub const fn grid_size(&self) -> usize {
        self.grid_size
    }

    pub const fn boxes_per_cell(&self) -> usize {
        self.boxes_per_cell
    }

    pub const fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Fields per box slot, `5 + C`.
    pub const fn box_stride(&self) -> usize {
        CLASS_OFFSET + self.num_classes
    }

    /// Flat depth of one cell, `B * (5 + C)`.
    pub const fn depth(&self) -> usize {
        self.boxes_per_cell * self.box_stride()
    }

    /// Checks that `[N, S, S, D]` dimensions fit this layout.
    ///
    /// # Errors
    ///
    /// - [`YoloLossError::InvalidConfiguration`] for an empty batch.
    /// - [`YoloLossError::GridMismatch`] if the spatial dimensions are not `S x S`.
    /// - [`YoloLossError::InvalidDepth`] if `D` is not `B * (5 + C)`.
    pub fn check_dims(&self, dims: [usize; 4]) -> YoloLossResult<()> {
        let [batch_size, rows, cols, depth] = dims;

        if batch_size == 0 {
            return Err(YoloLossError::InvalidConfiguration {
                reason: "batch size must be positive, got 0".to_owned(),
            });
        }

        if rows != self.grid_size || cols != self.grid_size {
            return Err(YoloLossError::GridMismatch {
                expected: self.grid_size,
                actual: [rows, cols],
            });
        }

        if depth != self.depth() {
            return Err(YoloLossError::InvalidDepth {
                depth,
                boxes_per_cell: self.boxes_per_cell,
                box_stride: self.box_stride(),
            });
        }

        Ok(())
    }

    /// Reshapes `[N, S, S, B * (5 + C)]` into `[N, S, S, B, 5 + C]`.
    ///
    /// The dimensions must already have passed [`check_dims`](Self::check_dims).
    pub fn split_boxes<B: Backend>(&self, tensor: Tensor<B, 4>) -> Tensor<B, 5> {
        let [batch_size, rows, cols, _] = tensor.dims();
        tensor.reshape([
            batch_size,
            rows,
            cols,
            self.boxes_per_cell,
            self.box_stride(),
        ])
    }

    /// `(cx, cy, w, h)` of every box slot: `[N, S, S, B, 4]`.
    pub fn boxes<B: Backend>(&self, slots: Tensor<B, 5>) -> Tensor<B, 5> {
        slots.narrow(4, 0, 4)
    }

    /// `(cx, cy)` of every box slot: `[N, S, S, B, 2]`.
    pub fn centers<B: Backend>(&self, slots: Tensor<B, 5>) -> Tensor<B, 5> {
        slots.narrow(4, BoxField::CenterX.offset(), 2)
    }

    /// `(w, h)` of every box slot: `[N, S, S, B, 2]`.
    pub fn sizes<B: Backend>(&self, slots: Tensor<B, 5>) -> Tensor<B, 5> {
        slots.narrow(4, BoxField::Width.offset(), 2)
    }

    /// Objectness of every box slot: `[N, S, S, B, 1]`.
    pub fn confidence<B: Backend>(&self, slots: Tensor<B, 5>) -> Tensor<B, 5> {
        slots.narrow(4, BoxField::Confidence.offset(), 1)
    }

    /// Class scores of every box slot: `[N, S, S, B, C]`.
    pub fn classes<B: Backend>(&self, slots: Tensor<B, 5>) -> Tensor<B, 5> {
        slots.narrow(4, CLASS_OFFSET, self.num_classes)
    }

    /// Flat offset of field `field` of box `slot` in cell `(row, col)` of batch element
    /// `batch`, for a row-major `[N, S, S, B * (5 + C)]` buffer.
    pub const fn offset(
        &self,
        batch: usize,
        row: usize,
        col: usize,
        slot: usize,
        field: usize,
    ) -> usize {
        let cell = (batch * self.grid_size + row) * self.grid_size + col;
        cell * self.depth() + slot * self.box_stride() + field
    }

    /// Borrows one cell of a flat row-major buffer.
    ///
    /// # Panics
    ///
    /// Panics if the cell lies outside `data`.
    pub fn cell<'a>(
        &self,
        data: &'a [f32],
        batch: usize,
        row: usize,
        col: usize,
    ) -> CellView<'a> {
        let start = self.offset(batch, row, col, 0, 0);
        let end = start + self.depth();
        assert!(
            end <= data.len(),
            "Cell ({batch}, {row}, {col}) ends at {end}, past the buffer length {}",
            data.len()
        );

        CellView {
            values: &data[start..end],
            layout: *self,
        }
    }
}

/// Read-only `(box, field)` access to one grid cell of a flat buffer, without copying.
#[derive(Debug, Clone, Copy)]
pub struct CellView<'a> {
    values: &'a [f32],
    layout: DetectionLayout,
}

impl<'a> CellView<'a> {
    /// Number of box slots in the cell.
    pub const fn boxes_per_cell(&self) -> usize {
        self.layout.boxes_per_cell
    }

    /// Value of a named field of box `slot`.
    pub fn field(&self, slot: usize, field: BoxField) -> f32 {
        self.value(slot, field.offset())
    }

    /// Raw value at `index` inside the `5 + C` fields of box `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot` or `index` is out of range.
    pub fn value(&self, slot: usize, index: usize) -> f32 {
        assert!(slot < self.layout.boxes_per_cell, "Box slot {slot} out of range");
        assert!(index < self.layout.box_stride(), "Field {index} out of range");
        self.values[slot * self.layout.box_stride() + index]
    }

    /// `[cx, cy, w, h]` of box `slot`.
    pub fn bbox(&self, slot: usize) -> [f32; 4] {
        [
            self.field(slot, BoxField::CenterX),
            self.field(slot, BoxField::CenterY),
            self.field(slot, BoxField::Width),
            self.field(slot, BoxField::Height),
        ]
    }

    /// Class scores of box `slot`.
    pub fn class_scores(&self, slot: usize) -> &'a [f32] {
        assert!(slot < self.layout.boxes_per_cell, "Box slot {slot} out of range");
        let start = slot * self.layout.box_stride() + CLASS_OFFSET;
        &self.values[start..start + self.layout.num_classes]
    }

    /// Index of the highest class score of box `slot`, lowest index on ties.
    pub fn best_class(&self, slot: usize) -> usize {
        self.class_scores(slot)
            .iter()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |(best, max), (index, &score)| {
                if score > max {
                    (index, score)
                } else {
                    (best, max)
                }
            })
            .0
    }

    /// Whether any box slot has a positive objectness, matching the loss object mask.
    pub fn has_object(&self) -> bool {
        (0..self.boxes_per_cell()).any(|slot| self.field(slot, BoxField::Confidence) > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{tests::TestBackend, GridConfig};
    use burn::tensor::TensorData;

    fn small_layout() -> DetectionLayout {
        GridConfig::new()
            .with_grid_size(2)
            .with_boxes_per_cell(2)
            .with_num_classes(3)
            .layout()
            .unwrap()
    }

    #[test]
    fn layout_strides_follow_grid_config() {
        let layout = small_layout();
        assert_eq!(layout.box_stride(), 8);
        assert_eq!(layout.depth(), 16);
        assert_eq!(layout.offset(0, 0, 0, 1, 0), 8);
        assert_eq!(layout.offset(0, 1, 0, 0, 0), 32);
        assert_eq!(layout.offset(1, 0, 0, 0, 4), 68);
    }

    #[test]
    fn layout_check_dims_reports_each_problem() {
        let layout = small_layout();

        assert!(layout.check_dims([3, 2, 2, 16]).is_ok());
        assert!(matches!(
            layout.check_dims([0, 2, 2, 16]),
            Err(YoloLossError::InvalidConfiguration { .. })
        ));
        assert_eq!(
            layout.check_dims([1, 2, 3, 16]),
            Err(YoloLossError::GridMismatch {
                expected: 2,
                actual: [2, 3],
            })
        );
        assert_eq!(
            layout.check_dims([1, 2, 2, 15]),
            Err(YoloLossError::InvalidDepth {
                depth: 15,
                boxes_per_cell: 2,
                box_stride: 8,
            })
        );
    }

    #[test]
    fn layout_tensor_fields_match_flat_offsets() {
        let layout = small_layout();
        let device = Default::default();
        let values: Vec<f32> = (0..layout.depth() * 4).map(|v| v as f32).collect();
        let flat =
            Tensor::<TestBackend, 4>::from_data(TensorData::new(values, [1, 2, 2, 16]), &device);

        let slots = layout.split_boxes(flat);
        assert_eq!(slots.dims(), [1, 2, 2, 2, 8]);

        let confidence = layout
            .confidence(slots.clone())
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        let expected: Vec<f32> = (0..2)
            .flat_map(|row| (0..2).map(move |col| (row, col)))
            .flat_map(|(row, col)| (0..2).map(move |slot| (row, col, slot)))
            .map(|(row, col, slot)| layout.offset(0, row, col, slot, 4) as f32)
            .collect();
        assert_eq!(confidence, expected);

        assert_eq!(layout.boxes(slots.clone()).dims(), [1, 2, 2, 2, 4]);
        assert_eq!(layout.sizes(slots.clone()).dims(), [1, 2, 2, 2, 2]);
        assert_eq!(layout.classes(slots).dims(), [1, 2, 2, 2, 3]);
    }

    #[test]
    fn cell_view_reads_fields_without_copying() {
        let layout = small_layout();
        let mut data = vec![0.0f32; layout.depth() * 4];
        let slot = layout.offset(0, 1, 0, 1, 0);
        data[slot..slot + 8].copy_from_slice(&[0.5, 0.25, 0.1, 0.2, 1.0, 0.0, 0.0, 1.0]);

        let cell = layout.cell(&data, 0, 1, 0);
        assert!(cell.has_object());
        assert_eq!(cell.bbox(1), [0.5, 0.25, 0.1, 0.2]);
        assert_eq!(cell.field(1, BoxField::Confidence), 1.0);
        assert_eq!(cell.class_scores(1), &[0.0, 0.0, 1.0]);
        assert_eq!(cell.best_class(1), 2);
        assert_eq!(cell.best_class(0), 0);

        assert!(!layout.cell(&data, 0, 0, 0).has_object());
    }

    #[test]
    #[should_panic = "past the buffer length"]
    fn cell_view_out_of_bounds_panics() {
        let layout = small_layout();
        let data = vec![0.0f32; layout.depth()];
        let _cell = layout.cell(&data, 0, 1, 1);
    }
}
