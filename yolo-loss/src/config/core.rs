//! Core configuration structures for the detection grid.

use burn::prelude::*;

use crate::{
    error::{YoloLossError, YoloLossResult},
    layout::DetectionLayout,
};

/// Grid layout shared by the network head, the target encoder and the loss.
///
/// The depth of a prediction or target tensor is
/// `boxes_per_cell * (5 + num_classes)`; each box slot holds
/// `cx, cy, w, h, confidence` followed by `num_classes` class scores.
#[derive(Config, Debug, PartialEq, Eq)]
pub struct GridConfig {
    /// Side of the square grid (`S`).
    #[config(default = 7)]
    pub grid_size: usize,
    /// Candidate boxes predicted per cell (`B`).
    #[config(default = 2)]
    pub boxes_per_cell: usize,
    /// Number of object classes (`C`).
    #[config(default = 20)]
    pub num_classes: usize,
}

impl GridConfig {
    /// Number of fields stored per box slot.
    pub const fn box_stride(&self) -> usize {
        5 + self.num_classes
    }

    /// Flat depth of one grid cell.
    pub const fn depth(&self) -> usize {
        self.boxes_per_cell * self.box_stride()
    }

    /// Validates the grid dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`YoloLossError::InvalidConfiguration`] if any dimension is zero.
    pub fn validate(&self) -> YoloLossResult<()> {
        let dimensions = [
            ("grid_size", self.grid_size),
            ("boxes_per_cell", self.boxes_per_cell),
            ("num_classes", self.num_classes),
        ];

        for (name, value) in dimensions {
            if value == 0 {
                return Err(YoloLossError::InvalidConfiguration {
                    reason: format!("{name} must be positive, got {value}"),
                });
            }
        }

        Ok(())
    }

    /// Builds the fixed-stride layout described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`YoloLossError::InvalidConfiguration`] if the grid is invalid.
    pub fn layout(&self) -> YoloLossResult<DetectionLayout> {
        self.validate()?;
        Ok(DetectionLayout::new(
            self.grid_size,
            self.boxes_per_cell,
            self.num_classes,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_grid_matches_pascal_voc_layout() {
        let config = GridConfig::new();

        assert_eq!(config.grid_size, 7);
        assert_eq!(config.boxes_per_cell, 2);
        assert_eq!(config.num_classes, 20);
        assert_eq!(config.box_stride(), 25);
        assert_eq!(config.depth(), 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_dimension_is_rejected() {
        let cases = [
            (GridConfig::new().with_grid_size(0), "grid_size"),
            (GridConfig::new().with_boxes_per_cell(0), "boxes_per_cell"),
            (GridConfig::new().with_num_classes(0), "num_classes"),
        ];

        for (config, field) in cases {
            match config.validate() {
                Err(YoloLossError::InvalidConfiguration { reason }) => {
                    assert!(reason.contains(field), "{reason}");
                }
                other => panic!("Expected InvalidConfiguration for {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_layout_requires_valid_grid() {
        assert!(GridConfig::new().with_num_classes(0).layout().is_err());

        let layout = GridConfig::new()
            .with_grid_size(1)
            .with_boxes_per_cell(1)
            .with_num_classes(1)
            .layout()
            .unwrap();
        assert_eq!(layout.depth(), 6);
    }
}
