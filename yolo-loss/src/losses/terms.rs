//! Per-term breakdown of the detection loss.

use std::collections::HashMap;

use burn::{
    nn::loss::Reduction,
    prelude::*,
    tensor::cast::ToElement,
};

/// The five weighted loss terms, each reduced to one value per batch element.
///
/// Weights are already applied: `coordinate` and `dimension` carry `lambda_coord`,
/// `no_object_confidence` carries `lambda_noobj`.
#[derive(Debug, Clone)]
pub struct LossTerms<B: Backend> {
    /// Center offset error of every predictor in an object cell, `[N]`.
    pub coordinate: Tensor<B, 1>,
    /// Square-root width/height error of every predictor in an object cell, `[N]`.
    pub dimension: Tensor<B, 1>,
    /// Confidence error of responsible predictors, `[N]`.
    pub object_confidence: Tensor<B, 1>,
    /// Confidence error of every other predictor, `[N]`.
    pub no_object_confidence: Tensor<B, 1>,
    /// Class score error of predictors in object cells, `[N]`.
    pub classification: Tensor<B, 1>,
}

impl<B: Backend> LossTerms<B> {
    /// Both confidence terms, `[N]`.
    pub fn confidence(&self) -> Tensor<B, 1> {
        self.object_confidence.clone() + self.no_object_confidence.clone()
    }

    /// Sum of all terms, `[N]`.
    pub fn total(&self) -> Tensor<B, 1> {
        self.coordinate.clone()
            + self.dimension.clone()
            + self.confidence()
            + self.classification.clone()
    }

    /// Reduces the total over the batch.
    ///
    /// `Sum` and `Auto` add the per-element losses, matching the unnormalized
    /// sum-squared error; `Mean` divides by the batch size.
    pub fn reduce(&self, reduction: Reduction) -> Tensor<B, 1> {
        let total = self.total();
        match reduction {
            Reduction::Mean => total.mean(),
            Reduction::Sum | Reduction::Auto => total.sum(),
        }
    }

    /// Batch-summed value of every term, keyed by name, for logging.
    pub fn summary(&self) -> HashMap<String, f64> {
        let scalar = |term: &Tensor<B, 1>| term.clone().sum().into_scalar().to_f64();

        let mut summary = HashMap::new();
        summary.insert("coordinate".to_string(), scalar(&self.coordinate));
        summary.insert("dimension".to_string(), scalar(&self.dimension));
        summary.insert(
            "object_confidence".to_string(),
            scalar(&self.object_confidence),
        );
        summary.insert(
            "no_object_confidence".to_string(),
            scalar(&self.no_object_confidence),
        );
        summary.insert("classification".to_string(), scalar(&self.classification));
        summary.insert("total".to_string(), scalar(&self.total()));
        summary
    }
}
