//! Public types for the image classification API
use std::collections::BTreeMap;

use serde::Serialize;

use crate::vision::Classification;

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub label: String,
    pub confidence: f64,
    /// Percentage per class label
    pub probabilities: BTreeMap<String, f64>,
    /// Base64 encoded PNG of the image as the model saw it
    pub image: String,
}

impl From<Classification> for PredictResponse {
    fn from(c: Classification) -> Self {
        Self {
            label: c.prediction.label,
            confidence: c.prediction.confidence,
            probabilities: c
                .prediction
                .probabilities
                .into_iter()
                .map(|s| (s.label, s.percent))
                .collect(),
            image: c.image,
        }
    }
}
