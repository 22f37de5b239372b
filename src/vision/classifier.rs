use std::path::Path;

use anyhow::Result;
use tract_onnx::prelude::*;

use super::preprocess::ImageBatch;
use crate::llm::{InitError, Provisioned};

/// Anything that can score a preprocessed image against a fixed list of
/// class labels. The returned scores are in class order.
pub trait Classifier: Send + Sync {
    fn classes(&self) -> &[String];
    fn input_size(&self) -> u32;
    fn predict(&self, batch: &ImageBatch) -> Result<Vec<f32>>;
}

/// Batch of one NHWC image as the model's only input.
pub fn input_fact(input_size: u32) -> InferenceFact {
    let size = input_size as usize;
    f32::fact([1, size, size, 3]).into()
}

pub struct OnnxClassifier {
    model: TypedRunnableModel<TypedModel>,
    classes: Vec<String>,
    input_size: u32,
}

impl OnnxClassifier {
    pub fn load(path: &Path, classes: Vec<String>, input_size: u32) -> Provisioned<Self> {
        let model_error = |e: anyhow::Error| InitError::Model {
            path: path.display().to_string(),
            reason: e.to_string(),
        };
        if !path.exists() {
            return Err(model_error(anyhow::anyhow!("file not found")));
        }
        let model = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|m| m.with_input_fact(0, input_fact(input_size)))
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(model_error)?;

        tracing::info!(
            "Loaded classifier {} ({} classes, {}x{} input)",
            path.display(),
            classes.len(),
            input_size,
            input_size
        );
        Ok(Self {
            model,
            classes,
            input_size,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn input_size(&self) -> u32 {
        self.input_size
    }

    fn predict(&self, batch: &ImageBatch) -> Result<Vec<f32>> {
        let input = Tensor::from_shape(&batch.shape(), &batch.data)?;
        let outputs = self.model.run(tvec!(input.into()))?;
        let scores = outputs
            .first()
            .ok_or_else(|| anyhow::anyhow!("Model produced no outputs"))?
            .to_array_view::<f32>()?
            .iter()
            .copied()
            .collect();
        Ok(scores)
    }
}
