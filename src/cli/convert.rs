use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use tract_onnx::WithOnnx;
use tract_onnx::prelude::*;

use crate::core::init_tracing;
use crate::vision::classifier::input_fact;

/// Convert an ONNX classifier into an NNEF tar archive with the input
/// pinned to a single `input_size` square RGB image.
pub fn run(input: &Path, output: &Path, input_size: u32) -> Result<()> {
    init_tracing(&format!("{}=info", env!("CARGO_CRATE_NAME")));

    tracing::info!("Loading {}", input.display());
    let model = tract_onnx::onnx()
        .model_for_path(input)
        .with_context(|| format!("Failed to load ONNX model {}", input.display()))?
        .with_input_fact(0, input_fact(input_size))?
        .into_optimized()?;
    tracing::info!("Optimized model has {} nodes", model.nodes().len());

    let file = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    tract_nnef::nnef()
        .with_tract_core()
        .with_onnx()
        .write_to_tar(&model, file)?;

    tracing::info!("Model converted and saved to {}", output.display());
    Ok(())
}
