//! Image classification: upload validation, preprocessing, inference
//! and shaping the scores into a labelled result.

pub mod classifier;
pub mod prediction;
pub mod preprocess;

use std::path::Path;
use std::sync::Arc;

use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

pub use classifier::{Classifier, OnnxClassifier};
pub use prediction::{ClassScore, Prediction};
pub use preprocess::ImageBatch;

use crate::core::AppConfig;
use crate::llm::{InitError, Provisioned};

/// Every way a classification request can fail. The display text is
/// what gets shown to the person uploading.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Model failed to load. Check server logs.")]
    ModelUnavailable(InitError),
    #[error("No file uploaded.")]
    MissingFile,
    #[error("File too large. Max size is {max_mb} MB.")]
    TooLarge { max_mb: usize },
    #[error("File type not allowed. Use png/jpg/jpeg.")]
    ExtensionNotAllowed,
    #[error("Uploaded file is not a valid image.")]
    InvalidImage,
    #[error("Error processing image.")]
    Preprocess(#[source] anyhow::Error),
    #[error("Model prediction failed.")]
    Inference(#[source] anyhow::Error),
}

impl ClassifyError {
    pub fn too_large(max_bytes: usize) -> Self {
        Self::TooLarge {
            max_mb: (max_bytes / (1024 * 1024)).max(1),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ClassifyError::ModelUnavailable(_)
            | ClassifyError::Preprocess(_)
            | ClassifyError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ClassifyError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ClassifyError::MissingFile
            | ClassifyError::ExtensionNotAllowed
            | ClassifyError::InvalidImage => StatusCode::BAD_REQUEST,
        }
    }
}

/// A successful classification along with the resized image that was
/// actually fed to the model.
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    pub filename: String,
    #[serde(flatten)]
    pub prediction: Prediction,
    /// Base64 encoded PNG
    pub image: String,
}

pub struct Vision {
    classifier: Provisioned<Arc<dyn Classifier>>,
    max_upload_bytes: usize,
}

impl Vision {
    pub fn new(classifier: Provisioned<Arc<dyn Classifier>>, max_upload_bytes: usize) -> Self {
        if let Err(e) = &classifier {
            tracing::error!("Classifier unavailable: {}", e);
        }
        Self {
            classifier,
            max_upload_bytes,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let classifier = OnnxClassifier::load(
            Path::new(&config.classifier_model_path),
            config.classifier_classes.clone(),
            config.classifier_input_size,
        )
        .map(|c| Arc::new(c) as Arc<dyn Classifier>);
        Self::new(classifier, config.max_upload_bytes)
    }

    pub fn is_loaded(&self) -> bool {
        self.classifier.is_ok()
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Known class labels, empty when no model is loaded.
    pub fn classes(&self) -> &[String] {
        match &self.classifier {
            Ok(c) => c.classes(),
            Err(_) => &[],
        }
    }

    /// Fail fast when the model never loaded so callers can skip
    /// reading the upload.
    pub fn ensure_loaded(&self) -> Result<(), ClassifyError> {
        match &self.classifier {
            Ok(_) => Ok(()),
            Err(e) => Err(ClassifyError::ModelUnavailable(e.clone())),
        }
    }

    /// Validate and classify one upload. Checks run cheapest first:
    /// size, then extension, then decoding.
    pub fn classify(&self, filename: &str, bytes: &[u8]) -> Result<Classification, ClassifyError> {
        let classifier = self
            .classifier
            .as_ref()
            .map_err(|e| ClassifyError::ModelUnavailable(e.clone()))?;

        if bytes.len() > self.max_upload_bytes {
            return Err(ClassifyError::too_large(self.max_upload_bytes));
        }
        if !preprocess::allowed_file(filename) {
            return Err(ClassifyError::ExtensionNotAllowed);
        }

        let img = preprocess::decode(bytes)?;
        let resized = preprocess::resize(&img, classifier.input_size());
        let batch = preprocess::to_batch(&resized);

        let scores = classifier.predict(&batch).map_err(|e| {
            tracing::error!("Inference failed for {}: {}", filename, e);
            ClassifyError::Inference(e)
        })?;
        let prediction = Prediction::from_scores(classifier.classes(), &scores).map_err(|e| {
            tracing::error!("Unusable model output for {}: {}", filename, e);
            ClassifyError::Inference(e)
        })?;
        let image = preprocess::to_base64_png(&resized).map_err(ClassifyError::Preprocess)?;

        tracing::info!(
            "Classified {} as {} ({:.2}%)",
            filename,
            prediction.label,
            prediction.confidence
        );
        Ok(Classification {
            filename: filename.to_string(),
            prediction,
            image,
        })
    }
}
