//! Router for the image classification pages and API

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartRejection},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use http::StatusCode;

use super::Pages;
use super::public::PredictResponse;
use crate::api::public::{ApiError, ErrorResponse};
use crate::api::state::SharedState;
use crate::vision::{Classification, ClassifyError, Vision};

// Room for multipart boundaries and headers on top of the file itself
const MULTIPART_OVERHEAD: usize = 16 * 1024;

struct Upload {
    filename: String,
    bytes: Bytes,
}

fn handles(state: &SharedState) -> (Arc<Vision>, Arc<Pages>) {
    let shared_state = state.read().expect("Unable to read share state");
    (shared_state.vision.clone(), shared_state.pages.clone())
}

/// Pull the `file` field out of the form. A form without a file, or
/// with an empty filename, counts as no upload.
async fn read_upload(
    vision: &Vision,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Upload, ClassifyError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::info!("Rejected upload without a multipart body: {}", e);
        ClassifyError::MissingFile
    })?;

    let multipart_error = |e: axum::extract::multipart::MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ClassifyError::too_large(vision.max_upload_bytes())
        } else {
            tracing::info!("Malformed multipart upload: {}", e);
            ClassifyError::MissingFile
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        // Read the body before looking at the name so an oversized
        // upload is reported as such whatever it is called
        let bytes = field.bytes().await.map_err(multipart_error)?;
        if filename.is_empty() {
            return Err(ClassifyError::MissingFile);
        }
        return Ok(Upload { filename, bytes });
    }
    Err(ClassifyError::MissingFile)
}

/// Run a classification off the async runtime, inference is CPU bound.
async fn classify(
    vision: Arc<Vision>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Classification, ClassifyError> {
    vision.ensure_loaded()?;
    let upload = read_upload(&vision, multipart).await?;
    tokio::task::spawn_blocking(move || vision.classify(&upload.filename, &upload.bytes))
        .await
        .map_err(|e| ClassifyError::Inference(e.into()))?
}

fn max_mb(vision: &Vision) -> usize {
    (vision.max_upload_bytes() / (1024 * 1024)).max(1)
}

/// Render the upload form
async fn index(State(state): State<SharedState>) -> Result<Html<String>, ApiError> {
    let (vision, pages) = handles(&state);
    Ok(Html(pages.index(vision.classes(), max_mb(&vision), None)?))
}

/// Classify an uploaded image and render the result page
async fn predict_page(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let (vision, pages) = handles(&state);

    match classify(Arc::clone(&vision), multipart).await {
        Ok(classification) => Ok(Html(pages.result(&classification)?).into_response()),
        Err(ClassifyError::MissingFile) => Ok(Redirect::to("/").into_response()),
        Err(e) => {
            tracing::warn!("Classification failed: {:?}", e);
            let html = pages.index(vision.classes(), max_mb(&vision), Some(&e.to_string()))?;
            Ok((e.status(), Html(html)).into_response())
        }
    }
}

/// Classify an uploaded image and respond with JSON
async fn predict_api(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let (vision, _) = handles(&state);

    match classify(vision, multipart).await {
        Ok(classification) => Json(PredictResponse::from(classification)).into_response(),
        Err(e) => {
            tracing::warn!("Classification failed: {:?}", e);
            (e.status(), Json(ErrorResponse::new(e.to_string()))).into_response()
        }
    }
}

/// Create the classification router. Bodies are capped slightly above
/// `max_upload_bytes` and the file itself is checked exactly later.
pub fn router(max_upload_bytes: usize) -> Router<SharedState> {
    Router::new()
        .route("/", get(index))
        .route("/predict", post(predict_page))
        .route("/api/predict", post(predict_api))
        .layer(DefaultBodyLimit::max(
            max_upload_bytes.saturating_add(MULTIPART_OVERHEAD),
        ))
}
