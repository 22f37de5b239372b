//! Test utilities for integration tests
#![allow(dead_code)]

use std::io::Cursor;
use std::sync::{Arc, RwLock};

use anyhow::{Result, bail};
use async_trait::async_trait;
use axum::{Router, body::Body};
use http::{Request, header};
use image::{ImageBuffer, ImageFormat, Rgb, RgbImage};

use modelrelay::api::{AppState, app};
use modelrelay::chat::Relay;
use modelrelay::core::AppConfig;
use modelrelay::llm::{
    GenerationRequest, InitError, Provisioned, SharedGenerator, TextGenerator,
};
use modelrelay::vision::{Classifier, ImageBatch, Vision};

pub const BOUNDARY: &str = "modelrelay-test-boundary";

/// Replies with canned text, or fails every call.
pub struct StubGenerator {
    pub reply: String,
    pub fail: bool,
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
        if self.fail {
            bail!("quota exceeded");
        }
        Ok(self.reply.clone())
    }

    fn model(&self) -> &str {
        "stub-model"
    }
}

/// Returns the same scores for every image.
pub struct StubClassifier {
    pub classes: Vec<String>,
    pub scores: Vec<f32>,
}

impl Classifier for StubClassifier {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn input_size(&self) -> u32 {
        32
    }

    fn predict(&self, batch: &ImageBatch) -> Result<Vec<f32>> {
        assert_eq!(batch.shape(), [1, 32, 32, 3]);
        Ok(self.scores.clone())
    }
}

/// Configuration that doesn't depend on the environment the tests
/// run in.
pub fn test_config() -> AppConfig {
    AppConfig {
        gemini_api_key: Some(String::from("test-api-key")),
        gemini_model: String::from("gemini-2.5-flash"),
        system_instruction: String::from("You help {{user_name}}."),
        history_limit: 20,
        context_window: 10,
        max_users: 100,
        relay_api_key: None,
        request_timeout_secs: 5,
        classifier_classes: vec!["apple".into(), "banana".into(), "orange".into()],
        classifier_input_size: 32,
        max_upload_bytes: 2 * 1024 * 1024,
        ..AppConfig::default()
    }
}

pub fn stub_generator(reply: &str) -> Provisioned<SharedGenerator> {
    Ok(Arc::new(StubGenerator {
        reply: reply.to_string(),
        fail: false,
    }))
}

pub fn failing_generator() -> Provisioned<SharedGenerator> {
    Ok(Arc::new(StubGenerator {
        reply: String::new(),
        fail: true,
    }))
}

pub fn missing_generator() -> Provisioned<SharedGenerator> {
    Err(InitError::MissingCredential("GEMINI_API_KEY"))
}

pub fn stub_classifier(scores: Vec<f32>) -> Provisioned<Arc<dyn Classifier>> {
    Ok(Arc::new(StubClassifier {
        classes: vec!["apple".into(), "banana".into(), "orange".into()],
        scores,
    }))
}

pub fn missing_classifier() -> Provisioned<Arc<dyn Classifier>> {
    Err(InitError::Model {
        path: String::from("fruits_cnn.onnx"),
        reason: String::from("file not found"),
    })
}

/// Everything needed to build an application router with stubbed
/// external dependencies.
pub struct TestApp {
    pub config: AppConfig,
    pub generator: Provisioned<SharedGenerator>,
    pub classifier: Provisioned<Arc<dyn Classifier>>,
}

impl Default for TestApp {
    fn default() -> Self {
        Self {
            config: test_config(),
            generator: stub_generator("hi Ann"),
            classifier: stub_classifier(vec![0.1, 0.7, 0.2]),
        }
    }
}

impl TestApp {
    pub fn router(self) -> Router {
        let relay = Relay::new(&self.config, self.generator).expect("Failed to build relay");
        let vision = Vision::new(self.classifier, self.config.max_upload_bytes);
        let app_state =
            AppState::new(self.config, relay, vision).expect("Failed to build app state");
        app(Arc::new(RwLock::new(app_state)))
    }
}

/// Creates a test application router with stubbed model clients.
pub fn test_app() -> Router {
    TestApp::default().router()
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not utf-8")
}

pub async fn body_to_json(body: Body) -> serde_json::Value {
    serde_json::from_str(&body_to_string(body).await).expect("Body is not JSON")
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// A multipart form with a single file field.
pub fn multipart_request(uri: &str, field: &str, filename: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img: RgbImage = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .expect("Failed to encode png");
    buf.into_inner()
}
