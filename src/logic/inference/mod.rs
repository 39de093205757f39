//! Inference Engine
//!
//! Decides how a submitted image gets a disease label. Three strategies,
//! evaluated once per call:
//!
//! 1. Local ONNX model when `model_endpoint` is configured (session cached
//!    after the first successful load).
//! 2. Remote inference API when no local model is loaded but
//!    `remote_infer_endpoint` is configured.
//! 3. Demo fallback: a uniform random pick from the knowledge base after a
//!    fixed artificial delay.
//!
//! `analyze` never returns an error. Every expected failure (model load,
//! network, malformed response) is logged and degrades to the next strategy,
//! so the caller always reaches a resolved result.

pub mod labels;
pub mod model;
pub mod remote;

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::logic::config::ConfigStore;
use crate::logic::knowledge::{self, DiseaseRecord};

/// The outcome of one completed analysis, as persisted in history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub disease: String,
    /// Integer percentage. Real model/remote value, or the record's baseline
    /// confidence on the demo path.
    pub confidence: u32,
    pub data: DiseaseRecord,
}

/// Which strategy produced a result. Lets callers and tests tell a genuine
/// classification apart from the demo fallback; not part of the persisted
/// prediction shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InferenceMethod {
    LocalModel,
    RemoteApi,
    Demo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub result: PredictionResult,
    pub method: InferenceMethod,
}

/// Runtime-selectable inference settings. Read from the config store once per
/// `analyze` call; never cached across calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InferenceConfig {
    pub model_endpoint: Option<String>,
    pub remote_infer_endpoint: Option<String>,
}

impl InferenceConfig {
    pub fn from_store(store: &ConfigStore) -> Self {
        Self {
            model_endpoint: store.get(constants::KEY_MODEL_ENDPOINT),
            remote_infer_endpoint: store.get(constants::KEY_REMOTE_INFER_ENDPOINT),
        }
    }

    /// Neither endpoint configured: demo fallback only
    pub fn is_empty(&self) -> bool {
        self.model_endpoint.is_none() && self.remote_infer_endpoint.is_none()
    }
}

pub struct InferenceEngine {
    model: model::ModelSlot,
    http: reqwest::Client,
}

impl Default for InferenceEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceEngine {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(constants::DEFAULT_HTTP_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            model: model::ModelSlot::new(),
            http,
        }
    }

    pub fn is_model_loaded(&self) -> bool {
        self.model.is_loaded()
    }

    /// Candidate labels for the classification step: the labels manifest next
    /// to the model file when one can be fetched, else the knowledge-base key
    /// set. Best-effort; never fails the analysis.
    pub async fn resolve_labels(&self, config: &InferenceConfig) -> Vec<String> {
        if let Some(endpoint) = &config.model_endpoint {
            if let Some(manifest) = labels::fetch(&self.http, endpoint).await {
                return manifest;
            }
        }
        knowledge::disease_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Analyze one image. Strategy selection happens once per call; all
    /// failure paths degrade to the demo fallback.
    pub async fn analyze(
        &self,
        image_data_url: &str,
        config: &InferenceConfig,
        candidate_labels: &[String],
    ) -> AnalysisOutcome {
        if let Some(endpoint) = &config.model_endpoint {
            if self.model.ensure_loaded(&self.http, endpoint).await {
                match self.model.predict(image_data_url, candidate_labels) {
                    Ok((label, confidence)) => {
                        return AnalysisOutcome {
                            result: map_prediction(label, confidence),
                            method: InferenceMethod::LocalModel,
                        };
                    }
                    Err(e) => log::warn!("Local inference failed ({}), falling back", e),
                }
            }
        }

        if !self.model.is_loaded() {
            if let Some(endpoint) = &config.remote_infer_endpoint {
                if let Some(pred) = remote::infer(&self.http, endpoint, image_data_url).await {
                    return AnalysisOutcome {
                        result: map_prediction(pred.label, pred.confidence.round() as u32),
                        method: InferenceMethod::RemoteApi,
                    };
                }
            }
        }

        self.demo_fallback().await
    }

    /// Random pick from the knowledge base, after the fixed artificial delay.
    /// No accuracy meaning; used whenever no real path produced a result.
    async fn demo_fallback(&self) -> AnalysisOutcome {
        tokio::time::sleep(Duration::from_millis(constants::DEMO_ANALYSIS_DELAY_MS)).await;

        let names = knowledge::disease_names();
        let idx = rand::thread_rng().gen_range(0..names.len());
        let disease = names[idx];
        let data = knowledge::lookup(disease)
            .cloned()
            .unwrap_or_else(|| knowledge::unknown_record(0));

        AnalysisOutcome {
            result: PredictionResult {
                disease: disease.to_string(),
                confidence: data.confidence,
                data,
            },
            method: InferenceMethod::Demo,
        }
    }
}

/// Embed knowledge-base metadata when the label matches, else the synthetic
/// Unknown record carrying the model's confidence. The UI must never fail to
/// render just because metadata is missing.
fn map_prediction(label: String, confidence: u32) -> PredictionResult {
    let data = knowledge::lookup(&label)
        .cloned()
        .unwrap_or_else(|| knowledge::unknown_record(confidence));
    PredictionResult {
        disease: label,
        confidence,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::knowledge::Severity;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn no_config_resolves_to_demo_after_delay() {
        let engine = InferenceEngine::new();
        let config = InferenceConfig::default();
        let labels = engine.resolve_labels(&config).await;

        let started = Instant::now();
        let outcome = engine.analyze("data:image/png;base64,AAAA", &config, &labels).await;

        assert!(started.elapsed() >= Duration::from_millis(constants::DEMO_ANALYSIS_DELAY_MS));
        assert_eq!(outcome.method, InferenceMethod::Demo);
        assert!(knowledge::lookup(&outcome.result.disease).is_some());
        assert_eq!(outcome.result.confidence, outcome.result.data.confidence);
    }

    /// Minimal one-shot HTTP stub: accepts a single connection, drains the
    /// request and answers with the given JSON body.
    async fn spawn_remote_stub(body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
                if http_request_complete(&request) {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
        });

        format!("http://{}/predict", addr)
    }

    fn http_request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())?
            })
            .unwrap_or(0);
        request.len() >= header_end + 4 + content_length
    }

    #[tokio::test]
    async fn successful_remote_response_is_returned_verbatim() {
        let endpoint =
            spawn_remote_stub(r#"{"prediction":{"label":"Leaf Rust","confidence":92}}"#).await;

        let engine = InferenceEngine::new();
        let config = InferenceConfig {
            model_endpoint: None,
            remote_infer_endpoint: Some(endpoint),
        };
        let labels = engine.resolve_labels(&config).await;

        let outcome = engine.analyze("data:image/png;base64,AAAA", &config, &labels).await;
        assert_eq!(outcome.method, InferenceMethod::RemoteApi);
        assert_eq!(outcome.result.disease, "Leaf Rust");
        assert_eq!(outcome.result.confidence, 92);
        // Matching label embeds the knowledge-base record
        assert_eq!(outcome.result.data.crop, "Wheat");
    }

    #[tokio::test]
    async fn remote_label_without_metadata_gets_unknown_record() {
        let endpoint = spawn_remote_stub(
            r#"{"prediction":{"label":"Tomato__Target_Spot","confidence":58}}"#,
        )
        .await;

        let engine = InferenceEngine::new();
        let config = InferenceConfig {
            model_endpoint: None,
            remote_infer_endpoint: Some(endpoint),
        };
        let labels = engine.resolve_labels(&config).await;

        let outcome = engine.analyze("data:image/png;base64,AAAA", &config, &labels).await;
        assert_eq!(outcome.method, InferenceMethod::RemoteApi);
        assert_eq!(outcome.result.disease, "Tomato__Target_Spot");
        assert_eq!(outcome.result.confidence, 58);
        assert_eq!(outcome.result.data.crop, "Unknown");
        assert_eq!(outcome.result.data.confidence, 58);
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_remote_falls_back_to_demo() {
        let engine = InferenceEngine::new();
        let config = InferenceConfig {
            model_endpoint: None,
            // Discard port: connection is refused immediately
            remote_infer_endpoint: Some("http://127.0.0.1:9/predict".to_string()),
        };
        let labels = engine.resolve_labels(&config).await;

        let outcome = engine.analyze("data:image/png;base64,AAAA", &config, &labels).await;
        assert_eq!(outcome.method, InferenceMethod::Demo);
        assert!(knowledge::lookup(&outcome.result.disease).is_some());
    }

    #[test]
    fn map_prediction_known_label_uses_knowledge_base() {
        let result = map_prediction("Late Blight".to_string(), 80);
        assert_eq!(result.disease, "Late Blight");
        assert_eq!(result.confidence, 80);
        assert_eq!(result.data.crop, "Tomato");
    }

    #[test]
    fn map_prediction_unknown_label_synthesizes_record() {
        let result = map_prediction("Tomato__Target_Spot".to_string(), 64);
        assert_eq!(result.disease, "Tomato__Target_Spot");
        assert_eq!(result.confidence, 64);
        assert_eq!(result.data.crop, "Unknown");
        assert_eq!(result.data.severity, Severity::Medium);
        assert_eq!(result.data.confidence, 64);
    }

    #[test]
    fn empty_config_detection() {
        assert!(InferenceConfig::default().is_empty());
        let with_model = InferenceConfig {
            model_endpoint: Some("m.onnx".to_string()),
            remote_infer_endpoint: None,
        };
        assert!(!with_model.is_empty());
    }

    #[tokio::test]
    async fn label_fallback_is_knowledge_base_key_set() {
        let engine = InferenceEngine::new();
        let labels = engine.resolve_labels(&InferenceConfig::default()).await;
        let expected: Vec<String> = knowledge::disease_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        assert_eq!(labels, expected);
    }
}
