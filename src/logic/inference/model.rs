//! Local ONNX model path
//!
//! Session loading (file or HTTP, cached once per process) and the image
//! pipeline: base64 data URL -> 224x224 RGB tensor in [0,1] -> forward pass
//! -> softmax -> argmax over the candidate labels.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;

use crate::constants;

#[derive(Debug)]
pub struct InferenceError(pub String);

impl std::fmt::Display for InferenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InferenceError: {}", self.0)
    }
}

impl std::error::Error for InferenceError {}

/// Owned model slot. The session is loaded lazily and cached for the process
/// lifetime; concurrent loads are serialized so only one session is ever
/// created. A failed load leaves the slot empty and is retried on the next
/// call.
pub struct ModelSlot {
    session: parking_lot::Mutex<Option<Session>>,
    load_lock: tokio::sync::Mutex<()>,
}

impl Default for ModelSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelSlot {
    pub fn new() -> Self {
        Self {
            session: parking_lot::Mutex::new(None),
            load_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Load the model if it is not already cached. Returns whether a session
    /// is available afterwards; load failures are logged, never propagated.
    pub async fn ensure_loaded(&self, http: &reqwest::Client, endpoint: &str) -> bool {
        if self.is_loaded() {
            return true;
        }

        let _guard = self.load_lock.lock().await;
        if self.is_loaded() {
            // A concurrent caller won the race
            return true;
        }

        match load_session(http, endpoint).await {
            Ok(session) => {
                log::info!("ONNX model loaded from {}", endpoint);
                *self.session.lock() = Some(session);
                true
            }
            Err(e) => {
                log::warn!("Model load failed: {}", e);
                false
            }
        }
    }

    /// Forward pass on one image. Returns the selected label and integer
    /// percentage confidence.
    pub fn predict(
        &self,
        image_data_url: &str,
        candidate_labels: &[String],
    ) -> Result<(String, u32), InferenceError> {
        let input = preprocess(image_data_url)?;

        let mut guard = self.session.lock();
        let session = guard
            .as_mut()
            .ok_or_else(|| InferenceError("Model not loaded".to_string()))?;

        let output_name = session
            .outputs()
            .first()
            .map(|o| o.name().to_string())
            .ok_or_else(|| InferenceError("No output defined".to_string()))?;

        let input_tensor =
            Value::from_array(input).map_err(|e| InferenceError(format!("Tensor error: {}", e)))?;

        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(|e| InferenceError(format!("Inference failed: {}", e)))?;

        let output = outputs
            .get(&output_name)
            .ok_or_else(|| InferenceError("No output".to_string()))?;

        let output_tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError(format!("Extract error: {}", e)))?;

        let probs = softmax(output_tensor.1);
        select_prediction(&probs, candidate_labels)
            .ok_or_else(|| InferenceError("Empty model output".to_string()))
    }
}

fn session_builder() -> Result<ort::session::builder::SessionBuilder, InferenceError> {
    Session::builder()
        .map_err(|e| InferenceError(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| InferenceError(format!("Failed to set optimization: {}", e)))
}

async fn load_session(http: &reqwest::Client, endpoint: &str) -> Result<Session, InferenceError> {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        log::info!("Fetching ONNX model from {}", endpoint);
        let response = http
            .get(endpoint)
            .send()
            .await
            .map_err(|e| InferenceError(format!("Model fetch failed: {}", e)))?
            .error_for_status()
            .map_err(|e| InferenceError(format!("Model fetch failed: {}", e)))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| InferenceError(format!("Model fetch failed: {}", e)))?;
        session_builder()?
            .commit_from_memory(&bytes)
            .map_err(|e| InferenceError(format!("Failed to load model: {}", e)))
    } else {
        if !std::path::Path::new(endpoint).exists() {
            return Err(InferenceError(format!("Model not found: {}", endpoint)));
        }
        session_builder()?
            .commit_from_file(endpoint)
            .map_err(|e| InferenceError(format!("Failed to load model: {}", e)))
    }
}

// ============================================================================
// IMAGE PIPELINE
// ============================================================================

/// Extract the base64 payload of a data URL. A bare base64 string without the
/// `data:...;base64,` header is accepted as-is.
fn data_url_payload(image_data_url: &str) -> &str {
    match image_data_url.split_once(',') {
        Some((_, payload)) => payload,
        None => image_data_url,
    }
}

fn decode_image(image_data_url: &str) -> Result<DynamicImage, InferenceError> {
    let bytes = BASE64
        .decode(data_url_payload(image_data_url).trim())
        .map_err(|e| InferenceError(format!("Invalid base64 image: {}", e)))?;
    image::load_from_memory(&bytes)
        .map_err(|e| InferenceError(format!("Undecodable image: {}", e)))
}

/// Decode and normalize to a (1, 224, 224, 3) NHWC tensor in [0,1]
pub fn preprocess(image_data_url: &str) -> Result<Array4<f32>, InferenceError> {
    let size = constants::MODEL_INPUT_SIZE;
    let rgb = decode_image(image_data_url)?
        .resize_exact(size, size, FilterType::Triangle)
        .to_rgb8();

    let mut data = Vec::with_capacity((size * size * 3) as usize);
    for pixel in rgb.pixels() {
        data.push(pixel.0[0] as f32 / 255.0);
        data.push(pixel.0[1] as f32 / 255.0);
        data.push(pixel.0[2] as f32 / 255.0);
    }

    Array4::from_shape_vec((1, size as usize, size as usize, 3), data)
        .map_err(|e| InferenceError(format!("Array error: {}", e)))
}

/// Re-encode an image data URL as a compressed JPEG data URL for the remote
/// inference API. `None` if the input cannot be decoded.
pub fn jpeg_data_url(image_data_url: &str) -> Option<String> {
    let size = constants::MODEL_INPUT_SIZE;
    let rgb = decode_image(image_data_url)
        .ok()?
        .resize_exact(size, size, FilterType::Triangle)
        .to_rgb8();

    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buf), constants::JPEG_QUALITY);
    rgb.write_with_encoder(encoder).ok()?;

    Some(format!("data:image/jpeg;base64,{}", BASE64.encode(&buf)))
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

/// Numerically stable softmax
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    if logits.is_empty() {
        return Vec::new();
    }
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|v| v / sum).collect()
}

/// Index of the largest probability; ties break to the first occurrence
pub fn argmax(probs: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &p) in probs.iter().enumerate() {
        match best {
            Some((_, bp)) if p <= bp => {}
            _ => best = Some((i, p)),
        }
    }
    best
}

/// Map a probability distribution onto the candidate labels. Out-of-bounds
/// indices get a synthetic `class_<index>` label; confidence is the rounded
/// integer percentage of the winning probability.
pub fn select_prediction(probs: &[f32], candidate_labels: &[String]) -> Option<(String, u32)> {
    let (idx, p) = argmax(probs)?;
    let label = candidate_labels
        .get(idx)
        .cloned()
        .unwrap_or_else(|| format!("class_{}", idx));
    Some((label, (p * 100.0).round() as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn png_data_url(width: u32, height: u32) -> String {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 80])
        });
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        format!("data:image/png;base64,{}", BASE64.encode(&buf))
    }

    #[test]
    fn data_url_payload_strips_header() {
        assert_eq!(data_url_payload("data:image/png;base64,QUJD"), "QUJD");
        assert_eq!(data_url_payload("QUJD"), "QUJD");
    }

    #[test]
    fn preprocess_produces_normalized_nhwc_tensor() {
        let tensor = preprocess(&png_data_url(32, 48)).unwrap();
        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
        assert!(tensor.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn preprocess_rejects_garbage() {
        assert!(preprocess("data:image/png;base64,!!!not-base64!!!").is_err());
        assert!(preprocess("data:image/png;base64,QUJD").is_err());
    }

    #[test]
    fn jpeg_reencode_yields_jpeg_data_url() {
        let out = jpeg_data_url(&png_data_url(16, 16)).unwrap();
        assert!(out.starts_with("data:image/jpeg;base64,"));
        // The payload decodes back into a real image
        assert!(decode_image(&out).is_ok());
    }

    #[test]
    fn softmax_is_a_distribution() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
        assert!(softmax(&[]).is_empty());
    }

    #[test]
    fn argmax_breaks_ties_on_first_index() {
        assert_eq!(argmax(&[0.4, 0.4, 0.2]), Some((0, 0.4)));
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), Some((1, 0.7)));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn select_prediction_maps_argmax_onto_labels() {
        let (label, confidence) =
            select_prediction(&[0.2, 0.8], &labels(&["Leaf Blight", "Rust"])).unwrap();
        assert_eq!(label, "Rust");
        assert_eq!(confidence, 80);
    }

    #[test]
    fn select_prediction_synthesizes_out_of_bounds_label() {
        let probs = [0.05, 0.05, 0.1, 0.1, 0.1, 0.6];
        let (label, confidence) = select_prediction(&probs, &labels(&["A", "B"])).unwrap();
        assert_eq!(label, "class_5");
        assert_eq!(confidence, 60);
    }

    #[test]
    fn unloaded_slot_refuses_to_predict() {
        let slot = ModelSlot::new();
        assert!(!slot.is_loaded());
        let err = slot.predict(&png_data_url(8, 8), &labels(&["A"])).unwrap_err();
        assert!(err.0.contains("not loaded"));
    }

    #[tokio::test]
    async fn missing_model_file_fails_load_quietly() {
        let slot = ModelSlot::new();
        let http = reqwest::Client::new();
        assert!(!slot.ensure_loaded(&http, "/nonexistent/model.onnx").await);
        assert!(!slot.is_loaded());
    }
}
