//! Remote inference API path
//!
//! POST the image as a compressed JPEG data URL and expect
//! `{"prediction": {"label": ..., "confidence": ...}}`. Any non-success
//! status, network failure or malformed body is "no result" - the caller
//! falls back to the demo path, never an error.

use serde::{Deserialize, Serialize};

use super::model;

#[derive(Debug, Serialize)]
struct InferRequest<'a> {
    image: &'a str,
}

#[derive(Debug, Deserialize)]
struct InferResponse {
    prediction: Option<RemotePrediction>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemotePrediction {
    pub label: String,
    /// Integer percentage on the wire; float-typed to accept either shape
    pub confidence: f64,
}

pub async fn infer(
    client: &reqwest::Client,
    endpoint: &str,
    image_data_url: &str,
) -> Option<RemotePrediction> {
    // Recompress for the wire; ship the original verbatim if decoding fails
    // so the server can still try.
    let payload = model::jpeg_data_url(image_data_url)
        .unwrap_or_else(|| image_data_url.to_string());

    let response = match client
        .post(endpoint)
        .json(&InferRequest { image: &payload })
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            log::debug!("Remote inference request failed: {}", e);
            return None;
        }
    };

    if !response.status().is_success() {
        log::debug!("Remote inference returned status {}", response.status());
        return None;
    }

    match response.json::<InferResponse>().await {
        Ok(body) => body.prediction,
        Err(e) => {
            log::debug!("Remote inference body malformed: {}", e);
            None
        }
    }
}
