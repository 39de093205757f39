//! Candidate-labels manifest
//!
//! A `labels.json` file (JSON array of strings) is expected alongside the
//! configured model file. The fetch is best-effort: any failure resolves to
//! the knowledge-base key set at the call site.

use crate::constants;

/// Manifest URL derived from the model endpoint by stripping the last path
/// segment and appending the fixed manifest file name.
pub fn manifest_url(model_endpoint: &str) -> String {
    match model_endpoint.rfind('/') {
        Some(idx) => format!(
            "{}/{}",
            &model_endpoint[..idx],
            constants::LABELS_MANIFEST_NAME
        ),
        None => constants::LABELS_MANIFEST_NAME.to_string(),
    }
}

/// Fetch and validate the manifest. `None` on any HTTP failure, non-success
/// status, or a body that is not a JSON array of strings.
pub async fn fetch(client: &reqwest::Client, model_endpoint: &str) -> Option<Vec<String>> {
    let url = manifest_url(model_endpoint);

    let response = match client.get(&url).send().await {
        Ok(r) => r,
        Err(e) => {
            log::debug!("Labels manifest fetch failed: {}", e);
            return None;
        }
    };

    if !response.status().is_success() {
        log::debug!("Labels manifest returned status {}", response.status());
        return None;
    }

    match response.json::<Vec<String>>().await {
        Ok(labels) => Some(labels),
        Err(e) => {
            log::debug!("Labels manifest malformed: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_strips_last_path_segment() {
        assert_eq!(
            manifest_url("https://models.example/tfjs/model.onnx"),
            "https://models.example/tfjs/labels.json"
        );
        assert_eq!(
            manifest_url("https://models.example/model.onnx"),
            "https://models.example/labels.json"
        );
    }

    #[test]
    fn url_without_separator_falls_back_to_bare_name() {
        assert_eq!(manifest_url("model.onnx"), "labels.json");
    }

    #[test]
    fn manifest_must_be_string_array() {
        assert!(serde_json::from_str::<Vec<String>>(r#"["Leaf Blight","Rust"]"#).is_ok());
        assert!(serde_json::from_str::<Vec<String>>(r#"["Leaf Blight",3]"#).is_err());
        assert!(serde_json::from_str::<Vec<String>>(r#"{"labels":[]}"#).is_err());
    }
}
