//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! To change a default endpoint or limit, only edit this file.

/// App name (also the data directory name under the platform data dir)
pub const APP_NAME: &str = "CropDetect";

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum number of persisted scan history entries
pub const HISTORY_LIMIT: usize = 50;

/// Artificial latency of the demo analysis path (milliseconds).
/// Deliberate UX contract, not incidental.
pub const DEMO_ANALYSIS_DELAY_MS: u64 = 2_000;

/// Model input edge length (pixels); images are resized to a square
pub const MODEL_INPUT_SIZE: u32 = 224;

/// JPEG quality used when re-encoding images for the remote inference API
pub const JPEG_QUALITY: u8 = 90;

/// File name of the labels manifest expected next to the model file
pub const LABELS_MANIFEST_NAME: &str = "labels.json";

/// Timeout applied to every outbound HTTP request (seconds)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// OpenWeatherMap current-conditions endpoint
pub const OPENWEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

// ============================================
// Config store keys
// ============================================

/// URL or path of the local ONNX model file
pub const KEY_MODEL_ENDPOINT: &str = "model_endpoint";

/// URL of the server-side inference HTTP endpoint
pub const KEY_REMOTE_INFER_ENDPOINT: &str = "remote_infer_endpoint";

/// API key for the weather provider
pub const KEY_WEATHER_API_KEY: &str = "weather_api_key";

/// All keys the config store knows about
pub const CONFIG_KEYS: [&str; 3] = [
    KEY_MODEL_ENDPOINT,
    KEY_REMOTE_INFER_ENDPOINT,
    KEY_WEATHER_API_KEY,
];

// ============================================
// Helper functions to read defaults from env
// ============================================

/// Compiled-in default channel for a config key: the matching environment
/// variable. A locally stored override always takes precedence (see
/// `logic::config`).
pub fn env_default(key: &str) -> Option<String> {
    let var = match key {
        KEY_MODEL_ENDPOINT => "CROPDETECT_MODEL_ENDPOINT",
        KEY_REMOTE_INFER_ENDPOINT => "CROPDETECT_REMOTE_INFER_ENDPOINT",
        KEY_WEATHER_API_KEY => "CROPDETECT_WEATHER_API_KEY",
        _ => return None,
    };
    std::env::var(var).ok().filter(|v| !v.is_empty())
}

/// Base data directory for all durable state
pub fn data_dir() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(APP_NAME)
}
