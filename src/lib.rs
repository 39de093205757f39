//! Crop Disease Detection - Core Service
//!
//! Inference orchestration for the crop-leaf disease detector: local ONNX
//! model, remote inference API, or demo fallback, plus the persisted scan
//! history, runtime config store and weather risk advisor. The presentation
//! layer talks to this crate through `api::commands`.

pub mod api;
pub mod constants;
pub mod logic;

/// Initialize logging for the host process. Safe to call more than once;
/// later calls are no-ops.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
    log::info!("{} core v{} starting", constants::APP_NAME, constants::APP_VERSION);
}
