//! Detector Commands - API for the Frontend
//!
//! `Detector` wires the inference engine, history ledger and config store
//! together and drives the scan state machine:
//! Idle -> Analyzing -> Resolved, or back to Idle on reset. Reset aborts the
//! in-flight analysis task, so a cancelled scan is never recorded.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::constants;
use crate::logic::config::ConfigStore;
use crate::logic::history::{HistoryEntry, HistoryLedger};
use crate::logic::inference::{AnalysisOutcome, InferenceConfig, InferenceEngine};
use crate::logic::weather::{self, RiskLevel, WeatherNow};

/// Scan lifecycle state as seen by the UI
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ScanState {
    Idle,
    Analyzing,
    Resolved(AnalysisOutcome),
}

/// Weather command response: current conditions plus the risk tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub now: WeatherNow,
    pub risk: RiskLevel,
}

pub struct Detector {
    engine: Arc<InferenceEngine>,
    history: Arc<HistoryLedger>,
    config: Arc<ConfigStore>,
    http: reqwest::Client,
    state: Arc<RwLock<ScanState>>,
    task: Mutex<Option<JoinHandle<()>>>,
    /// Bumped on every reset; a scan task may only commit its outcome while
    /// the generation it was started under is still current.
    generation: Arc<AtomicU64>,
}

impl Default for Detector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector {
    /// Detector backed by the default storage locations
    pub fn new() -> Self {
        Self::with_parts(ConfigStore::open_default(), HistoryLedger::open_default())
    }

    /// Detector over explicit storage (tests use temp dirs here)
    pub fn with_parts(config: ConfigStore, history: HistoryLedger) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(constants::DEFAULT_HTTP_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            engine: Arc::new(InferenceEngine::new()),
            history: Arc::new(history),
            config: Arc::new(config),
            http,
            state: Arc::new(RwLock::new(ScanState::Idle)),
            task: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    // ========================================================================
    // SCAN LIFECYCLE
    // ========================================================================

    pub fn scan_state(&self) -> ScanState {
        self.state.read().clone()
    }

    /// Begin analyzing an image. Any previous in-flight scan is cancelled.
    /// On completion the outcome is recorded in history and the state moves
    /// to `Resolved`.
    pub fn start_scan(&self, image_data_url: String) {
        self.reset_scan();
        *self.state.write() = ScanState::Analyzing;

        let engine = Arc::clone(&self.engine);
        let history = Arc::clone(&self.history);
        let config = Arc::clone(&self.config);
        let state = Arc::clone(&self.state);
        let generation = Arc::clone(&self.generation);
        let scan_gen = generation.load(Ordering::SeqCst);

        let handle = tokio::spawn(async move {
            let cfg = InferenceConfig::from_store(&config);
            let labels = engine.resolve_labels(&cfg).await;
            let outcome = engine.analyze(&image_data_url, &cfg, &labels).await;

            commit_outcome(&state, &history, &generation, scan_gen, &image_data_url, outcome);
        });

        *self.task.lock() = Some(handle);
    }

    /// Discard the current scan. Aborts in-flight work rather than merely
    /// ignoring its eventual completion, so no late ledger write can happen.
    /// Idempotent.
    pub fn reset_scan(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
        // Bump under the state lock so a task past its last await point sees
        // the stale generation and discards its outcome instead of recording
        // a cancelled scan.
        let mut state = self.state.write();
        self.generation.fetch_add(1, Ordering::SeqCst);
        *state = ScanState::Idle;
    }

    /// Awaitable one-shot analysis for callers that manage their own
    /// lifecycle. Does not touch the scan state machine or the ledger.
    pub async fn analyze_blocking(&self, image_data_url: &str) -> AnalysisOutcome {
        let cfg = InferenceConfig::from_store(&self.config);
        let labels = self.engine.resolve_labels(&cfg).await;
        self.engine.analyze(image_data_url, &cfg, &labels).await
    }

    // ========================================================================
    // HISTORY COMMANDS
    // ========================================================================

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.list()
    }

    pub fn clear_history(&self) {
        self.history.clear();
    }

    // ========================================================================
    // CONFIG COMMANDS
    // ========================================================================

    pub fn get_config(&self, key: &str) -> Option<String> {
        self.config.get(key)
    }

    pub fn set_config(&self, key: &str, value: &str) {
        self.config.set(key, value);
    }

    pub fn clear_config(&self, key: &str) {
        self.config.clear(key);
    }

    pub fn list_config(&self) -> BTreeMap<&'static str, Option<String>> {
        self.config.list()
    }

    // ========================================================================
    // WEATHER COMMAND
    // ========================================================================

    /// Current conditions and risk tier for the given coordinates. `None`
    /// when no API key is configured or the lookup fails.
    pub async fn weather_report(&self, lat: f64, lon: f64) -> Option<WeatherReport> {
        let api_key = self.config.get(constants::KEY_WEATHER_API_KEY)?;
        let now = weather::fetch_current(&self.http, lat, lon, &api_key).await?;
        let risk = weather::classify_risk(now.humidity, now.temp_c);
        Some(WeatherReport { now, risk })
    }
}

/// Record a finished scan, unless a reset superseded it. `JoinHandle::abort`
/// only lands on await points, so a task that already left its last await
/// could otherwise still write; the generation check inside the state lock
/// closes that window.
fn commit_outcome(
    state: &RwLock<ScanState>,
    history: &HistoryLedger,
    generation: &AtomicU64,
    scan_gen: u64,
    image_data_url: &str,
    outcome: AnalysisOutcome,
) {
    let mut state = state.write();
    if generation.load(Ordering::SeqCst) != scan_gen {
        log::debug!("Discarding outcome of a superseded scan");
        return;
    }
    history.append(image_data_url, Some(outcome.result.clone()));
    *state = ScanState::Resolved(outcome);
}
