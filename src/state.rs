//! # Application State Management
//!
//! Shared state that every HTTP request handler and the analysis pipeline need
//! access to at the same time.
//!
//! ## The Arc<RwLock<T>> pattern:
//! - **Arc**: many handlers can hold a reference to the same data
//! - **RwLock**: many readers OR one writer at a time
//! - Config and metrics sit behind this pair; the hub, session store, and
//!   collaborator set manage their own interior locking and only need Arc.

use crate::analyzers::CollaboratorSet;
use crate::config::AppConfig;
use crate::hub::ConnectionHub;
use crate::session::SessionStore;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// The main application state shared across all HTTP request handlers.
///
/// Constructed once in `main` and handed to actix-web as `web::Data<AppState>`.
/// Cloning is cheap: every field is either `Copy` or an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (can be updated at runtime via PUT /api/v1/config)
    pub config: Arc<RwLock<AppConfig>>,

    /// Performance metrics (updated by middleware on every request)
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started (never changes, so no lock needed)
    pub start_time: Instant,

    /// Registry of live WebSocket event channels, keyed by session id
    pub hub: Arc<ConnectionHub>,

    /// Per-session analysis history and counters
    pub store: Arc<SessionStore>,

    /// The audio prober, transcriber, emotion classifier, and text analyzers
    /// the pipeline runs against every upload
    pub collaborators: Arc<CollaboratorSet>,
}

/// Performance metrics collected across all HTTP requests.
///
/// - **request_count**: total requests processed (load monitoring)
/// - **error_count**: total errors (reliability monitoring)
/// - **active_runs**: analysis pipelines currently in flight (capacity gating)
/// - **endpoint_metrics**: per-endpoint statistics
#[derive(Debug, Default)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of errors encountered since server start
    pub error_count: u64,

    /// Number of analysis pipeline runs currently executing
    pub active_runs: u32,

    /// Detailed metrics for each API endpoint
    /// Key: endpoint name (e.g. "GET /health")
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Detailed performance metrics for a specific API endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    /// Number of requests to this specific endpoint
    pub request_count: u64,

    /// Total time spent processing all requests to this endpoint (milliseconds)
    pub total_duration_ms: u64,

    /// Number of errors that occurred for this endpoint
    pub error_count: u64,
}

impl AppState {
    /// Create a new AppState with the given configuration and an empty
    /// hub/store. The collaborator set is the standard heuristic stack.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
            hub: Arc::new(ConnectionHub::new()),
            store: Arc::new(SessionStore::new()),
            collaborators: Arc::new(CollaboratorSet::standard()),
        }
    }

    /// Get a copy of the current configuration.
    ///
    /// Cloning releases the read lock immediately so other threads aren't
    /// blocked; AppConfig is cheap to clone.
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    /// Update the configuration after validating it.
    ///
    /// Validation runs before the write lock is taken so the stored config is
    /// always valid.
    pub fn update_config(&self, new_config: AppConfig) -> Result<(), String> {
        match new_config.validate() {
            Ok(_) => {
                *self.config.write().unwrap() = new_config;
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    /// Increment the total request counter (called by middleware for every request).
    pub fn increment_request_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.request_count += 1;
    }

    /// Increment the total error counter (called when any request fails).
    pub fn increment_error_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.error_count += 1;
    }

    /// Record detailed metrics for a specific endpoint.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap();

        let endpoint_metric = metrics
            .endpoint_metrics
            .entry(endpoint.to_string())
            .or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Try to reserve a pipeline run slot.
    ///
    /// Returns false when `max_concurrent_runs` slots are already taken; the
    /// caller should reject the upload with 503 instead of queueing it.
    pub fn try_begin_run(&self, max_concurrent_runs: usize) -> bool {
        let mut metrics = self.metrics.write().unwrap();
        if metrics.active_runs as usize >= max_concurrent_runs {
            return false;
        }
        metrics.active_runs += 1;
        true
    }

    /// Release a pipeline run slot (called when a run finishes, on every exit path).
    ///
    /// Checks for underflow so a stray double-release can't panic the counter.
    pub fn end_run(&self) {
        let mut metrics = self.metrics.write().unwrap();
        if metrics.active_runs > 0 {
            metrics.active_runs -= 1;
        }
    }

    /// Get a snapshot of current metrics (used for the metrics endpoint).
    ///
    /// Clones the data so the lock isn't held while the HTTP response is
    /// being serialized.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        let metrics = self.metrics.read().unwrap();
        AppMetrics {
            request_count: metrics.request_count,
            error_count: metrics.error_count,
            active_runs: metrics.active_runs,
            endpoint_metrics: metrics.endpoint_metrics.clone(),
        }
    }

    /// Get server uptime in seconds.
    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    /// Average response time for this endpoint in milliseconds.
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Error rate for this endpoint as a fraction (0.0 to 1.0).
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
