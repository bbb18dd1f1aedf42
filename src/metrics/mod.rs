//! Metrics collection for observability

use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_vec_with_registry, register_histogram_with_registry, Counter, CounterVec,
    Histogram, HistogramVec, Opts, Registry,
};
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Duration;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Buckets for token-count histograms
const TOKEN_BUCKETS: &[f64] = &[
    16.0, 64.0, 256.0, 512.0, 1024.0, 2048.0, 4096.0, 8192.0, 16384.0, 32768.0,
];

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // HTTP chat endpoints
    pub chat_requests: CounterVec,
    pub chat_request_duration: HistogramVec,

    // Compaction
    pub compactions: Counter,
    pub compaction_input_tokens: Histogram,
    pub compaction_tokens_saved: Histogram,

    // Inference
    pub pipeline_tokens: HistogramVec,

    // Model backends
    pub model_calls: CounterVec,
    pub model_call_duration: HistogramVec,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let chat_requests = register_counter_vec_with_registry!(
            Opts::new("chat_requests_total", "Total chat requests"),
            &["path", "status"],
            registry
        )?;

        let chat_request_duration = register_histogram_vec_with_registry!(
            "chat_request_duration_seconds",
            "Chat request duration in seconds",
            &["path"],
            registry
        )?;

        let compactions = register_counter_with_registry!(
            Opts::new("compactions_total", "Total history compactions performed"),
            registry
        )?;

        let compaction_input_tokens = register_histogram_with_registry!(
            "compaction_input_tokens",
            "Estimated history tokens sent to the compactor",
            TOKEN_BUCKETS.to_vec(),
            registry
        )?;

        let compaction_tokens_saved = register_histogram_with_registry!(
            "compaction_tokens_saved",
            "Estimated tokens removed from the context by compaction",
            TOKEN_BUCKETS.to_vec(),
            registry
        )?;

        let pipeline_tokens = register_histogram_vec_with_registry!(
            "pipeline_tokens",
            "Estimated inference tokens per request",
            &["path", "kind"],
            TOKEN_BUCKETS.to_vec(),
            registry
        )?;

        let model_calls = register_counter_vec_with_registry!(
            Opts::new("model_calls_total", "Total model backend calls"),
            &["model", "status"],
            registry
        )?;

        let model_call_duration = register_histogram_vec_with_registry!(
            "model_call_duration_seconds",
            "Model backend call duration in seconds, retries included",
            &["model"],
            registry
        )?;

        Ok(Self {
            registry,
            chat_requests,
            chat_request_duration,
            compactions,
            compaction_input_tokens,
            compaction_tokens_saved,
            pipeline_tokens,
            model_calls,
            model_call_duration,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a finished chat request
    pub fn record_chat(&self, path: &str, success: bool, elapsed: Duration) {
        let status = if success { "success" } else { "error" };
        self.chat_requests.with_label_values(&[path, status]).inc();
        self.chat_request_duration
            .with_label_values(&[path])
            .observe(elapsed.as_secs_f64());
    }

    /// Record a compaction and how much it shrank the context
    pub fn record_compaction(&self, input_tokens: usize, output_tokens: usize) {
        self.compactions.inc();
        self.compaction_input_tokens.observe(input_tokens as f64);
        self.compaction_tokens_saved
            .observe(input_tokens.saturating_sub(output_tokens) as f64);
    }

    /// Record inference prompt and answer sizes
    pub fn record_pipeline_tokens(&self, path: &str, input_tokens: usize, output_tokens: usize) {
        self.pipeline_tokens
            .with_label_values(&[path, "input"])
            .observe(input_tokens as f64);
        self.pipeline_tokens
            .with_label_values(&[path, "output"])
            .observe(output_tokens as f64);
    }

    /// Record one model call outcome
    pub fn record_model_call(&self, model: &str, status: &str, elapsed: Duration) {
        self.model_calls.with_label_values(&[model, status]).inc();
        self.model_call_duration
            .with_label_values(&[model])
            .observe(elapsed.as_secs_f64());
    }

    /// Export this registry in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();

        String::from_utf8(buffer).unwrap_or_default()
    }
}
