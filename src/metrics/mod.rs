// Request pipeline Prometheus metrics
//
// Provides:
// - Resolved request counters by request type
// - Error counters by error code
// - Fallback substitution counters by absorbed error code
// - Resolution latency histogram

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

use crate::error::ImageRequestError;
use crate::request::RequestType;

/// Metrics for the request decoding pipeline
///
/// Each instance owns its registry, so several handlers (or tests) can
/// coexist in one process without colliding on metric names.
pub struct RequestMetrics {
    registry: Registry,

    /// Successfully resolved requests by request type
    pub requests_total: IntCounterVec,

    /// Pipeline failures by error code
    pub errors_total: IntCounterVec,

    /// Fallback substitutions by absorbed error code
    pub fallbacks_total: IntCounterVec,

    /// Time spent resolving a request, in seconds
    pub resolve_duration_seconds: HistogramVec,
}

impl RequestMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new(
                "image_requests_total",
                "Total number of resolved image requests by request type",
            ),
            &["request_type"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let errors_total = IntCounterVec::new(
            Opts::new(
                "image_request_errors_total",
                "Total number of image request failures by error code",
            ),
            &["code"],
        )?;
        registry.register(Box::new(errors_total.clone()))?;

        let fallbacks_total = IntCounterVec::new(
            Opts::new(
                "image_request_fallbacks_total",
                "Total number of fallback image substitutions by error code",
            ),
            &["code"],
        )?;
        registry.register(Box::new(fallbacks_total.clone()))?;

        let resolve_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "image_request_resolve_duration_seconds",
                "Duration of request decoding and validation in seconds",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]), // 0.1ms to 1s
            &["outcome"],
        )?;
        registry.register(Box::new(resolve_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            errors_total,
            fallbacks_total,
            resolve_duration_seconds,
        })
    }

    pub fn record_resolved(&self, request_type: RequestType, elapsed: Duration) {
        self.requests_total
            .with_label_values(&[request_type.as_str()])
            .inc();
        self.resolve_duration_seconds
            .with_label_values(&["resolved"])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_error(&self, error: &ImageRequestError, elapsed: Duration) {
        self.errors_total.with_label_values(&[error.code()]).inc();
        self.resolve_duration_seconds
            .with_label_values(&["error"])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_fallback(&self, error: &ImageRequestError) {
        self.fallbacks_total.with_label_values(&[error.code()]).inc();
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn gather_text(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
