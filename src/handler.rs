//! Request handler
//!
//! Runs the pipeline stages in order and catches their errors exactly once,
//! in the fallback resolver. The handler holds no per-request state, so one
//! instance can serve any number of concurrent requests.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::edits;
use crate::error::ImageRequestError;
use crate::metrics::RequestMetrics;
use crate::request::{
    assembler, fallback, format, path, security, ImageHandlerEvent, ImageRequestInfo,
    ResolvedRequest,
};
use crate::secrets::SecretProvider;

#[derive(Clone)]
pub struct ImageRequestHandler {
    config: Arc<Config>,
    secrets: Arc<dyn SecretProvider>,
    metrics: Option<Arc<RequestMetrics>>,
}

impl ImageRequestHandler {
    pub fn new(config: Arc<Config>, secrets: Arc<dyn SecretProvider>) -> Self {
        Self {
            config,
            secrets,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<RequestMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve an event, substituting the fallback image on failure
    pub async fn resolve(&self, event: &ImageHandlerEvent) -> Result<ResolvedRequest, ImageRequestError> {
        self.resolve_at(event, Utc::now()).await
    }

    /// Same as [`resolve`](Self::resolve) with an explicit clock
    pub async fn resolve_at(
        &self,
        event: &ImageHandlerEvent,
        now: DateTime<Utc>,
    ) -> Result<ResolvedRequest, ImageRequestError> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "image_request",
            request_id = %request_id,
            path = event.path.as_deref().unwrap_or_default()
        );

        async move {
            let started = Instant::now();
            let result = self.process(event, now).await;

            match &result {
                Ok(info) => {
                    tracing::debug!(
                        bucket = %info.bucket,
                        key = %info.key,
                        request_type = info.request_type.as_str(),
                        edits = info.edits.len(),
                        "Image request resolved"
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.record_resolved(info.request_type, started.elapsed());
                    }
                }
                Err(error) => {
                    tracing::debug!(error_code = error.code(), error = %error.message(), "Image request failed");
                    if let Some(metrics) = &self.metrics {
                        metrics.record_error(error, started.elapsed());
                    }
                }
            }

            let resolved = fallback::resolve(result, event, &self.config)?;
            if let (Some(metrics), Some(error)) = (&self.metrics, &resolved.fallback) {
                metrics.record_fallback(error);
            }
            Ok(resolved)
        }
        .instrument(span)
        .await
    }

    /// The linear pipeline; every stage fails loudly
    async fn process(
        &self,
        event: &ImageHandlerEvent,
        now: DateTime<Utc>,
    ) -> Result<ImageRequestInfo, ImageRequestError> {
        let config = self.config.as_ref();

        let raw = path::decode(event, config)?;
        let context = security::validate(&raw, event, config, self.secrets.as_ref(), now).await?;
        let edits = edits::normalize(&raw, config)?;
        let output = format::resolve(
            &edits,
            raw.explicit_output_format,
            event.accept(),
            config.auto_webp,
        );

        assembler::assemble(raw, &context, edits, output, config)
    }
}
