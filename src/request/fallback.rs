//! Fallback image substitution
//!
//! The single place where pipeline errors are absorbed. With the fallback
//! image enabled, any error becomes a request for the configured substitute
//! object; otherwise the error is returned unchanged.

use super::{ImageHandlerEvent, ImageRequestInfo, RequestType, ResolvedRequest};
use crate::config::Config;
use crate::edits::Edits;
use crate::error::ImageRequestError;

pub fn resolve(
    result: Result<ImageRequestInfo, ImageRequestError>,
    event: &ImageHandlerEvent,
    config: &Config,
) -> Result<ResolvedRequest, ImageRequestError> {
    let error = match result {
        Ok(info) => return Ok(ResolvedRequest::ok(info)),
        Err(error) => error,
    };

    let fallback = &config.fallback;
    let (Some(bucket), Some(key)) = (fallback.bucket.as_deref(), fallback.key.as_deref()) else {
        return Err(error);
    };
    if !fallback.enabled {
        return Err(error);
    }

    let status_code = fallback.status_code.unwrap_or_else(|| error.status_code());
    tracing::warn!(
        error_code = error.code(),
        error = %error.message(),
        fallback_bucket = bucket,
        fallback_key = key,
        status_code = status_code,
        "Serving fallback image"
    );

    Ok(ResolvedRequest {
        info: ImageRequestInfo {
            request_type: RequestType::Default,
            bucket: bucket.to_string(),
            key: key.to_string(),
            edits: Edits::new(),
            output_format: None,
            content_type: None,
            cache_control: fallback.cache_control.clone(),
            expires: None,
            original_path: event.path.clone().unwrap_or_default(),
        },
        status_code,
        fallback: Some(error),
    })
}
