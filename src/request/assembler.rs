//! Request assembly
//!
//! Aggregates the outputs of the earlier stages into one immutable
//! [`ImageRequestInfo`]. The result depends only on the request and the
//! configuration, never on the clock: the expiry is carried as-is and
//! [`ImageRequestInfo::cache_control_at`] caps `max-age` when the response
//! is written.

use super::format::OutputDecision;
use super::{ImageRequestInfo, RawRequest, SecurityContext};
use crate::config::Config;
use crate::edits::Edits;
use crate::error::{ErrorKind, ImageRequestError};

pub fn assemble(
    raw: RawRequest,
    security: &SecurityContext,
    edits: Edits,
    output: OutputDecision,
    config: &Config,
) -> Result<ImageRequestInfo, ImageRequestError> {
    // A request that skipped signature validation must never be assembled
    if (config.enable_signature || security.signature_required) && !security.signature_valid {
        return Err(ImageRequestError::new(
            ErrorKind::SignatureMismatch,
            "Request signature was not validated",
        ));
    }

    Ok(ImageRequestInfo {
        request_type: raw.request_type(),
        bucket: raw.bucket,
        key: raw.key,
        edits,
        output_format: output.format(),
        content_type: output.content_type().map(str::to_string),
        cache_control: config.cache_control.clone(),
        expires: security.expires_at,
        original_path: raw.path,
    })
}

/// Lower the `max-age` directive to at most `limit` seconds
///
/// Adds a `max-age` directive when the value has none.
pub fn cap_max_age(cache_control: &str, limit: u64) -> String {
    let mut found = false;
    let mut directives: Vec<String> = cache_control
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|directive| match directive.split_once('=') {
            Some((name, value)) if name.trim().eq_ignore_ascii_case("max-age") => {
                found = true;
                let current = value.trim().parse::<u64>().unwrap_or(limit);
                format!("max-age={}", current.min(limit))
            }
            _ => directive.to_string(),
        })
        .collect();
    if !found {
        directives.push(format!("max-age={}", limit));
    }
    directives.join(",")
}
