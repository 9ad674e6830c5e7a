//! Path codec
//!
//! Turns the event path into a [`RawRequest`] without interpreting edits.
//! The three encodings are tried in order:
//!
//! 1. Default: the path is base64 of a JSON object with `bucket` and `key`
//! 2. Thumbor: segments with structural tokens (`fit-in`, `300x200`, ...)
//! 3. Custom: segments made of function calls (`resize(300,200)`)
//!
//! A segmented path with no edit segments is still accepted as a plain
//! Thumbor request when it ends in an image file name.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use serde_json::{Map, Value};

use super::{ImageHandlerEvent, RawEdits, RawRequest};
use crate::config::Config;
use crate::edits::{call, thumbor, OutputFormat};
use crate::error::ImageRequestError;

/// Extensions that mark the last segment as an image object key
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "webp", "tiff", "tif", "gif", "avif", "heic", "heif", "svg",
];

pub fn decode(event: &ImageHandlerEvent, config: &Config) -> Result<RawRequest, ImageRequestError> {
    let path = event.path.as_deref().unwrap_or_default();
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        return Err(ImageRequestError::cannot_read_path());
    }

    if let Some(request) = decode_default(trimmed, path, config)? {
        return Ok(request);
    }
    decode_segmented(trimmed, path, config)
}

/// Try the base64 JSON encoding
///
/// Returns `Ok(None)` when the path is not base64 JSON with a bucket and a
/// key, so the caller can fall back to segmented parsing.
fn decode_default(
    encoded: &str,
    path: &str,
    config: &Config,
) -> Result<Option<RawRequest>, ImageRequestError> {
    let Some(bytes) = decode_base64(encoded) else {
        return Ok(None);
    };
    let Ok(Value::Object(mut object)) = serde_json::from_slice::<Value>(&bytes) else {
        return Ok(None);
    };

    let (bucket, key) = match (object.get("bucket"), object.get("key")) {
        (Some(Value::String(b)), Some(Value::String(k))) if !b.is_empty() && !k.is_empty() => {
            (b.clone(), k.clone())
        }
        _ => return Ok(None),
    };
    if !config.is_bucket_allowed(&bucket) {
        return Err(ImageRequestError::cannot_access_bucket(&bucket));
    }

    let edits = match object.remove("edits") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(ImageRequestError::cannot_decode(
                "The 'edits' field of the request must be a JSON object",
            ))
        }
    };
    let explicit_output_format = match object.get("outputFormat") {
        None | Some(Value::Null) => None,
        Some(Value::String(format)) => Some(format.parse::<OutputFormat>()?),
        Some(other) => {
            return Err(ImageRequestError::invalid_param(
                "outputFormat",
                "format",
                format!("expected a string, got {}", other),
            ))
        }
    };

    Ok(Some(RawRequest {
        bucket,
        key,
        raw_edits: RawEdits::Default(edits),
        explicit_output_format,
        path: path.to_string(),
    }))
}

fn decode_base64(encoded: &str) -> Option<Vec<u8>> {
    [STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(encoded).ok())
}

/// Split the path into edit segments and the bucket/key remainder
fn decode_segmented(
    trimmed: &str,
    path: &str,
    config: &Config,
) -> Result<RawRequest, ImageRequestError> {
    let segments = split_segments(trimmed);

    let edit_count = segments
        .iter()
        .take_while(|s| thumbor::is_structural_token(s) || call::is_call_segment(s))
        .count();
    let (edit_segments, remaining) = segments.split_at(edit_count);
    if remaining.is_empty() {
        return Err(ImageRequestError::cannot_decode(
            "The request path does not name an image object",
        ));
    }

    let tokens: Vec<String> = edit_segments.iter().map(|s| s.to_string()).collect();
    let raw_edits = if edit_segments
        .iter()
        .any(|s| thumbor::is_structural_token(s))
    {
        RawEdits::Thumbor(tokens)
    } else if !edit_segments.is_empty() {
        RawEdits::Custom(tokens)
    } else if remaining.last().is_some_and(|s| has_image_extension(s)) {
        RawEdits::Thumbor(Vec::new())
    } else {
        return Err(ImageRequestError::cannot_decode(
            "The request path is neither base64 encoded JSON nor a recognized image path",
        ));
    };

    let (bucket, key) = split_bucket_key(remaining, config)?;
    Ok(RawRequest {
        bucket,
        key,
        raw_edits,
        explicit_output_format: None,
        path: path.to_string(),
    })
}

/// Split on `/` outside parentheses, so call arguments may hold object keys
/// with folders (`filters:watermark(marks,logos/brand.png,0,0)`)
fn split_segments(path: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in path.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            '/' if depth == 0 => {
                segments.push(&path[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&path[start..]);
    segments.retain(|s| !s.is_empty());
    segments
}

/// First segment names the bucket when it is allow-listed and more follow;
/// otherwise the default bucket is used and everything is the key.
fn split_bucket_key(
    remaining: &[&str],
    config: &Config,
) -> Result<(String, String), ImageRequestError> {
    if let [first, rest @ ..] = remaining {
        if !rest.is_empty() && config.is_bucket_allowed(first) {
            return Ok((first.to_string(), rest.join("/")));
        }
    }

    let bucket = config
        .default_bucket()
        .ok_or_else(|| ImageRequestError::cannot_access_bucket(remaining[0]))?;
    Ok((bucket.to_string(), remaining.join("/")))
}

fn has_image_extension(segment: &str) -> bool {
    segment
        .rsplit_once('.')
        .map(|(_, ext)| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}
