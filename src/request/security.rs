//! Request signing and expiry
//!
//! - Expiry: `expires=YYYYMMDDTHHMMSSZ`, must lie strictly in the future
//! - Signing: `signature = HMAC-SHA256(secret, path)`, hex or base64 encoded.
//!   With `expires` present the signed string is `path?expires=<value>`, so
//!   the expiry of a signed link cannot be rewritten.
//!
//! Expiry is checked first since it needs no secret lookup.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use regex::Regex;
use sha2::Sha256;
use std::sync::OnceLock;

use super::{ImageHandlerEvent, RawRequest, SecurityContext};
use crate::config::Config;
use crate::constants::EXPIRES_PARAM;
use crate::error::{ErrorKind, ImageRequestError};
use crate::secrets::{self, SecretProvider};

type HmacSha256 = Hmac<Sha256>;

const EXPIRES_FORMAT: &str = "%Y%m%dT%H%M%SZ";

fn expires_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{8}T\d{6}Z$").expect("expires regex is valid"))
}

/// Run the expiry and signature checks for one request
pub async fn validate(
    raw: &RawRequest,
    event: &ImageHandlerEvent,
    config: &Config,
    provider: &dyn SecretProvider,
    now: DateTime<Utc>,
) -> Result<SecurityContext, ImageRequestError> {
    let expires_at = event
        .expires()
        .map(|value| validate_expiry(value, now))
        .transpose()?;

    if !config.enable_signature {
        return Ok(SecurityContext {
            signature_required: false,
            signature_valid: false,
            expires_at,
        });
    }

    let signature = event.signature().ok_or_else(|| {
        ImageRequestError::new(
            ErrorKind::SignatureMissing,
            "Query-string requires the signature parameter.",
        )
    })?;
    let secret_name = config.secrets_manager.as_deref().ok_or_else(|| {
        ImageRequestError::secret_unavailable("No signing secret is configured")
    })?;
    let key = secrets::fetch_signing_key(
        provider,
        secret_name,
        config.secret_key.as_deref(),
        config.secret_timeout(),
    )
    .await?;

    let message = string_to_sign(&raw.path, event.expires());
    verify_signature(key.as_bytes(), &message, signature)?;
    tracing::debug!(path = %raw.path, "Request signature verified");

    Ok(SecurityContext {
        signature_required: true,
        signature_valid: true,
        expires_at,
    })
}

/// Parse `expires` and require it to be later than `now`
pub fn validate_expiry(value: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, ImageRequestError> {
    let expires_at = parse_expires(value)?;
    if expires_at <= now {
        return Err(ImageRequestError::new(
            ErrorKind::ImageRequestExpired,
            "Request has expired.",
        ));
    }
    Ok(expires_at)
}

/// Strict `YYYYMMDDTHHMMSSZ` parse, calendar-checked
pub fn parse_expires(value: &str) -> Result<DateTime<Utc>, ImageRequestError> {
    let invalid = || {
        ImageRequestError::new(
            ErrorKind::ImageRequestExpiryFormat,
            format!(
                "Expires '{}' is not in the format YYYYMMDDTHHMMSSZ.",
                value
            ),
        )
    };
    if !expires_regex().is_match(value) {
        return Err(invalid());
    }
    let naive = NaiveDateTime::parse_from_str(value, EXPIRES_FORMAT).map_err(|_| invalid())?;
    Ok(Utc.from_utc_datetime(&naive))
}

/// Render a timestamp the way `expires` expects it
pub fn format_expires(at: DateTime<Utc>) -> String {
    at.format(EXPIRES_FORMAT).to_string()
}

/// The string covered by the signature
pub fn string_to_sign(path: &str, expires: Option<&str>) -> String {
    match expires {
        Some(expires) => format!("{}?{}={}", path, EXPIRES_PARAM, expires),
        None => path.to_string(),
    }
}

/// Hex-encoded HMAC-SHA256 of a string to sign
pub fn sign_path(key: &[u8], message: &str) -> Result<String, ImageRequestError> {
    let mut mac = new_mac(key)?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a hex or base64 signature in constant time
pub fn verify_signature(
    key: &[u8],
    message: &str,
    signature: &str,
) -> Result<(), ImageRequestError> {
    let mismatch = || {
        ImageRequestError::new(
            ErrorKind::SignatureMismatch,
            "Signature does not match.",
        )
    };
    let tag = decode_signature(signature).ok_or_else(mismatch)?;

    let mut mac = new_mac(key)?;
    mac.update(message.as_bytes());
    mac.verify_slice(&tag).map_err(|_| mismatch())
}

fn new_mac(key: &[u8]) -> Result<HmacSha256, ImageRequestError> {
    HmacSha256::new_from_slice(key)
        .map_err(|e| ImageRequestError::secret_unavailable(format!("Invalid signing key: {}", e)))
}

fn decode_signature(signature: &str) -> Option<Vec<u8>> {
    let signature = signature.trim();
    if signature.len() == 64 && signature.chars().all(|c| c.is_ascii_hexdigit()) {
        return hex::decode(signature).ok();
    }
    [STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(signature).ok())
}
