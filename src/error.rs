//! Image request error types
//!
//! Every failure the request pipeline can produce is an [`ImageRequestError`]
//! tagged with an [`ErrorKind`]. The kind decides the HTTP status surfaced to
//! the caller and the stage the failure belongs to.

use std::fmt;

use serde::Serialize;

/// Stage of the pipeline an error originates from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Path could not be turned into a request
    Decode,
    /// Signature, expiry or secret failures
    Security,
    /// Malformed edit operations or parameters
    Edits,
}

/// Kind of failure, independent of the message text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Decode ===
    /// Path is empty or absent
    CannotReadPath,
    /// Path is present but matches no request shape
    CannotDecodeRequest,
    /// Bucket is not in the configured allow-list
    CannotAccessBucket,

    // === Security ===
    /// Signing is enabled but no signature was supplied
    SignatureMissing,
    /// Supplied signature does not match the path
    SignatureMismatch,
    /// Secret store lookup failed or timed out
    SecretUnavailable,
    /// `expires` does not match `YYYYMMDDTHHMMSSZ`
    ImageRequestExpiryFormat,
    /// `expires` is not in the future
    ImageRequestExpired,

    // === Edits ===
    /// Recognized operation with a parameter of the wrong type or range
    InvalidEditParameter,
    /// Operation name outside the edit vocabulary
    UnknownEditOperation,
}

impl ErrorKind {
    /// Stable error code, equal to the kind name
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::CannotReadPath => "CannotReadPath",
            ErrorKind::CannotDecodeRequest => "CannotDecodeRequest",
            ErrorKind::CannotAccessBucket => "CannotAccessBucket",
            ErrorKind::SignatureMissing => "SignatureMissing",
            ErrorKind::SignatureMismatch => "SignatureMismatch",
            ErrorKind::SecretUnavailable => "SecretUnavailable",
            ErrorKind::ImageRequestExpiryFormat => "ImageRequestExpiryFormat",
            ErrorKind::ImageRequestExpired => "ImageRequestExpired",
            ErrorKind::InvalidEditParameter => "InvalidEditParameter",
            ErrorKind::UnknownEditOperation => "UnknownEditOperation",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorKind::CannotReadPath
            | ErrorKind::CannotDecodeRequest
            | ErrorKind::CannotAccessBucket => ErrorCategory::Decode,

            ErrorKind::SignatureMissing
            | ErrorKind::SignatureMismatch
            | ErrorKind::SecretUnavailable
            | ErrorKind::ImageRequestExpiryFormat
            | ErrorKind::ImageRequestExpired => ErrorCategory::Security,

            ErrorKind::InvalidEditParameter | ErrorKind::UnknownEditOperation => {
                ErrorCategory::Edits
            }
        }
    }

    /// Maps error kinds to HTTP status codes
    ///
    /// Status mapping:
    /// - CannotAccessBucket, SignatureMismatch → 403 (Forbidden)
    /// - SecretUnavailable → 500 (Internal Server Error)
    /// - everything else is a client error → 400 (Bad Request)
    pub fn to_http_status(&self) -> u16 {
        match self {
            // 403 Forbidden
            ErrorKind::CannotAccessBucket | ErrorKind::SignatureMismatch => 403,

            // 500 Internal Server Error
            ErrorKind::SecretUnavailable => 500,

            // 400 Bad Request
            ErrorKind::CannotReadPath
            | ErrorKind::CannotDecodeRequest
            | ErrorKind::SignatureMissing
            | ErrorKind::ImageRequestExpiryFormat
            | ErrorKind::ImageRequestExpired
            | ErrorKind::InvalidEditParameter
            | ErrorKind::UnknownEditOperation => 400,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error raised by any stage of the request pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequestError {
    kind: ErrorKind,
    message: String,
}

impl ImageRequestError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    pub fn status_code(&self) -> u16 {
        self.kind.to_http_status()
    }

    /// Body a transport adapter can serialize when fallback is disabled
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            status_code: self.status_code(),
            code: self.code().to_string(),
            message: self.message.clone(),
        }
    }

    // Helper constructors for common error patterns

    pub fn cannot_read_path() -> Self {
        Self::new(
            ErrorKind::CannotReadPath,
            "The URL path you provided could not be read. Please ensure that it is properly formed.",
        )
    }

    pub fn cannot_decode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CannotDecodeRequest, message)
    }

    pub fn cannot_access_bucket(bucket: &str) -> Self {
        Self::new(
            ErrorKind::CannotAccessBucket,
            format!("The bucket '{}' is not in the list of allowed source buckets", bucket),
        )
    }

    pub fn invalid_param(
        operation: impl AsRef<str>,
        param: impl AsRef<str>,
        message: impl AsRef<str>,
    ) -> Self {
        Self::new(
            ErrorKind::InvalidEditParameter,
            format!(
                "Invalid parameter '{}' for operation '{}': {}",
                param.as_ref(),
                operation.as_ref(),
                message.as_ref()
            ),
        )
    }

    pub fn unknown_operation(operation: impl AsRef<str>) -> Self {
        Self::new(
            ErrorKind::UnknownEditOperation,
            format!("Unknown edit operation '{}'", operation.as_ref()),
        )
    }

    pub fn secret_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SecretUnavailable, message)
    }
}

impl fmt::Display for ImageRequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ImageRequestError {}

/// Serializable error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub status_code: u16,
    pub code: String,
    pub message: String,
}
