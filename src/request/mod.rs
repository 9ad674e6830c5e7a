//! Request data model and pipeline stages
//!
//! A request flows through:
//!
//! ```text
//! ImageHandlerEvent
//!   → path::decode          (RawRequest)
//!   → security::validate    (SecurityContext)
//!   → edits::normalize      (Edits)
//!   → format::resolve       (OutputDecision)
//!   → assembler::assemble   (ImageRequestInfo)
//! ```
//!
//! Any failure is caught once by [`fallback::resolve`].

pub mod assembler;
pub mod fallback;
pub mod format;
pub mod path;
pub mod security;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

use crate::constants::{EXPIRES_PARAM, SIGNATURE_PARAM, STATUS_OK};
use crate::edits::{Edits, OutputFormat};
use crate::error::ImageRequestError;

/// Inbound event, in the API-Gateway JSON shape
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageHandlerEvent {
    #[serde(default)]
    pub path: Option<String>,

    #[serde(default)]
    pub query_string_parameters: Option<HashMap<String, String>>,

    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
}

impl ImageHandlerEvent {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_string_parameters
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_string_parameters
            .as_ref()?
            .get(name)
            .map(String::as_str)
    }

    /// Header lookup, ignoring case
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_ref()?
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn signature(&self) -> Option<&str> {
        self.query_param(SIGNATURE_PARAM)
    }

    pub fn expires(&self) -> Option<&str> {
        self.query_param(EXPIRES_PARAM)
    }

    pub fn accept(&self) -> Option<&str> {
        self.header("Accept")
    }
}

/// Request encoding, decided from the path shape alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RequestType {
    Default,
    Thumbor,
    Custom,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Default => "Default",
            RequestType::Thumbor => "Thumbor",
            RequestType::Custom => "Custom",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Untyped edits as found in the request, one variant per request type
#[derive(Debug, Clone, PartialEq)]
pub enum RawEdits {
    /// The `edits` object of a Default request, in insertion order
    Default(Map<String, Value>),
    /// Thumbor path tokens, in path order
    Thumbor(Vec<String>),
    /// Custom DSL segments, in path order
    Custom(Vec<String>),
}

impl RawEdits {
    pub fn request_type(&self) -> RequestType {
        match self {
            RawEdits::Default(_) => RequestType::Default,
            RawEdits::Thumbor(_) => RequestType::Thumbor,
            RawEdits::Custom(_) => RequestType::Custom,
        }
    }
}

/// Output of the path codec
#[derive(Debug, Clone, PartialEq)]
pub struct RawRequest {
    pub bucket: String,
    pub key: String,
    pub raw_edits: RawEdits,
    /// `outputFormat` of a Default request
    pub explicit_output_format: Option<OutputFormat>,
    /// Path exactly as received; this is what gets signed
    pub path: String,
}

impl RawRequest {
    pub fn request_type(&self) -> RequestType {
        self.raw_edits.request_type()
    }
}

/// Outcome of the security checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityContext {
    pub signature_required: bool,
    pub signature_valid: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Fully validated request, handed to the transform stage
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequestInfo {
    pub request_type: RequestType,
    pub bucket: String,
    pub key: String,
    pub edits: Edits,
    /// `None` keeps the source object's format
    pub output_format: Option<OutputFormat>,
    pub content_type: Option<String>,
    pub cache_control: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    pub original_path: String,
}

impl ImageRequestInfo {
    /// Cache-Control to send at `now`: `max-age` never outlives the expiry
    pub fn cache_control_at(&self, now: DateTime<Utc>) -> String {
        match self.expires {
            Some(expires) => {
                let remaining = (expires - now).num_seconds().max(0) as u64;
                assembler::cap_max_age(&self.cache_control, remaining)
            }
            None => self.cache_control.clone(),
        }
    }
}

/// Result of a pipeline run, possibly a fallback substitute
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRequest {
    pub info: ImageRequestInfo,
    pub status_code: u16,
    /// Error absorbed by the fallback, if any
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_fallback"
    )]
    pub fallback: Option<ImageRequestError>,
}

impl ResolvedRequest {
    pub fn ok(info: ImageRequestInfo) -> Self {
        Self {
            info,
            status_code: STATUS_OK,
            fallback: None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

fn serialize_fallback<S>(error: &Option<ImageRequestError>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    error
        .as_ref()
        .map(ImageRequestError::to_response)
        .serialize(serializer)
}
