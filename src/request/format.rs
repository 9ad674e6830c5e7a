//! Output format negotiation
//!
//! Precedence, highest first:
//! 1. an explicit format edit (or the Default request `outputFormat`)
//! 2. WebP, when auto-WebP is enabled and `Accept` mentions `image/webp`
//! 3. the source object's own format, decided after fetching it

use crate::constants::WEBP_MEDIA_TYPE;
use crate::edits::{Edits, OutputFormat};

/// Where the output format came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputDecision {
    Explicit(OutputFormat),
    Negotiated(OutputFormat),
    /// Keep whatever format the source object has
    PreserveOriginal,
}

impl OutputDecision {
    pub fn format(&self) -> Option<OutputFormat> {
        match self {
            OutputDecision::Explicit(f) | OutputDecision::Negotiated(f) => Some(*f),
            OutputDecision::PreserveOriginal => None,
        }
    }

    pub fn content_type(&self) -> Option<&'static str> {
        self.format().map(|f| f.content_type())
    }
}

/// Pick the output format; never fails
pub fn resolve(
    edits: &Edits,
    requested: Option<OutputFormat>,
    accept: Option<&str>,
    auto_webp: bool,
) -> OutputDecision {
    if let Some(format) = edits.explicit_format().or(requested) {
        return OutputDecision::Explicit(format);
    }
    if auto_webp && accept.is_some_and(|a| a.contains(WEBP_MEDIA_TYPE)) {
        return OutputDecision::Negotiated(OutputFormat::WebP);
    }
    OutputDecision::PreserveOriginal
}
