// Constants module - centralized default values for configuration
//
// Defaults used when a configuration source leaves an option unset.

// =============================================================================
// Response defaults
// =============================================================================

/// Cache-Control directive for successfully resolved requests
pub const DEFAULT_CACHE_CONTROL: &str = "max-age=31536000,public";

/// Cache-Control directive for fallback responses, so transient failures
/// are not pinned in downstream caches
pub const DEFAULT_FALLBACK_CACHE_CONTROL: &str = "no-store";

/// Status code for a normally resolved request
pub const STATUS_OK: u16 = 200;

// =============================================================================
// Security defaults
// =============================================================================

/// Default bound on the secret-store lookup in milliseconds
pub const DEFAULT_SECRET_TIMEOUT_MS: u64 = 3000;

/// Query parameter carrying the request signature
pub const SIGNATURE_PARAM: &str = "signature";

/// Query parameter carrying the request expiry timestamp
pub const EXPIRES_PARAM: &str = "expires";

// =============================================================================
// Content negotiation
// =============================================================================

/// Accept-header media type that enables automatic WebP output
pub const WEBP_MEDIA_TYPE: &str = "image/webp";

// =============================================================================
// Logging defaults
// =============================================================================

/// Default tracing filter level
pub const DEFAULT_LOG_LEVEL: &str = "info";
