//! Cloud API error classification
//!
//! Provider errors arrive as `(code, message)` pairs. They are classified
//! through code tables so retry and cleanup logic can branch on a kind
//! instead of string matching at every call site.

use std::fmt;
use thiserror::Error;

/// Classification of a failed cloud call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloudErrorKind {
    /// Rate limit exceeded (retryable with backoff)
    Throttling,
    /// Resource does not exist (idempotent success on delete)
    NotFound,
    /// Resource is in use or exists in a conflicting state
    Conflict,
    /// Credentials missing, expired or lacking permission
    AuthFailure,
    /// Temporary provider-side failure (retryable)
    Transient,
    /// Anything else
    Fatal,
}

impl fmt::Display for CloudErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CloudErrorKind::Throttling => "throttling",
            CloudErrorKind::NotFound => "not-found",
            CloudErrorKind::Conflict => "conflict",
            CloudErrorKind::AuthFailure => "auth-failure",
            CloudErrorKind::Transient => "transient",
            CloudErrorKind::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

/// A classified error returned by the cloud collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cloud API {kind} error{}: {message}", code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
pub struct CloudApiError {
    pub kind: CloudErrorKind,
    pub code: Option<String>,
    pub message: String,
}

impl CloudApiError {
    pub fn new(kind: CloudErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(CloudErrorKind::NotFound, message)
    }

    pub fn throttled(message: impl Into<String>) -> Self {
        Self::new(CloudErrorKind::Throttling, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(CloudErrorKind::Transient, message)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(CloudErrorKind::Fatal, message)
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        self.kind == CloudErrorKind::NotFound
    }

    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            CloudErrorKind::Throttling | CloudErrorKind::Transient
        )
    }

    /// Get a user-friendly suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<String> {
        if let Some(s) = self.code.as_deref().and_then(suggestion_for_code) {
            return Some(s);
        }
        let generic = match self.kind {
            CloudErrorKind::Throttling => "API rate limit hit. Retry later or lower the worker count.",
            CloudErrorKind::NotFound => "The resource no longer exists. Run `validate` to reconcile the registry.",
            CloudErrorKind::Conflict => "Another resource still uses this one. Delete dependents first.",
            CloudErrorKind::AuthFailure => "Check the credentials and permissions for this account.",
            CloudErrorKind::Transient => "Temporary provider failure. Retry the operation.",
            CloudErrorKind::Fatal => return None,
        };
        Some(generic.to_string())
    }
}

/// Known provider error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &[
    "ResourceNotFound",
    "ResourceNotFoundException",
    "NoSuchEntity",
    "NoSuchDistribution",
    "LoadBalancerNotFound",
    "FileSystemNotFound",
    "InvalidGroup.NotFound",
    "InvalidVpcID.NotFound",
    "ServiceNotFoundException",
];

/// Known provider error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "TooManyRequestsException",
];

/// Known provider error codes for resources still in use
const CONFLICT_CODES: &[&str] = &[
    "DependencyViolation",
    "ResourceInUse",
    "ResourceInUseException",
    "DistributionNotDisabled",
    "FileSystemInUse",
    "AlreadyExists",
];

/// Known provider error codes for credential problems
const AUTH_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "UnauthorizedOperation",
    "ExpiredToken",
    "InvalidClientTokenId",
];

/// Known provider error codes for temporary service failures
const TRANSIENT_CODES: &[&str] = &[
    "InternalError",
    "InternalFailure",
    "ServiceUnavailable",
    "RequestTimeout",
];

/// Classify a provider error using its error code.
pub fn classify_cloud_error(code: Option<&str>, message: Option<&str>) -> CloudApiError {
    let message = message.unwrap_or("Unknown error").to_string();

    let kind = match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => CloudErrorKind::NotFound,
        Some(c) if THROTTLING_CODES.contains(&c) => CloudErrorKind::Throttling,
        Some(c) if CONFLICT_CODES.contains(&c) => CloudErrorKind::Conflict,
        Some(c) if AUTH_CODES.contains(&c) => CloudErrorKind::AuthFailure,
        Some(c) if TRANSIENT_CODES.contains(&c) => CloudErrorKind::Transient,
        Some(c) if c.ends_with(".NotFound") => CloudErrorKind::NotFound,
        _ => CloudErrorKind::Fatal,
    };

    CloudApiError {
        kind,
        code: code.map(|s| s.to_string()),
        message,
    }
}

/// Error code to user-friendly suggestion mapping
const SUGGESTIONS: &[(&str, &str)] = &[
    (
        "DistributionNotDisabled",
        "Disable the CDN distribution and wait for it to deploy before deleting.",
    ),
    (
        "DependencyViolation",
        "The resource still has attached dependents. Clean up in dependency order.",
    ),
    (
        "ExpiredToken",
        "The session token expired. Refresh credentials and retry.",
    ),
    (
        "RequestLimitExceeded",
        "API rate limit hit. The operation will be retried automatically.",
    ),
    (
        "ThrottlingException",
        "API rate limit hit. The operation will be retried automatically.",
    ),
];

/// Get a user-friendly suggestion for a known error code.
fn suggestion_for_code(code: &str) -> Option<String> {
    SUGGESTIONS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, s)| (*s).to_string())
}
