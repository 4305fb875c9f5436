//! Error handling for the reconciliation engine.
//!
//! This module provides:
//! - A single error type with code, user message, internal message and source
//! - Machine-readable error codes grouped by category
//! - Severity-aware logging through `tracing`
//! - Error counters through `metrics`
//!
//! # Usage
//!
//! ```rust,ignore
//! use rolesync_core::error::{RoleSyncError, Result, ErrorContext};
//!
//! fn load() -> Result<()> {
//!     std::fs::read_to_string("roles.json")
//!         .context("Failed to read role snapshot")?;
//!     Ok(())
//! }
//! ```

use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

/// A specialized Result type for engine operations.
pub type Result<T> = std::result::Result<T, RoleSyncError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Transport Errors (1000-1099)
    TransportError,
    Timeout,
    HttpStatus,

    // Backend Errors (1100-1199)
    LogicalFailure,
    DeserializationError,
    SerializationError,

    // Synchronization Errors (1200-1299)
    ValidationGap,
    PartialFailure,
    SyncFailed,
    SyncInProgress,

    // Engine State Errors (1300-1399)
    NoRoleSelected,
    RoleNotFound,
    StaleResult,
    BaselineNotLoaded,

    // Configuration Errors (5000-5099)
    ConfigurationError,
    MissingConfiguration,
    InvalidConfiguration,

    // Internal Errors (9000-9099)
    InternalError,
}

impl ErrorCode {
    /// Get the numeric code for this error.
    pub const fn numeric_code(&self) -> u32 {
        match self {
            Self::TransportError => 1000,
            Self::Timeout => 1001,
            Self::HttpStatus => 1002,

            Self::LogicalFailure => 1100,
            Self::DeserializationError => 1101,
            Self::SerializationError => 1102,

            Self::ValidationGap => 1200,
            Self::PartialFailure => 1201,
            Self::SyncFailed => 1202,
            Self::SyncInProgress => 1203,

            Self::NoRoleSelected => 1300,
            Self::RoleNotFound => 1301,
            Self::StaleResult => 1302,
            Self::BaselineNotLoaded => 1303,

            Self::ConfigurationError => 5000,
            Self::MissingConfiguration => 5001,
            Self::InvalidConfiguration => 5002,

            Self::InternalError => 9000,
        }
    }

    /// Whether retrying the same call may succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransportError | Self::Timeout | Self::HttpStatus | Self::SyncInProgress
        )
    }

    /// Get the category name for this error.
    pub const fn category(&self) -> &'static str {
        match self {
            Self::TransportError | Self::Timeout | Self::HttpStatus => "transport",
            Self::LogicalFailure | Self::DeserializationError | Self::SerializationError => {
                "backend"
            }
            Self::ValidationGap | Self::PartialFailure | Self::SyncFailed | Self::SyncInProgress => {
                "sync"
            }
            Self::NoRoleSelected
            | Self::RoleNotFound
            | Self::StaleResult
            | Self::BaselineNotLoaded => "engine",
            Self::ConfigurationError | Self::MissingConfiguration | Self::InvalidConfiguration => {
                "config"
            }
            Self::InternalError => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Severity
// ═══════════════════════════════════════════════════════════════════════════════

/// Severity level for errors (affects logging).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Expected conditions (gaps, busy saves, stale results)
    Low,
    /// Degraded operation (transport failures that trigger fallbacks)
    Medium,
    /// Failed writes and malformed backend data
    High,
    /// Broken configuration or internal bugs
    Critical,
}

impl ErrorSeverity {
    /// Get severity based on error code.
    pub const fn from_code(code: &ErrorCode) -> Self {
        match code {
            ErrorCode::ValidationGap
            | ErrorCode::SyncInProgress
            | ErrorCode::StaleResult
            | ErrorCode::NoRoleSelected
            | ErrorCode::RoleNotFound
            | ErrorCode::BaselineNotLoaded => Self::Low,

            ErrorCode::TransportError
            | ErrorCode::Timeout
            | ErrorCode::HttpStatus
            | ErrorCode::LogicalFailure => Self::Medium,

            ErrorCode::PartialFailure
            | ErrorCode::SyncFailed
            | ErrorCode::DeserializationError
            | ErrorCode::SerializationError => Self::High,

            ErrorCode::ConfigurationError
            | ErrorCode::MissingConfiguration
            | ErrorCode::InvalidConfiguration
            | ErrorCode::InternalError => Self::Critical,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Details
// ═══════════════════════════════════════════════════════════════════════════════

/// Additional structured details about an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Additional context key-value pairs
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,

    /// Related entity ID (role, permission key)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,

    /// Related entity type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    /// Retry information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,

    /// Suggested action for resolution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

impl ErrorDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after_secs = Some(seconds);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggested_action = Some(suggestion.into());
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The main error type for the engine.
#[derive(Error, Debug)]
pub struct RoleSyncError {
    /// Machine-readable error code
    code: ErrorCode,

    /// User-friendly error message
    user_message: Cow<'static, str>,

    /// Detailed internal message (for logging only)
    internal_message: Option<String>,

    /// Additional structured details
    details: ErrorDetails,

    /// The source error that caused this error
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for RoleSyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.user_message)?;
        if let Some(ref internal) = self.internal_message {
            write!(f, " (internal: {})", internal)?;
        }
        Ok(())
    }
}

impl RoleSyncError {
    // ─────────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new error with code and user message.
    pub fn new(code: ErrorCode, user_message: impl Into<Cow<'static, str>>) -> Self {
        let error = Self {
            code,
            user_message: user_message.into(),
            internal_message: None,
            details: ErrorDetails::default(),
            source: None,
        };
        error.record_metrics();
        error
    }

    /// Create an error with both user and internal messages.
    pub fn with_internal(
        code: ErrorCode,
        user_message: impl Into<Cow<'static, str>>,
        internal_message: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(code, user_message);
        error.internal_message = Some(internal_message.into());
        error
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_internal(ErrorCode::InternalError, "An internal error occurred", message)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder Methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Add error details.
    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = details;
        self
    }

    /// Add context to details.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.details.context.insert(key.into(), v);
        }
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    pub fn internal_message(&self) -> Option<&str> {
        self.internal_message.as_deref()
    }

    pub fn details(&self) -> &ErrorDetails {
        &self.details
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code)
    }

    /// True for failures that happened below the envelope (network, timeout, HTTP status).
    pub fn is_transport(&self) -> bool {
        self.code.category() == "transport"
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Logging
    // ─────────────────────────────────────────────────────────────────────────

    /// Log this error with appropriate severity.
    pub fn log(&self) {
        let code = self.code.to_string();
        let category = self.code.category();

        match self.severity() {
            ErrorSeverity::Critical => {
                error!(
                    error_code = %code,
                    category = category,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    details = ?self.details,
                    source = ?self.source,
                    "CRITICAL ERROR"
                );
            }
            ErrorSeverity::High => {
                error!(
                    error_code = %code,
                    category = category,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    "High severity error"
                );
            }
            ErrorSeverity::Medium => {
                warn!(
                    error_code = %code,
                    category = category,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    "Medium severity error"
                );
            }
            ErrorSeverity::Low => {
                tracing::debug!(
                    error_code = %code,
                    category = category,
                    user_message = %self.user_message,
                    "Low severity error"
                );
            }
        }
    }

    fn record_metrics(&self) {
        counter!(
            "rolesync_errors_total",
            "code" => self.code.to_string(),
            "category" => self.code.category().to_string(),
            "retryable" => self.is_retryable().to_string(),
        )
        .increment(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Context Extension Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Add context to an error.
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with error code.
    fn with_error_code(self, code: ErrorCode) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| RoleSyncError::internal(message.into()).with_source(e))
    }

    fn with_error_code(self, code: ErrorCode) -> Result<T> {
        self.map_err(|e| RoleSyncError::new(code, e.to_string()).with_source(e))
    }
}

impl<T> ErrorContext<T> for Option<T> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| RoleSyncError::internal(message.into()))
    }

    fn with_error_code(self, code: ErrorCode) -> Result<T> {
        self.ok_or_else(|| RoleSyncError::new(code, "Value not present"))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// From Implementations
// ═══════════════════════════════════════════════════════════════════════════════

impl From<reqwest::Error> for RoleSyncError {
    fn from(error: reqwest::Error) -> Self {
        let (code, user_msg) = if error.is_timeout() {
            (ErrorCode::Timeout, "Backend request timed out")
        } else if error.is_connect() {
            (ErrorCode::TransportError, "Failed to connect to backend")
        } else if error.is_status() {
            (ErrorCode::HttpStatus, "Backend returned an error status")
        } else if error.is_decode() {
            (ErrorCode::DeserializationError, "Backend response could not be decoded")
        } else {
            (ErrorCode::TransportError, "Network error occurred")
        };

        Self::with_internal(code, user_msg, error.to_string()).with_source(error)
    }
}

impl From<serde_json::Error> for RoleSyncError {
    fn from(error: serde_json::Error) -> Self {
        let code = if error.is_syntax() || error.is_data() || error.is_eof() {
            ErrorCode::DeserializationError
        } else {
            ErrorCode::SerializationError
        };

        Self::with_internal(code, "Failed to process JSON data", error.to_string())
            .with_source(error)
    }
}

impl From<tokio::time::error::Elapsed> for RoleSyncError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        Self::with_internal(ErrorCode::Timeout, "Operation timed out", error.to_string())
            .with_source(error)
    }
}

impl From<anyhow::Error> for RoleSyncError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<RoleSyncError>() {
            Ok(inner) => inner,
            Err(error) => Self::internal(error.to_string()),
        }
    }
}

impl From<config::ConfigError> for RoleSyncError {
    fn from(error: config::ConfigError) -> Self {
        let (code, user_msg) = match &error {
            config::ConfigError::NotFound(_) => (
                ErrorCode::MissingConfiguration,
                "Required configuration not found",
            ),
            config::ConfigError::PathParse(_) | config::ConfigError::FileParse { .. } => (
                ErrorCode::InvalidConfiguration,
                "Configuration file is invalid",
            ),
            _ => (ErrorCode::ConfigurationError, "Configuration error occurred"),
        };

        Self::with_internal(code, user_msg, error.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Convenience Constructors for Domain Errors
// ═══════════════════════════════════════════════════════════════════════════════

impl RoleSyncError {
    /// The backend answered with `success: false`.
    pub fn logical_failure(operation: impl Into<String>, message: Option<String>) -> Self {
        let operation = operation.into();
        let error = Self::new(
            ErrorCode::LogicalFailure,
            format!("Backend reported failure for {}", operation),
        )
        .with_context("operation", &operation);
        match message {
            Some(msg) => Self {
                internal_message: Some(msg),
                ..error
            },
            None => error,
        }
    }

    /// Non-2xx HTTP status from the backend.
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::with_internal(
            ErrorCode::HttpStatus,
            format!("Backend returned HTTP {}", status),
            body.into(),
        )
        .with_context("status", status)
    }

    /// A permission key that has no id in the catalog.
    pub fn validation_gap(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(
            ErrorCode::ValidationGap,
            format!("No permission id for key: {}", key),
        )
        .with_details(ErrorDetails::new().with_entity("permission", &key))
    }

    /// Every add request shape was rejected.
    pub fn sync_failed(role_id: impl Into<String>, attempts: usize) -> Self {
        let role_id = role_id.into();
        Self::new(
            ErrorCode::SyncFailed,
            format!(
                "Adding permissions to role {} failed after {} attempts",
                role_id, attempts
            ),
        )
        .with_details(ErrorDetails::new().with_entity("role", &role_id))
        .with_context("attempts", attempts)
    }

    /// Added permissions were stored but removals were rejected.
    pub fn partial_failure(role_id: impl Into<String>) -> Self {
        let role_id = role_id.into();
        Self::new(
            ErrorCode::PartialFailure,
            format!(
                "Permissions were added to role {} but removals were rejected",
                role_id
            ),
        )
        .with_details(
            ErrorDetails::new()
                .with_entity("role", &role_id)
                .with_suggestion("Review the role and retry the removal"),
        )
    }

    /// A save is already running for this role.
    pub fn sync_in_progress(role_id: impl Into<String>) -> Self {
        let role_id = role_id.into();
        Self::new(
            ErrorCode::SyncInProgress,
            format!("A save is already in progress for role {}", role_id),
        )
        .with_details(ErrorDetails::new().with_entity("role", &role_id).with_retry_after(1))
    }

    /// No current role to operate on.
    pub fn no_role_selected() -> Self {
        Self::new(ErrorCode::NoRoleSelected, "No role is currently selected")
    }

    /// The current role's grants have not been loaded yet.
    pub fn baseline_not_loaded(role_id: impl Into<String>) -> Self {
        let role_id = role_id.into();
        Self::new(
            ErrorCode::BaselineNotLoaded,
            format!("Grants of role {} are not loaded", role_id),
        )
        .with_details(
            ErrorDetails::new()
                .with_entity("role", &role_id)
                .with_suggestion("Select the role again once its grants load"),
        )
    }

    /// Result arrived for a role that is no longer selected.
    pub fn stale_result(role_id: impl Into<String>) -> Self {
        let role_id = role_id.into();
        Self::new(
            ErrorCode::StaleResult,
            format!("Discarded result for role {} that is no longer selected", role_id),
        )
        .with_details(ErrorDetails::new().with_entity("role", &role_id))
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfiguration, message.into())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_is_retryable() {
        assert!(ErrorCode::TransportError.is_retryable());
        assert!(ErrorCode::Timeout.is_retryable());
        assert!(!ErrorCode::LogicalFailure.is_retryable());
        assert!(!ErrorCode::ValidationGap.is_retryable());
    }

    #[test]
    fn test_error_code_categories() {
        assert_eq!(ErrorCode::Timeout.category(), "transport");
        assert_eq!(ErrorCode::LogicalFailure.category(), "backend");
        assert_eq!(ErrorCode::PartialFailure.category(), "sync");
        assert_eq!(ErrorCode::StaleResult.category(), "engine");
    }

    #[test]
    fn test_partial_failure_distinct_from_sync_failed() {
        let partial = RoleSyncError::partial_failure("7");
        let fatal = RoleSyncError::sync_failed("7", 5);
        assert_ne!(partial.code(), fatal.code());
        assert_eq!(partial.details().entity_id.as_deref(), Some("7"));
        assert_eq!(fatal.details().context.get("attempts"), Some(&serde_json::json!(5)));
    }

    #[test]
    fn test_logical_failure_keeps_backend_message() {
        let error = RoleSyncError::logical_failure("add permissions", Some("bad ids".into()));
        assert_eq!(error.code(), ErrorCode::LogicalFailure);
        assert_eq!(error.internal_message(), Some("bad ids"));
        assert!(!error.is_transport());
    }

    #[test]
    fn test_error_details_builder() {
        let details = ErrorDetails::new()
            .with_entity("role", "3")
            .with_retry_after(30)
            .with_suggestion("Try again later")
            .with_context("extra", "info");

        assert_eq!(details.entity_type, Some("role".to_string()));
        assert_eq!(details.entity_id, Some("3".to_string()));
        assert_eq!(details.retry_after_secs, Some(30));
        assert!(details.suggested_action.is_some());
        assert!(details.context.contains_key("extra"));
    }

    #[test]
    fn test_error_severity() {
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::ValidationGap),
            ErrorSeverity::Low
        );
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::TransportError),
            ErrorSeverity::Medium
        );
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::PartialFailure),
            ErrorSeverity::High
        );
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::InvalidConfiguration),
            ErrorSeverity::Critical
        );
    }

    #[test]
    fn test_error_display() {
        let error = RoleSyncError::with_internal(
            ErrorCode::TransportError,
            "Failed to connect to backend",
            "Connection refused: localhost:8080",
        );

        let display = format!("{}", error);
        assert!(display.contains("TransportError"));
        assert!(display.contains("Failed to connect to backend"));
        assert!(display.contains("Connection refused"));
    }

    #[test]
    fn test_option_context() {
        let missing: Option<u32> = None;
        let err = missing.with_error_code(ErrorCode::RoleNotFound).unwrap_err();
        assert_eq!(err.code(), ErrorCode::RoleNotFound);
    }
}
