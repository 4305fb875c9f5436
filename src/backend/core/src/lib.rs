#![allow(clippy::result_large_err)]
//! # RoleSync Core
//!
//! Role-permission reconciliation engine with backend synchronization.
//!
//! ## Architecture
//!
//! - **RBAC**: Normalized permission keys, the permission catalog, fallback roles and diffing
//! - **Access Guard**: Per-navigation identity and role checks with redirect decisions
//! - **Client**: Pluggable role backends (HTTP via `reqwest`, in-memory)
//! - **Sync**: Add/remove phases driven by ordered request-shape fallbacks
//! - **Engine**: Session state, stale-result rejection and per-role save exclusion
//! - **Telemetry**: Structured logging with redaction and reconciliation metrics

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod rbac;
pub mod sync;
pub mod telemetry;

pub use error::{ErrorCode, ErrorContext, ErrorDetails, ErrorSeverity, Result, RoleSyncError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::client::{Envelope, HttpBackend, InMemoryBackend, RoleBackend};
    pub use crate::config::{BackendConfig, Config, EngineConfig, GuardConfig};
    pub use crate::engine::{Baseline, DataSource, EditOutcome, PermissionEngine};
    pub use crate::error::{
        ErrorCode, ErrorContext, ErrorDetails, ErrorSeverity, Result, RoleSyncError,
    };
    pub use crate::rbac::{
        diff, normalize_action, normalize_resource, AccessGuard, FallbackRole, GuardDecision,
        Identity, IdentityProvider, Permission, PermissionCatalog, PermissionDiff, PermissionId,
        PermissionKey, Role, RoleId, RouteRule, SharedIdentity, StaticIdentity,
    };
    pub use crate::sync::{PhaseOutcome, SaveReport, SaveStatus};
    pub use crate::telemetry::{init_telemetry, LogFormat, LoggingConfig};
}
