//! Role-based access primitives.
//!
//! This module provides:
//! - **Normalization**: canonical resource/action spelling
//! - **Models**: permission keys, permissions, roles and raw wire records
//! - **Catalog**: the de-duplicated, ordered list of grantable permissions
//! - **Fallback roles**: a static directory and sample baselines for offline use
//! - **Diff**: baseline → working-set delta
//! - **Access guard**: per-navigation identity and role checks
//!
//! # Usage
//!
//! ```rust
//! use std::collections::BTreeSet;
//! use rolesync_core::rbac::{diff, PermissionKey};
//!
//! let baseline: BTreeSet<_> = [PermissionKey::new("orders", "view")].into();
//! let working: BTreeSet<_> = [PermissionKey::new("Order", "add")].into();
//!
//! let delta = diff(&baseline, &working);
//! assert_eq!(delta.added.iter().next().unwrap().as_str(), "orders:create");
//! assert_eq!(delta.removed.iter().next().unwrap().as_str(), "orders:view");
//! ```

pub mod catalog;
pub mod diff;
pub mod guard;
pub mod models;
pub mod normalize;
pub mod roles;

pub use catalog::{PermissionCatalog, ResourceGroup};
pub use diff::{diff, PermissionDiff};
pub use guard::{
    AccessGuard, GuardDecision, Identity, IdentityProvider, NavigationState, RouteRule,
    SharedIdentity, StaticIdentity,
};
pub use models::{
    Permission, PermissionId, PermissionKey, RawGrant, RawGrantRef, RawPermission, RawRole,
    RawRoleDetail, Role, RoleId,
};
pub use normalize::{normalize_action, normalize_resource};
pub use roles::{sample_baseline, FallbackRole};
