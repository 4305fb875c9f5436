//! Named request shapes for the add and remove phases.
//!
//! Each phase owns an ordered list of shapes. The protocol walks the list
//! and sends each shape's body until one is accepted.

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;

use crate::client::{Envelope, RoleBackend};
use crate::error::Result;
use crate::rbac::{PermissionId, PermissionKey, RoleId};

/// Which half of a save an attempt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Add,
    Remove,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One way of phrasing a phase's request.
pub trait RequestShape: Copy + fmt::Debug + Send + Sync + 'static {
    const PHASE: SyncPhase;

    /// Every shape of this phase, in the order they are tried.
    fn ordered() -> &'static [Self];

    /// Stable name used in logs, metrics and reports.
    fn name(&self) -> &'static str;

    /// Request body, or `None` when this shape has nothing to carry.
    fn body(&self, ids: &[PermissionId], keys: &[PermissionKey]) -> Option<Value>;

    /// Send `body` through the backend endpoint this shape targets.
    fn send<'a>(
        &self,
        backend: &'a dyn RoleBackend,
        role_id: &'a RoleId,
        body: Value,
    ) -> BoxFuture<'a, Result<Envelope<Value>>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Add
// ═══════════════════════════════════════════════════════════════════════════════

/// Add-phase bodies, most to least preferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddShape {
    /// `{"permissionIds": [ids]}`
    PermissionIdsObject,
    /// `[ids]`
    IdArray,
    /// `{"permissions": [ids]}`
    PermissionsIdsObject,
    /// `{"permissions": ["res:act"]}`
    PermissionsKeysObject,
    /// `["res:act"]`
    KeyArray,
}

impl AddShape {
    fn uses_ids(&self) -> bool {
        matches!(
            self,
            Self::PermissionIdsObject | Self::IdArray | Self::PermissionsIdsObject
        )
    }
}

impl RequestShape for AddShape {
    const PHASE: SyncPhase = SyncPhase::Add;

    fn ordered() -> &'static [Self] {
        &[
            Self::PermissionIdsObject,
            Self::IdArray,
            Self::PermissionsIdsObject,
            Self::PermissionsKeysObject,
            Self::KeyArray,
        ]
    }

    fn name(&self) -> &'static str {
        match self {
            Self::PermissionIdsObject => "permission_ids_object",
            Self::IdArray => "id_array",
            Self::PermissionsIdsObject => "permissions_ids_object",
            Self::PermissionsKeysObject => "permissions_keys_object",
            Self::KeyArray => "key_array",
        }
    }

    fn body(&self, ids: &[PermissionId], keys: &[PermissionKey]) -> Option<Value> {
        if self.uses_ids() && ids.is_empty() {
            return None;
        }
        if !self.uses_ids() && keys.is_empty() {
            return None;
        }
        Some(match self {
            Self::PermissionIdsObject => json!({ "permissionIds": ids }),
            Self::IdArray => json!(ids),
            Self::PermissionsIdsObject => json!({ "permissions": ids }),
            Self::PermissionsKeysObject => json!({ "permissions": keys }),
            Self::KeyArray => json!(keys),
        })
    }

    fn send<'a>(
        &self,
        backend: &'a dyn RoleBackend,
        role_id: &'a RoleId,
        body: Value,
    ) -> BoxFuture<'a, Result<Envelope<Value>>> {
        backend.add_permissions(role_id, body)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Remove
// ═══════════════════════════════════════════════════════════════════════════════

/// Remove-phase requests, most to least preferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoveShape {
    /// `DELETE` with `{"data": {"permissionIds": [ids]}}`
    DeleteDataEnvelope,
    /// `POST` with `{"permissionIds": [ids]}`
    PostPermissionIds,
}

impl RequestShape for RemoveShape {
    const PHASE: SyncPhase = SyncPhase::Remove;

    fn ordered() -> &'static [Self] {
        &[Self::DeleteDataEnvelope, Self::PostPermissionIds]
    }

    fn name(&self) -> &'static str {
        match self {
            Self::DeleteDataEnvelope => "delete_data_envelope",
            Self::PostPermissionIds => "post_permission_ids",
        }
    }

    fn body(&self, ids: &[PermissionId], _keys: &[PermissionKey]) -> Option<Value> {
        if ids.is_empty() {
            return None;
        }
        Some(match self {
            Self::DeleteDataEnvelope => json!({ "data": { "permissionIds": ids } }),
            Self::PostPermissionIds => json!({ "permissionIds": ids }),
        })
    }

    fn send<'a>(
        &self,
        backend: &'a dyn RoleBackend,
        role_id: &'a RoleId,
        body: Value,
    ) -> BoxFuture<'a, Result<Envelope<Value>>> {
        match self {
            Self::DeleteDataEnvelope => backend.remove_permissions(role_id, body),
            Self::PostPermissionIds => backend.remove_permissions_post(role_id, body),
        }
    }
}
