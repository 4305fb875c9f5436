//! Session-scoped reconciliation state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Result, RoleSyncError};
use crate::rbac::{PermissionCatalog, PermissionKey, Role, RoleId};

/// Where a loaded dataset came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Fresh from the backend.
    Server,
    /// Static substitute (fallback roles, sample baseline).
    Fallback,
    /// The fetch failed and the previous dataset was kept.
    Retained,
}

/// Last server-confirmed (or substituted) grant set for one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Baseline {
    pub role_id: RoleId,
    pub keys: BTreeSet<PermissionKey>,
    pub source: DataSource,
    pub fetched_at: DateTime<Utc>,
}

impl Baseline {
    pub fn new(role_id: RoleId, keys: BTreeSet<PermissionKey>, source: DataSource) -> Self {
        Self {
            role_id,
            keys,
            source,
            fetched_at: Utc::now(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == DataSource::Fallback
    }
}

/// Everything the engine remembers between calls, for one session.
#[derive(Debug)]
pub(crate) struct SessionState {
    pub session_id: Uuid,
    pub catalog: Arc<PermissionCatalog>,
    pub roles: Vec<Role>,
    pub current_role: Option<RoleId>,
    /// Bumped whenever the current role changes; results fetched under an
    /// older generation are discarded.
    pub generation: u64,
    pub baseline: Option<Baseline>,
    pub working: BTreeSet<PermissionKey>,
}

impl SessionState {
    pub fn new(generation: u64) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            catalog: Arc::new(PermissionCatalog::new()),
            roles: Vec::new(),
            current_role: None,
            generation,
            baseline: None,
            working: BTreeSet::new(),
        }
    }

    /// Make `role_id` current, dropping the previous baseline and edits.
    pub fn switch_role(&mut self, role_id: RoleId) -> u64 {
        self.generation += 1;
        self.current_role = Some(role_id);
        self.baseline = None;
        self.working.clear();
        self.generation
    }

    /// Whether a result fetched for `role_id` under `generation` may be applied.
    pub fn accepts(&self, role_id: &RoleId, generation: u64) -> bool {
        self.generation == generation && self.current_role.as_ref() == Some(role_id)
    }

    /// Install a baseline and reset the working set to it.
    pub fn apply_baseline(&mut self, baseline: Baseline) {
        self.working = baseline.keys.clone();
        self.baseline = Some(baseline);
    }

    /// The current role, once its own baseline is installed.
    pub fn loaded_role(&self) -> Result<RoleId> {
        let role_id = self
            .current_role
            .clone()
            .ok_or_else(RoleSyncError::no_role_selected)?;
        match &self.baseline {
            Some(baseline) if baseline.role_id == role_id => Ok(role_id),
            _ => Err(RoleSyncError::baseline_not_loaded(role_id.as_str())),
        }
    }

    pub fn baseline_keys(&self) -> BTreeSet<PermissionKey> {
        self.baseline
            .as_ref()
            .map(|b| b.keys.clone())
            .unwrap_or_default()
    }

    pub fn role(&self, role_id: &RoleId) -> Option<&Role> {
        self.roles.iter().find(|r| &r.id == role_id)
    }
}
