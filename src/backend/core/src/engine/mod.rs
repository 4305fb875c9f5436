//! The reconciliation engine.
//!
//! [`PermissionEngine`] owns one session's state (catalog, role directory,
//! current role, baseline and working set) and exposes synchronous queries
//! plus asynchronous commands returning structured results.
//!
//! # Lifecycle
//!
//! ```text
//! load_catalog ─┐
//!               ├─> select_role ─> grant/revoke ... ─> save ─> (baseline re-fetched)
//! load_roles ───┘        ^                                        │
//!                        └──────────── switch role ───────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rolesync_core::prelude::*;
//!
//! # async fn run() -> rolesync_core::error::Result<()> {
//! let config = Config::for_backend("http://localhost:8080/api");
//! let engine = PermissionEngine::from_config(&config)?;
//!
//! engine.bootstrap().await;
//! engine.grant([PermissionKey::new("orders", "create")])?;
//! let report = engine.save().await?;
//! println!("{}", report.status());
//! # Ok(())
//! # }
//! ```

pub mod state;

pub use state::{Baseline, DataSource};

use dashmap::DashSet;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::client::{HttpBackend, RoleBackend};
use crate::config::{Config, EngineConfig};
use crate::error::{ErrorCode, ErrorDetails, Result, RoleSyncError};
use crate::rbac::{
    diff, normalize_resource, sample_baseline, FallbackRole, PermissionCatalog, PermissionDiff,
    PermissionKey, Role, RoleId,
};
use crate::sync::{SaveReport, SyncProtocol};
use crate::telemetry::SyncMetrics;
use state::SessionState;

/// Keys changed by a working-set edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EditOutcome {
    /// Keys whose membership actually changed.
    pub applied: Vec<PermissionKey>,
    /// Keys refused because the catalog does not know them.
    pub rejected: Vec<PermissionKey>,
}

impl EditOutcome {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Marks a role as having a write in flight until dropped.
struct InFlightGuard<'a> {
    set: &'a DashSet<RoleId>,
    role_id: RoleId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.role_id);
    }
}

/// Session-scoped role/permission reconciliation engine.
pub struct PermissionEngine {
    backend: Arc<dyn RoleBackend>,
    config: EngineConfig,
    state: RwLock<SessionState>,
    in_flight: DashSet<RoleId>,
}

impl PermissionEngine {
    pub fn new(backend: Arc<dyn RoleBackend>, config: EngineConfig) -> Self {
        let state = SessionState::new(0);
        info!(session_id = %state.session_id, "Permission engine session started");
        Self {
            backend,
            config,
            state: RwLock::new(state),
            in_flight: DashSet::new(),
        }
    }

    /// Build an engine talking HTTP to the configured backend.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let backend = HttpBackend::new(&config.backend)?;
        Ok(Self::new(Arc::new(backend), config.engine.clone()))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Loading
    // ─────────────────────────────────────────────────────────────────────────

    /// Load catalog and role directory concurrently.
    pub async fn bootstrap(&self) -> (DataSource, DataSource) {
        futures::join!(self.load_catalog(), self.load_roles())
    }

    /// Fetch the permission catalog.
    ///
    /// On failure the previously loaded catalog stays in place.
    #[instrument(skip_all)]
    pub async fn load_catalog(&self) -> DataSource {
        let session = self.session_id();
        let fetched = self
            .backend
            .list_permissions()
            .await
            .and_then(|envelope| envelope.into_data("list permissions"));

        match fetched {
            Ok(records) => {
                let catalog = PermissionCatalog::from_raw(records);
                let mut state = self.state.write();
                if state.session_id != session {
                    debug!("Discarding catalog fetched for an ended session");
                    return DataSource::Retained;
                }
                info!(permissions = catalog.len(), "Permission catalog loaded");
                state.catalog = Arc::new(catalog);
                DataSource::Server
            }
            Err(error) => {
                error.log();
                SyncMetrics::record_fallback("catalog");
                warn!("Keeping previously loaded permission catalog");
                DataSource::Retained
            }
        }
    }

    /// Fetch the role directory, substituting the static fallback roles when
    /// the backend fails or returns nothing.
    ///
    /// Selects the first role when none is current and auto-selection is on.
    #[instrument(skip_all)]
    pub async fn load_roles(&self) -> DataSource {
        let session = self.session_id();
        let fetched = self
            .backend
            .list_roles()
            .await
            .and_then(|envelope| envelope.into_data("list roles"));

        let (roles, source) = match fetched {
            Ok(raw) if !raw.is_empty() => {
                let roles: Vec<Role> = raw.into_iter().map(Role::from).collect();
                (Some(roles), DataSource::Server)
            }
            Ok(_) => {
                warn!("Backend returned an empty role list");
                self.fallback_roles()
            }
            Err(error) => {
                error.log();
                self.fallback_roles()
            }
        };

        let first = {
            let mut state = self.state.write();
            if state.session_id != session {
                debug!("Discarding roles fetched for an ended session");
                return DataSource::Retained;
            }
            if let Some(roles) = roles {
                info!(roles = roles.len(), source = ?source, "Role directory loaded");
                state.roles = roles;
            }
            if self.config.auto_select_first_role && state.current_role.is_none() {
                state.roles.first().map(|r| r.id.clone())
            } else {
                None
            }
        };

        if let Some(role_id) = first {
            if let Err(error) = self.select_role(&role_id).await {
                error.log();
            }
        }
        source
    }

    fn fallback_roles(&self) -> (Option<Vec<Role>>, DataSource) {
        if !self.config.fallback_enabled {
            warn!("Role fallback disabled; keeping previous role directory");
            return (None, DataSource::Retained);
        }
        SyncMetrics::record_fallback("roles");
        warn!("Using static fallback role directory");
        (Some(FallbackRole::directory()), DataSource::Fallback)
    }

    /// Make `role_id` current and load its baseline.
    ///
    /// Discards the previous role's working set. Fails with `StaleResult`
    /// if another role is selected before the baseline arrives.
    #[instrument(skip_all, fields(role_id = %role_id))]
    pub async fn select_role(&self, role_id: &RoleId) -> Result<Baseline> {
        let generation = {
            let mut state = self.state.write();
            if !state.roles.is_empty() && state.role(role_id).is_none() {
                return Err(RoleSyncError::new(
                    ErrorCode::RoleNotFound,
                    format!("Role {} not found", role_id),
                )
                .with_details(ErrorDetails::new().with_entity("role", role_id.as_str())));
            }
            state.switch_role(role_id.clone())
        };
        info!(generation, "Role selected");
        self.load_baseline(role_id.clone(), generation).await
    }

    /// Re-fetch the current role's baseline, replacing unsaved edits.
    pub async fn refresh_baseline(&self) -> Result<Baseline> {
        let (role_id, generation) = self.current_target()?;
        self.load_baseline(role_id, generation).await
    }

    fn current_target(&self) -> Result<(RoleId, u64)> {
        let state = self.state.read();
        let role_id = state
            .current_role
            .clone()
            .ok_or_else(RoleSyncError::no_role_selected)?;
        Ok((role_id, state.generation))
    }

    /// Fetch a baseline and apply it if `role_id` is still current at
    /// `generation`.
    async fn load_baseline(&self, role_id: RoleId, generation: u64) -> Result<Baseline> {
        let baseline = self.fetch_baseline(&role_id).await?;

        let mut state = self.state.write();
        if !state.accepts(&role_id, generation) {
            debug!(
                role_id = %role_id,
                generation,
                current_generation = state.generation,
                "Discarding stale baseline"
            );
            return Err(RoleSyncError::stale_result(role_id.as_str()));
        }
        debug!(role_id = %role_id, keys = baseline.keys.len(), source = ?baseline.source, "Baseline applied");
        state.apply_baseline(baseline.clone());
        Ok(baseline)
    }

    async fn fetch_baseline(&self, role_id: &RoleId) -> Result<Baseline> {
        let fetched = self
            .backend
            .role_detail(role_id)
            .await
            .and_then(|envelope| envelope.into_data("role detail"));

        match fetched {
            Ok(detail) => {
                let mut keys = BTreeSet::new();
                for grant in &detail.permissions {
                    match grant.key() {
                        Some(key) => {
                            keys.insert(key);
                        }
                        None => warn!(role_id = %role_id, "Skipping grant without resource or action"),
                    }
                }
                Ok(Baseline::new(role_id.clone(), keys, DataSource::Server))
            }
            Err(error) => {
                error.log();
                if !self.config.fallback_enabled {
                    return Err(error);
                }
                let code = self
                    .state
                    .read()
                    .role(role_id)
                    .map(|r| r.code.clone())
                    .unwrap_or_default();
                SyncMetrics::record_fallback("baseline");
                warn!(role_id = %role_id, code = %code, "Using sample baseline");
                Ok(Baseline::new(
                    role_id.clone(),
                    sample_baseline(&code),
                    DataSource::Fallback,
                ))
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Working-set edits
    // ─────────────────────────────────────────────────────────────────────────

    fn edit<R>(&self, apply: impl FnOnce(&mut SessionState) -> R) -> Result<R> {
        let mut state = self.state.write();
        state.loaded_role()?;
        Ok(apply(&mut state))
    }

    /// Add keys to the working set.
    ///
    /// With a non-empty catalog, keys it does not contain are rejected.
    pub fn grant<I>(&self, keys: I) -> Result<EditOutcome>
    where
        I: IntoIterator<Item = PermissionKey>,
    {
        self.edit(|state| {
            let mut outcome = EditOutcome::default();
            for key in keys {
                if !state.catalog.is_empty() && !state.catalog.contains(&key) {
                    debug!(key = %key, "Rejecting key outside the catalog");
                    outcome.rejected.push(key);
                } else if state.working.insert(key.clone()) {
                    outcome.applied.push(key);
                }
            }
            outcome
        })
    }

    /// Remove keys from the working set.
    pub fn revoke<I>(&self, keys: I) -> Result<EditOutcome>
    where
        I: IntoIterator<Item = PermissionKey>,
    {
        self.edit(|state| {
            let mut outcome = EditOutcome::default();
            for key in keys {
                if state.working.remove(&key) {
                    outcome.applied.push(key);
                }
            }
            outcome
        })
    }

    /// Grant every catalog action of `resource`.
    pub fn grant_resource(&self, resource: &str) -> Result<EditOutcome> {
        let resource = normalize_resource(resource);
        let keys: Vec<PermissionKey> = self
            .state
            .read()
            .catalog
            .keys_for_resource(&resource)
            .collect();
        self.grant(keys)
    }

    /// Revoke every working-set key of `resource`.
    pub fn revoke_resource(&self, resource: &str) -> Result<EditOutcome> {
        let resource = normalize_resource(resource);
        self.edit(|state| {
            let (removed, kept) = std::mem::take(&mut state.working)
                .into_iter()
                .partition(|k: &PermissionKey| k.resource() == resource);
            state.working = kept;
            EditOutcome {
                applied: Vec::from_iter(removed),
                rejected: Vec::new(),
            }
        })
    }

    /// Grant every catalog key.
    pub fn select_all(&self) -> Result<EditOutcome> {
        let keys: Vec<PermissionKey> = self.state.read().catalog.keys().collect();
        self.grant(keys)
    }

    /// Empty the working set.
    pub fn clear_all(&self) -> Result<EditOutcome> {
        self.edit(|state| EditOutcome {
            applied: std::mem::take(&mut state.working).into_iter().collect(),
            rejected: Vec::new(),
        })
    }

    /// Copy the baseline back into the working set.
    pub fn discard_changes(&self) -> Result<()> {
        self.edit(|state| state.working = state.baseline_keys())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    fn begin_write(&self, role_id: &RoleId) -> Result<InFlightGuard<'_>> {
        if !self.in_flight.insert(role_id.clone()) {
            let error = RoleSyncError::sync_in_progress(role_id.as_str());
            error.log();
            return Err(error);
        }
        Ok(InFlightGuard {
            set: &self.in_flight,
            role_id: role_id.clone(),
        })
    }

    /// Push the pending diff of the current role to the backend.
    ///
    /// Outcomes, including failures, are reported in the [`SaveReport`];
    /// errors are returned only when no role is selected, its grants are not
    /// loaded yet, or a write for the role is already running. After any accepted phase the baseline is
    /// re-fetched and replaces the working set.
    pub async fn save(&self) -> Result<SaveReport> {
        let (role_id, generation) = self.current_target()?;
        let _guard = self.begin_write(&role_id)?;

        let (pending, catalog) = {
            let state = self.state.read();
            if !state.accepts(&role_id, generation) {
                return Err(RoleSyncError::stale_result(role_id.as_str()));
            }
            if let Err(error) = state.loaded_role() {
                error.log();
                return Err(error);
            }
            (diff(&state.baseline_keys(), &state.working), state.catalog.clone())
        };

        if pending.is_empty() {
            info!(role_id = %role_id, "No changes to save");
            SyncMetrics::record_save("no_changes");
            return Ok(SaveReport::no_changes(role_id));
        }

        let mut report = SyncProtocol::new(self.backend.as_ref())
            .apply(&role_id, &pending, &catalog)
            .await;

        if report.any_applied() {
            match self.load_baseline(role_id.clone(), generation).await {
                Ok(_) => report.baseline_refreshed = true,
                Err(error) => error.log(),
            }
        }

        SyncMetrics::record_save(report.status().as_str());
        info!(
            role_id = %role_id,
            status = %report.status(),
            added_ok = report.added_ok(),
            removed_ok = report.removed_ok(),
            baseline_refreshed = report.baseline_refreshed,
            "Save finished"
        );
        Ok(report)
    }

    /// Restore the current role's default grants on the backend.
    ///
    /// On failure the working set is left as it was.
    pub async fn reset_to_default(&self) -> Result<Baseline> {
        let (role_id, generation) = self.current_target()?;
        let _guard = self.begin_write(&role_id)?;

        self.backend
            .reset_role(&role_id)
            .await
            .and_then(|envelope| envelope.into_ack("reset role"))
            .inspect_err(RoleSyncError::log)?;

        info!(role_id = %role_id, "Role reset to defaults");
        self.load_baseline(role_id, generation).await
    }

    /// Drop all session state and start a new session.
    pub fn end_session(&self) {
        let mut state = self.state.write();
        let next = SessionState::new(state.generation + 1);
        info!(
            ended = %state.session_id,
            started = %next.session_id,
            "Permission engine session replaced"
        );
        *state = next;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    pub fn session_id(&self) -> Uuid {
        self.state.read().session_id
    }

    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    pub fn catalog(&self) -> Arc<PermissionCatalog> {
        self.state.read().catalog.clone()
    }

    pub fn roles(&self) -> Vec<Role> {
        self.state.read().roles.clone()
    }

    /// Find a loaded role by id, then by code.
    pub fn find_role(&self, needle: &str) -> Option<Role> {
        let state = self.state.read();
        state
            .roles
            .iter()
            .find(|r| r.id.as_str() == needle)
            .or_else(|| state.roles.iter().find(|r| r.code == needle))
            .cloned()
    }

    pub fn current_role_id(&self) -> Option<RoleId> {
        self.state.read().current_role.clone()
    }

    pub fn current_role(&self) -> Option<Role> {
        let state = self.state.read();
        state
            .current_role
            .as_ref()
            .and_then(|id| state.role(id))
            .cloned()
    }

    pub fn baseline(&self) -> Option<Baseline> {
        self.state.read().baseline.clone()
    }

    pub fn working_set(&self) -> BTreeSet<PermissionKey> {
        self.state.read().working.clone()
    }

    /// Delta between baseline and working set.
    pub fn pending_diff(&self) -> PermissionDiff {
        let state = self.state.read();
        diff(&state.baseline_keys(), &state.working)
    }

    pub fn has_unsaved_changes(&self) -> bool {
        !self.pending_diff().is_empty()
    }

    /// Whether a save or reset is running for `role_id`.
    pub fn is_saving(&self, role_id: &RoleId) -> bool {
        self.in_flight.contains(role_id)
    }
}

impl std::fmt::Debug for PermissionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("PermissionEngine")
            .field("session_id", &state.session_id)
            .field("current_role", &state.current_role)
            .field("generation", &state.generation)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryBackend;

    fn engine() -> (InMemoryBackend, PermissionEngine) {
        let backend = InMemoryBackend::new()
            .with_permission(1, "orders", "view")
            .with_permission(2, "orders", "create")
            .with_permission(3, "dealers", "view")
            .with_role("7", "STAFF", &[1]);
        let engine = PermissionEngine::new(Arc::new(backend.clone()), EngineConfig::default());
        (backend, engine)
    }

    #[tokio::test]
    async fn test_edits_require_selected_role() {
        let (_, engine) = engine();
        let err = engine
            .grant([PermissionKey::new("orders", "view")])
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoRoleSelected);
        assert_eq!(engine.save().await.unwrap_err().code(), ErrorCode::NoRoleSelected);
    }

    #[tokio::test]
    async fn test_grant_rejects_unknown_keys() {
        let (_, engine) = engine();
        engine.bootstrap().await;

        let outcome = engine
            .grant([
                PermissionKey::new("orders", "create"),
                PermissionKey::new("spaceships", "fly"),
                PermissionKey::new("orders", "view"),
            ])
            .unwrap();
        assert_eq!(outcome.applied, vec![PermissionKey::new("orders", "create")]);
        assert_eq!(outcome.rejected, vec![PermissionKey::new("spaceships", "fly")]);
    }

    #[tokio::test]
    async fn test_resource_bulk_edits() {
        let (_, engine) = engine();
        engine.bootstrap().await;

        let granted = engine.grant_resource("Order").unwrap();
        assert_eq!(granted.applied, vec![PermissionKey::new("orders", "create")]);

        let revoked = engine.revoke_resource("orders").unwrap();
        assert_eq!(revoked.applied.len(), 2);
        assert!(engine.working_set().is_empty());

        engine.select_all().unwrap();
        assert_eq!(engine.working_set().len(), 3);
        engine.clear_all().unwrap();
        assert!(engine.working_set().is_empty());

        engine.discard_changes().unwrap();
        assert_eq!(
            engine.working_set(),
            [PermissionKey::new("orders", "view")].into()
        );
        assert!(!engine.has_unsaved_changes());
    }

    #[tokio::test]
    async fn test_empty_diff_save_is_reported_noop() {
        let (backend, engine) = engine();
        engine.bootstrap().await;
        let calls = backend.call_count();

        let report = engine.save().await.unwrap();
        assert_eq!(report.status(), crate::sync::SaveStatus::NoChanges);
        assert_eq!(backend.call_count(), calls);
    }

    #[tokio::test]
    async fn test_end_session_discards_state() {
        let (_, engine) = engine();
        engine.bootstrap().await;
        let old = engine.session_id();
        let generation = engine.generation();

        engine.end_session();
        assert_ne!(engine.session_id(), old);
        assert!(engine.generation() > generation);
        assert!(engine.roles().is_empty());
        assert!(engine.catalog().is_empty());
        assert!(engine.current_role().is_none());
        assert!(engine.baseline().is_none());
    }

    #[tokio::test]
    async fn test_select_unknown_role_fails() {
        let (_, engine) = engine();
        engine.bootstrap().await;
        let err = engine.select_role(&RoleId::new("999")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::RoleNotFound);
        assert_eq!(engine.current_role_id(), Some(RoleId::new("7")));
    }
}
