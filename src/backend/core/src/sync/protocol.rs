//! Applies a permission diff to a role through the backend.
//!
//! 1. Resolve every key to a catalog id; keys without one are reported as
//!    unresolved and only travel in key-based bodies.
//! 2. Add phase: walk [`AddShape::ordered`] until one body is accepted. If
//!    none is, the save fails and removals are not attempted.
//! 3. Remove phase: walk [`RemoveShape::ordered`]. If none is accepted after
//!    a successful add phase the save is a partial failure; additions are
//!    never rolled back.

use tracing::{debug, info, warn};

use super::report::{PhaseOutcome, SaveReport};
use super::strategy::{AddShape, RemoveShape, RequestShape};
use crate::client::RoleBackend;
use crate::error::RoleSyncError;
use crate::rbac::{PermissionCatalog, PermissionDiff, PermissionId, PermissionKey, RoleId};
use crate::telemetry::SyncMetrics;

/// Keys split by whether the catalog knows their id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedKeys {
    pub ids: Vec<PermissionId>,
    pub keys: Vec<PermissionKey>,
    pub unresolved: Vec<PermissionKey>,
}

/// Resolve `keys` to permission ids through the catalog.
pub fn resolve_ids<'a>(
    catalog: &PermissionCatalog,
    keys: impl IntoIterator<Item = &'a PermissionKey>,
) -> ResolvedKeys {
    let mut resolved = ResolvedKeys::default();
    for key in keys {
        match catalog.id_of(key) {
            Some(id) => resolved.ids.push(id.clone()),
            None => {
                RoleSyncError::validation_gap(key.as_str()).log();
                warn!(key = %key, "Skipping permission with no catalog id");
                resolved.unresolved.push(key.clone());
            }
        }
        resolved.keys.push(key.clone());
    }
    resolved
}

/// Runs the add/remove phases for one role.
pub struct SyncProtocol<'a> {
    backend: &'a dyn RoleBackend,
}

impl<'a> SyncProtocol<'a> {
    pub fn new(backend: &'a dyn RoleBackend) -> Self {
        Self { backend }
    }

    /// Apply `diff` to `role_id`.
    ///
    /// Never returns an error: every failure is recorded in the report.
    pub async fn apply(
        &self,
        role_id: &RoleId,
        diff: &PermissionDiff,
        catalog: &PermissionCatalog,
    ) -> SaveReport {
        let mut report = SaveReport::for_diff(role_id.clone(), diff);
        if diff.is_empty() {
            debug!(role_id = %role_id, "Nothing to synchronize");
            return report;
        }

        let to_add = resolve_ids(catalog, &diff.added);
        let to_remove = resolve_ids(catalog, &diff.removed);
        report.unresolved = to_add
            .unresolved
            .iter()
            .chain(&to_remove.unresolved)
            .cloned()
            .collect();

        report.add = if diff.added.is_empty() {
            PhaseOutcome::Skipped
        } else {
            self.run_phase::<AddShape>(role_id, &to_add).await
        };

        report.remove = if report.add.is_failure() {
            PhaseOutcome::NotAttempted
        } else if to_remove.ids.is_empty() {
            PhaseOutcome::Skipped
        } else {
            self.run_phase::<RemoveShape>(role_id, &to_remove).await
        };

        info!(
            role_id = %role_id,
            added = report.added.len(),
            removed = report.removed.len(),
            unresolved = report.unresolved.len(),
            status = %report.status(),
            "Synchronization finished"
        );
        report
    }

    /// Try each shape of phase `S` in order until one is accepted.
    async fn run_phase<S: RequestShape>(
        &self,
        role_id: &RoleId,
        resolved: &ResolvedKeys,
    ) -> PhaseOutcome {
        let phase = S::PHASE;
        let mut attempts = 0;
        let mut last_error = None;

        for shape in S::ordered() {
            let Some(body) = shape.body(&resolved.ids, &resolved.keys) else {
                debug!(role_id = %role_id, phase = %phase, strategy = shape.name(), "Shape not applicable");
                continue;
            };
            attempts += 1;

            let outcome = shape
                .send(self.backend, role_id, body)
                .await
                .and_then(|envelope| envelope.into_ack(phase.as_str()));

            match outcome {
                Ok(()) => {
                    SyncMetrics::record_attempt(phase.as_str(), shape.name(), "success");
                    info!(
                        role_id = %role_id,
                        phase = %phase,
                        strategy = shape.name(),
                        attempt = attempts,
                        "Phase accepted"
                    );
                    return PhaseOutcome::Succeeded {
                        strategy: shape.name(),
                        attempts,
                    };
                }
                Err(error) => {
                    SyncMetrics::record_attempt(phase.as_str(), shape.name(), "failure");
                    warn!(
                        role_id = %role_id,
                        phase = %phase,
                        strategy = shape.name(),
                        attempt = attempts,
                        error = %error,
                        "Request shape rejected"
                    );
                    last_error = Some(error.to_string());
                }
            }
        }

        PhaseOutcome::Failed {
            attempts,
            last_error,
        }
    }
}
