//! Caller-visible outcome of a save.

use serde::Serialize;
use std::fmt;

use crate::error::{ErrorCode, Result, RoleSyncError};
use crate::rbac::{PermissionDiff, PermissionKey, RoleId};

/// What happened in one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PhaseOutcome {
    /// Nothing to send.
    Skipped,
    /// Not run because an earlier phase failed.
    NotAttempted,
    Succeeded {
        strategy: &'static str,
        attempts: usize,
    },
    Failed {
        attempts: usize,
        last_error: Option<String>,
    },
}

impl PhaseOutcome {
    /// Succeeded, or had nothing to do.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Skipped)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn attempts(&self) -> usize {
        match self {
            Self::Succeeded { attempts, .. } | Self::Failed { attempts, .. } => *attempts,
            Self::Skipped | Self::NotAttempted => 0,
        }
    }
}

/// Overall classification of a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    /// Baseline and working set were already equal.
    NoChanges,
    Success,
    /// Additions stored, removals rejected.
    PartialFailure,
    Failed,
}

impl SaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoChanges => "no_changes",
            Self::Success => "success",
            Self::PartialFailure => "partial_failure",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one save, with add and remove reported separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReport {
    pub role_id: RoleId,
    pub added: Vec<PermissionKey>,
    pub removed: Vec<PermissionKey>,
    pub add: PhaseOutcome,
    pub remove: PhaseOutcome,
    /// Keys with no permission id in the catalog; never sent by id.
    pub unresolved: Vec<PermissionKey>,
    /// The baseline was re-fetched and applied after the save.
    pub baseline_refreshed: bool,
}

impl SaveReport {
    /// Report for an empty diff.
    pub fn no_changes(role_id: RoleId) -> Self {
        Self {
            role_id,
            added: Vec::new(),
            removed: Vec::new(),
            add: PhaseOutcome::Skipped,
            remove: PhaseOutcome::Skipped,
            unresolved: Vec::new(),
            baseline_refreshed: false,
        }
    }

    pub(crate) fn for_diff(role_id: RoleId, diff: &PermissionDiff) -> Self {
        Self {
            added: diff.added.iter().cloned().collect(),
            removed: diff.removed.iter().cloned().collect(),
            ..Self::no_changes(role_id)
        }
    }

    pub fn added_ok(&self) -> bool {
        self.add.is_ok()
    }

    pub fn removed_ok(&self) -> bool {
        self.remove.is_ok()
    }

    /// True when at least one phase changed server state.
    pub fn any_applied(&self) -> bool {
        self.add.is_success() || self.remove.is_success()
    }

    pub fn status(&self) -> SaveStatus {
        if self.added.is_empty() && self.removed.is_empty() {
            return SaveStatus::NoChanges;
        }
        match (&self.add, &self.remove) {
            (PhaseOutcome::Failed { .. }, _) => SaveStatus::Failed,
            (PhaseOutcome::Succeeded { .. }, PhaseOutcome::Failed { .. }) => {
                SaveStatus::PartialFailure
            }
            (_, PhaseOutcome::Failed { .. }) => SaveStatus::Failed,
            _ => SaveStatus::Success,
        }
    }

    /// Convert failed and partially failed saves into errors.
    pub fn into_result(self) -> Result<Self> {
        match self.status() {
            SaveStatus::NoChanges | SaveStatus::Success => Ok(self),
            SaveStatus::PartialFailure => {
                let mut error = RoleSyncError::partial_failure(self.role_id.as_str());
                if let PhaseOutcome::Failed { last_error: Some(last), .. } = &self.remove {
                    error = error.with_context("last_error", last);
                }
                Err(error)
            }
            SaveStatus::Failed => Err(match &self.add {
                PhaseOutcome::Failed { attempts, last_error } => {
                    RoleSyncError::sync_failed(self.role_id.as_str(), *attempts)
                        .with_context("last_error", last_error)
                }
                _ => RoleSyncError::new(
                    ErrorCode::SyncFailed,
                    format!("Removing permissions from role {} failed", self.role_id),
                )
                .with_context("attempts", self.remove.attempts()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(add: PhaseOutcome, remove: PhaseOutcome) -> SaveReport {
        SaveReport {
            added: vec![PermissionKey::new("orders", "create")],
            removed: vec![PermissionKey::new("orders", "view")],
            add,
            remove,
            ..SaveReport::no_changes(RoleId::new("5"))
        }
    }

    fn ok(strategy: &'static str) -> PhaseOutcome {
        PhaseOutcome::Succeeded {
            strategy,
            attempts: 1,
        }
    }

    fn failed() -> PhaseOutcome {
        PhaseOutcome::Failed {
            attempts: 2,
            last_error: Some("rejected".into()),
        }
    }

    #[test]
    fn test_status_matrix() {
        assert_eq!(
            SaveReport::no_changes(RoleId::new("1")).status(),
            SaveStatus::NoChanges
        );
        assert_eq!(report(ok("a"), ok("b")).status(), SaveStatus::Success);
        assert_eq!(
            report(ok("a"), failed()).status(),
            SaveStatus::PartialFailure
        );
        assert_eq!(
            report(failed(), PhaseOutcome::NotAttempted).status(),
            SaveStatus::Failed
        );
        assert_eq!(
            report(PhaseOutcome::Skipped, failed()).status(),
            SaveStatus::Failed
        );
        assert_eq!(
            report(PhaseOutcome::Skipped, ok("b")).status(),
            SaveStatus::Success
        );
    }

    #[test]
    fn test_partial_failure_reports_phases_independently() {
        let r = report(ok("permission_ids_object"), failed());
        assert!(r.added_ok());
        assert!(!r.removed_ok());
        assert!(r.any_applied());
    }

    #[test]
    fn test_into_result_distinguishes_failures() {
        let partial = report(ok("a"), failed()).into_result().unwrap_err();
        assert_eq!(partial.code(), ErrorCode::PartialFailure);

        let fatal = report(failed(), PhaseOutcome::NotAttempted)
            .into_result()
            .unwrap_err();
        assert_eq!(fatal.code(), ErrorCode::SyncFailed);
        assert_eq!(fatal.details().entity_id.as_deref(), Some("5"));
        assert_eq!(
            fatal.details().context.get("attempts"),
            Some(&serde_json::json!(2))
        );
        assert_eq!(
            fatal.details().context.get("last_error"),
            Some(&serde_json::json!("rejected"))
        );

        assert!(report(ok("a"), ok("b")).into_result().is_ok());
    }

    #[test]
    fn test_serializes_camel_case_with_tagged_outcomes() {
        let value = serde_json::to_value(report(ok("id_array"), PhaseOutcome::Skipped)).unwrap();
        assert_eq!(value["roleId"], "5");
        assert_eq!(value["add"]["outcome"], "succeeded");
        assert_eq!(value["add"]["strategy"], "id_array");
        assert_eq!(value["remove"]["outcome"], "skipped");
        assert_eq!(value["baselineRefreshed"], false);
    }
}
