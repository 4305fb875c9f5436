//! Set difference between a baseline and an edited working set.

use serde::Serialize;
use std::collections::BTreeSet;

use super::models::PermissionKey;

/// Minimal delta that turns a baseline into a working set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PermissionDiff {
    /// `working − baseline`
    pub added: BTreeSet<PermissionKey>,
    /// `baseline − working`
    pub removed: BTreeSet<PermissionKey>,
}

impl PermissionDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Total number of keys to change.
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len()
    }
}

/// Compute the delta from `baseline` to `working`.
pub fn diff(baseline: &BTreeSet<PermissionKey>, working: &BTreeSet<PermissionKey>) -> PermissionDiff {
    PermissionDiff {
        added: working.difference(baseline).cloned().collect(),
        removed: baseline.difference(working).cloned().collect(),
    }
}
