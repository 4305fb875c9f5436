//! Engine scenarios against in-process backends.
//!
//! Tests cover:
//! - Loading with and without backend failures (fallback roles, sample baselines)
//! - Save outcomes: success, partial failure, fatal add failure
//! - Stale baseline rejection when the role changes mid-fetch
//! - Per-role save exclusion
//! - Edits and saves refused until the role's grants load
//! - Reset to defaults

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use common::{dealer_shop, wait_until, GatedBackend};
use rolesync_core::client::memory::{BodyShape, FailureSwitches};
use rolesync_core::client::InMemoryBackend;
use rolesync_core::config::EngineConfig;
use rolesync_core::engine::{DataSource, PermissionEngine};
use rolesync_core::error::ErrorCode;
use rolesync_core::rbac::{PermissionKey, RoleId};
use rolesync_core::sync::{PhaseOutcome, SaveStatus};

// ============================================================================
// Test Utilities
// ============================================================================

fn key(s: &str) -> PermissionKey {
    PermissionKey::parse(s).expect("valid key")
}

fn keys(list: &[&str]) -> BTreeSet<PermissionKey> {
    list.iter().map(|s| key(s)).collect()
}

async fn loaded(backend: InMemoryBackend) -> PermissionEngine {
    let engine = PermissionEngine::new(Arc::new(backend), EngineConfig::default());
    engine.bootstrap().await;
    engine
}

fn manual_selection() -> EngineConfig {
    EngineConfig {
        auto_select_first_role: false,
        ..EngineConfig::default()
    }
}

// ============================================================================
// Loading
// ============================================================================

#[tokio::test]
async fn test_bootstrap_selects_first_role_with_server_baseline() {
    let engine = loaded(dealer_shop()).await;

    assert_eq!(engine.roles().len(), 3);
    assert_eq!(engine.catalog().len(), 5);
    assert_eq!(engine.current_role().map(|r| r.code), Some("MANAGER".to_string()));

    let baseline = engine.baseline().expect("baseline loaded");
    assert_eq!(baseline.source, DataSource::Server);
    assert_eq!(baseline.keys, keys(&["orders:view", "dealers:view"]));
    assert_eq!(engine.working_set(), baseline.keys);
    assert!(!engine.has_unsaved_changes());
}

#[tokio::test]
async fn test_role_fetch_failure_uses_fallback_directory() {
    let backend = dealer_shop();
    backend.set_failures(FailureSwitches {
        list_roles: true,
        role_detail: true,
        as_transport: true,
        ..Default::default()
    });

    let engine = PermissionEngine::new(Arc::new(backend), EngineConfig::default());
    let (catalog, roles) = engine.bootstrap().await;

    assert_eq!(catalog, DataSource::Server);
    assert_eq!(roles, DataSource::Fallback);
    let codes: Vec<String> = engine.roles().into_iter().map(|r| r.code).collect();
    assert_eq!(codes, vec!["ADMIN", "MANAGER", "STAFF", "DEALER"]);

    let baseline = engine.baseline().expect("sample baseline");
    assert_eq!(baseline.role_id, RoleId::new("1"));
    assert!(baseline.is_fallback());
    assert!(baseline.keys.contains(&key("orders:approve")));
}

#[tokio::test]
async fn test_logical_failure_on_roles_also_falls_back() {
    let backend = dealer_shop();
    backend.set_failures(FailureSwitches {
        list_roles: true,
        ..Default::default()
    });
    let engine = loaded(backend).await;
    assert_eq!(engine.roles().len(), 4);
}

#[tokio::test]
async fn test_fallback_disabled_keeps_previous_data() {
    let backend = dealer_shop();
    backend.set_failures(FailureSwitches {
        list_roles: true,
        ..Default::default()
    });
    let config = EngineConfig {
        fallback_enabled: false,
        ..EngineConfig::default()
    };
    let engine = PermissionEngine::new(Arc::new(backend), config);

    assert_eq!(engine.load_roles().await, DataSource::Retained);
    assert!(engine.roles().is_empty());
    assert!(engine.current_role_id().is_none());
}

#[tokio::test]
async fn test_catalog_failure_keeps_previous_catalog() {
    let backend = dealer_shop();
    let engine = PermissionEngine::new(Arc::new(backend.clone()), EngineConfig::default());
    assert_eq!(engine.load_catalog().await, DataSource::Server);

    backend.set_failures(FailureSwitches {
        list_permissions: true,
        as_transport: true,
        ..Default::default()
    });
    assert_eq!(engine.load_catalog().await, DataSource::Retained);
    assert_eq!(engine.catalog().len(), 5);
}

#[tokio::test]
async fn test_switching_roles_discards_edits() {
    let engine = loaded(dealer_shop()).await;
    engine.grant([key("reports:export")]).unwrap();
    assert!(engine.has_unsaved_changes());

    engine.select_role(&RoleId::new("20")).await.unwrap();
    assert_eq!(engine.working_set(), keys(&["orders:view"]));
    assert!(!engine.has_unsaved_changes());
}

// ============================================================================
// Saving
// ============================================================================

#[tokio::test]
async fn test_end_to_end_orders_scenario() {
    let backend = dealer_shop();
    let engine = loaded(backend.clone()).await;
    engine.select_role(&RoleId::new("20")).await.unwrap();
    assert_eq!(engine.baseline().unwrap().keys, keys(&["orders:view"]));

    engine.grant([key("orders:create")]).unwrap();
    engine.revoke([key("orders:view")]).unwrap();

    let pending = engine.pending_diff();
    assert_eq!(pending.added, keys(&["orders:create"]));
    assert_eq!(pending.removed, keys(&["orders:view"]));

    let report = engine.save().await.unwrap();
    assert_eq!(report.status(), SaveStatus::Success);
    assert!(report.added_ok() && report.removed_ok());
    assert!(report.baseline_refreshed);
    assert_eq!(
        report.add,
        PhaseOutcome::Succeeded {
            strategy: "permission_ids_object",
            attempts: 1
        }
    );

    assert_eq!(engine.baseline().unwrap().keys, keys(&["orders:create"]));
    assert_eq!(engine.working_set(), keys(&["orders:create"]));
    assert_eq!(backend.granted_keys(&RoleId::new("20")), keys(&["orders:create"]));
}

#[tokio::test]
async fn test_partial_failure_keeps_additions() {
    let backend = dealer_shop();
    let engine = loaded(backend.clone()).await;
    engine.select_role(&RoleId::new("20")).await.unwrap();
    backend.set_failures(FailureSwitches {
        remove_delete: true,
        remove_post: true,
        ..Default::default()
    });

    engine
        .grant([key("orders:update"), key("dealers:view")])
        .unwrap();
    engine.revoke([key("orders:view")]).unwrap();

    let report = engine.save().await.unwrap();
    assert!(report.added_ok());
    assert!(!report.removed_ok());
    assert_eq!(report.status(), SaveStatus::PartialFailure);
    assert_eq!(report.remove.attempts(), 2);

    let baseline = engine.baseline().unwrap();
    assert_eq!(
        baseline.keys,
        keys(&["orders:update", "dealers:view", "orders:view"])
    );
    assert!(report.baseline_refreshed);
    assert_eq!(
        report.into_result().unwrap_err().code(),
        ErrorCode::PartialFailure
    );
}

#[tokio::test]
async fn test_add_falls_back_through_shapes() {
    let backend = dealer_shop();
    backend.accept_add_shapes(&[BodyShape::PermissionsKeys]);
    let engine = loaded(backend.clone()).await;

    engine.grant([key("reports:export")]).unwrap();
    let report = engine.save().await.unwrap();

    assert_eq!(
        report.add,
        PhaseOutcome::Succeeded {
            strategy: "permissions_keys_object",
            attempts: 4
        }
    );
    assert!(backend
        .granted_keys(&RoleId::new("10"))
        .contains(&key("reports:export")));
}

#[tokio::test]
async fn test_exhausted_add_shapes_fail_without_removal() {
    let backend = dealer_shop();
    backend.accept_add_shapes(&[]);
    let engine = loaded(backend.clone()).await;

    engine.grant([key("reports:export")]).unwrap();
    engine.revoke([key("dealers:view")]).unwrap();
    let report = engine.save().await.unwrap();

    assert_eq!(report.status(), SaveStatus::Failed);
    assert_eq!(report.add.attempts(), 5);
    assert_eq!(report.remove, PhaseOutcome::NotAttempted);
    assert!(!report.baseline_refreshed);
    // edits survive a failed save
    assert!(engine.has_unsaved_changes());
    assert_eq!(
        backend.granted_keys(&RoleId::new("10")),
        keys(&["orders:view", "dealers:view"])
    );
    assert_eq!(
        report.into_result().unwrap_err().code(),
        ErrorCode::SyncFailed
    );
}

#[tokio::test]
async fn test_remove_only_save_uses_post_fallback() {
    let backend = dealer_shop();
    backend.set_failures(FailureSwitches {
        remove_delete: true,
        ..Default::default()
    });
    let engine = loaded(backend.clone()).await;

    engine.revoke([key("dealers:view")]).unwrap();
    let report = engine.save().await.unwrap();

    assert_eq!(report.add, PhaseOutcome::Skipped);
    assert_eq!(
        report.remove,
        PhaseOutcome::Succeeded {
            strategy: "post_permission_ids",
            attempts: 2
        }
    );
    assert_eq!(engine.working_set(), keys(&["orders:view"]));
}

#[tokio::test]
async fn test_failed_baseline_without_fallback_blocks_edits() {
    let backend = dealer_shop();
    let config = EngineConfig {
        fallback_enabled: false,
        ..manual_selection()
    };
    let engine = PermissionEngine::new(Arc::new(backend.clone()), config);
    engine.bootstrap().await;
    backend.set_failures(FailureSwitches {
        role_detail: true,
        ..Default::default()
    });

    assert!(engine.select_role(&RoleId::new("20")).await.is_err());
    assert!(engine.baseline().is_none());

    let err = engine.grant([key("orders:create")]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::BaselineNotLoaded);
    let err = engine.save().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::BaselineNotLoaded);
    assert!(!engine.is_saving(&RoleId::new("20")));
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
async fn test_save_waits_for_baseline_in_flight() {
    let gated = Arc::new(GatedBackend::new(dealer_shop()));
    let engine = Arc::new(PermissionEngine::new(gated.clone(), manual_selection()));
    engine.bootstrap().await;

    let gate = gated.gate_detail("20");
    let pending = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.select_role(&RoleId::new("20")).await })
    };
    wait_until(|| engine.current_role_id() == Some(RoleId::new("20"))).await;

    // role 20 already holds orders:view on the backend
    let err = engine.grant([key("orders:view")]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::BaselineNotLoaded);
    assert!(engine.pending_diff().is_empty());

    let calls = gated.inner().call_count();
    let err = engine.save().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::BaselineNotLoaded);
    assert_eq!(gated.inner().call_count(), calls);

    gate.notify_one();
    pending.await.unwrap().unwrap();
    assert_eq!(engine.working_set(), keys(&["orders:view"]));
    assert!(engine.grant([key("orders:view")]).unwrap().applied.is_empty());
    assert_eq!(engine.save().await.unwrap().status(), SaveStatus::NoChanges);
}

#[tokio::test]
async fn test_stale_baseline_is_not_applied() {
    let gated = Arc::new(GatedBackend::new(dealer_shop()));
    let engine = Arc::new(PermissionEngine::new(gated.clone(), manual_selection()));
    engine.bootstrap().await;

    let gate = gated.gate_detail("10");
    let pending = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.select_role(&RoleId::new("10")).await })
    };
    wait_until(|| engine.current_role_id() == Some(RoleId::new("10"))).await;

    engine.select_role(&RoleId::new("30")).await.unwrap();
    gate.notify_one();

    let stale = pending.await.unwrap().unwrap_err();
    assert_eq!(stale.code(), ErrorCode::StaleResult);

    let baseline = engine.baseline().unwrap();
    assert_eq!(baseline.role_id, RoleId::new("30"));
    assert_eq!(engine.working_set(), keys(&["orders:view", "orders:create"]));
}

#[tokio::test]
async fn test_second_save_for_same_role_is_refused() {
    let gated = Arc::new(GatedBackend::new(dealer_shop()));
    let engine = Arc::new(PermissionEngine::new(gated.clone(), EngineConfig::default()));
    engine.bootstrap().await;
    let role = engine.current_role_id().unwrap();

    engine.grant([key("orders:update")]).unwrap();
    let gate = gated.gate_add();
    let first = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.save().await })
    };
    wait_until(|| engine.is_saving(&role)).await;

    let refused = engine.save().await.unwrap_err();
    assert_eq!(refused.code(), ErrorCode::SyncInProgress);
    let refused = engine.reset_to_default().await.unwrap_err();
    assert_eq!(refused.code(), ErrorCode::SyncInProgress);

    gate.notify_one();
    let report = first.await.unwrap().unwrap();
    assert_eq!(report.status(), SaveStatus::Success);
    assert!(!engine.is_saving(&role));
}

// ============================================================================
// Reset
// ============================================================================

#[tokio::test]
async fn test_reset_restores_defaults() {
    let backend = dealer_shop();
    let engine = loaded(backend.clone()).await;

    engine.grant([key("reports:export")]).unwrap();
    engine.save().await.unwrap();
    assert!(engine.working_set().contains(&key("reports:export")));

    let baseline = engine.reset_to_default().await.unwrap();
    assert_eq!(baseline.keys, keys(&["orders:view", "dealers:view"]));
    assert_eq!(engine.working_set(), baseline.keys);
}

#[tokio::test]
async fn test_failed_reset_leaves_edits() {
    let backend = dealer_shop();
    let engine = loaded(backend.clone()).await;
    backend.set_failures(FailureSwitches {
        reset: true,
        ..Default::default()
    });

    engine.grant([key("reports:export")]).unwrap();
    let before = engine.working_set();

    let err = engine.reset_to_default().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::LogicalFailure);
    assert_eq!(engine.working_set(), before);
    assert!(!engine.is_saving(&RoleId::new("10")));
}
