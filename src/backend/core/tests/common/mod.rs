//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use rolesync_core::client::{Envelope, InMemoryBackend, RoleBackend};
use rolesync_core::error::Result;
use rolesync_core::rbac::{RawPermission, RawRole, RawRoleDetail, RoleId};

/// Permission ids used by [`dealer_shop`].
pub const ORDERS_VIEW: i64 = 1;
pub const ORDERS_CREATE: i64 = 2;
pub const ORDERS_UPDATE: i64 = 3;
pub const DEALERS_VIEW: i64 = 4;
pub const REPORTS_EXPORT: i64 = 5;

/// A small backend: three roles over five permissions.
pub fn dealer_shop() -> InMemoryBackend {
    InMemoryBackend::new()
        .with_permission(ORDERS_VIEW, "orders", "view")
        .with_permission(ORDERS_CREATE, "Order", "add")
        .with_permission(ORDERS_UPDATE, "orders", "update")
        .with_permission(DEALERS_VIEW, "Dealer", "read")
        .with_permission(REPORTS_EXPORT, "report", "export")
        .with_role("10", "MANAGER", &[ORDERS_VIEW, DEALERS_VIEW])
        .with_role("20", "STAFF", &[ORDERS_VIEW])
        .with_role("30", "DEALER", &[ORDERS_VIEW, ORDERS_CREATE])
}

/// Wraps a backend and holds selected calls until released.
pub struct GatedBackend {
    inner: InMemoryBackend,
    detail_gates: Mutex<HashMap<RoleId, Arc<Notify>>>,
    add_gate: Mutex<Option<Arc<Notify>>>,
}

impl GatedBackend {
    pub fn new(inner: InMemoryBackend) -> Self {
        Self {
            inner,
            detail_gates: Mutex::new(HashMap::new()),
            add_gate: Mutex::new(None),
        }
    }

    /// Hold role-detail fetches for `role_id` until the returned gate is notified.
    pub fn gate_detail(&self, role_id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.detail_gates
            .lock()
            .insert(RoleId::new(role_id), gate.clone());
        gate
    }

    /// Hold add calls until the returned gate is notified.
    pub fn gate_add(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.add_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn inner(&self) -> &InMemoryBackend {
        &self.inner
    }
}

#[async_trait]
impl RoleBackend for GatedBackend {
    async fn list_roles(&self) -> Result<Envelope<Vec<RawRole>>> {
        self.inner.list_roles().await
    }

    async fn list_permissions(&self) -> Result<Envelope<Vec<RawPermission>>> {
        self.inner.list_permissions().await
    }

    async fn role_detail(&self, role_id: &RoleId) -> Result<Envelope<RawRoleDetail>> {
        let gate = self.detail_gates.lock().get(role_id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.inner.role_detail(role_id).await
    }

    async fn add_permissions(&self, role_id: &RoleId, body: Value) -> Result<Envelope<Value>> {
        let gate = self.add_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.inner.add_permissions(role_id, body).await
    }

    async fn remove_permissions(
        &self,
        role_id: &RoleId,
        body: Value,
    ) -> Result<Envelope<Value>> {
        self.inner.remove_permissions(role_id, body).await
    }

    async fn remove_permissions_post(
        &self,
        role_id: &RoleId,
        body: Value,
    ) -> Result<Envelope<Value>> {
        self.inner.remove_permissions_post(role_id, body).await
    }

    async fn reset_role(&self, role_id: &RoleId) -> Result<Envelope<Value>> {
        self.inner.reset_role(role_id).await
    }
}

/// Yield until `condition` holds, failing the test after one second.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}
