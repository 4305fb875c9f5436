//! In-process role store implementing [`RoleBackend`].
//!
//! Behaves like a strict backend: the add endpoint accepts only the body
//! shapes listed in [`InMemoryBackend::accept_add_shapes`], unknown ids are
//! rejected, and failures can be injected per endpoint.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{Envelope, RoleBackend};
use crate::error::{ErrorCode, Result, RoleSyncError};
use crate::rbac::{
    PermissionId, PermissionKey, RawGrant, RawGrantRef, RawPermission, RawRole, RawRoleDetail,
    RoleId,
};

/// Add-body shapes the in-memory backend can be told to accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyShape {
    /// `{"permissionIds": [..]}`
    PermissionIds,
    /// `[id, ..]`
    IdArray,
    /// `{"permissions": [id, ..]}`
    PermissionsIds,
    /// `{"permissions": ["res:act", ..]}`
    PermissionsKeys,
    /// `["res:act", ..]`
    KeyArray,
}

/// Injected endpoint failures.
#[derive(Debug, Clone, Default)]
pub struct FailureSwitches {
    pub list_roles: bool,
    pub list_permissions: bool,
    pub role_detail: bool,
    pub remove_delete: bool,
    pub remove_post: bool,
    pub reset: bool,
    /// Fail reads with a transport error instead of `success: false`.
    pub as_transport: bool,
}

#[derive(Debug, Default)]
struct Store {
    roles: Vec<RawRole>,
    permissions: Vec<RawPermission>,
    grants: HashMap<RoleId, BTreeSet<String>>,
    defaults: HashMap<RoleId, BTreeSet<String>>,
}

/// In-memory role backend.
#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    store: Arc<RwLock<Store>>,
    accepted_add: Arc<RwLock<Vec<BodyShape>>>,
    failures: Arc<RwLock<FailureSwitches>>,
    calls: Arc<AtomicUsize>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(Store::default())),
            accepted_add: Arc::new(RwLock::new(vec![BodyShape::PermissionIds])),
            failures: Arc::new(RwLock::new(FailureSwitches::default())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Register a permission in the global list.
    pub fn with_permission(self, id: i64, resource: &str, action: &str) -> Self {
        self.store.write().permissions.push(RawPermission {
            id: PermissionId::Number(id),
            resource: resource.to_string(),
            action: action.to_string(),
            name: Some(format!("{}_{}", resource, action)),
            display_name: None,
            description: None,
            is_active: true,
        });
        self
    }

    /// Register a role; `granted` also becomes its reset default.
    pub fn with_role(self, id: &str, name: &str, granted: &[i64]) -> Self {
        {
            let mut store = self.store.write();
            let role_id = RoleId::new(id);
            store.roles.push(RawRole {
                id: role_id.clone(),
                name: name.to_string(),
                display_name: None,
                description: None,
                is_customized: false,
            });
            let ids: BTreeSet<String> = granted.iter().map(ToString::to_string).collect();
            store.grants.insert(role_id.clone(), ids.clone());
            store.defaults.insert(role_id, ids);
        }
        self
    }

    /// Replace the set of accepted add-body shapes.
    pub fn accept_add_shapes(&self, shapes: &[BodyShape]) {
        *self.accepted_add.write() = shapes.to_vec();
    }

    pub fn set_failures(&self, failures: FailureSwitches) {
        *self.failures.write() = failures;
    }

    /// Keys currently granted to a role.
    pub fn granted_keys(&self, role_id: &RoleId) -> BTreeSet<PermissionKey> {
        let store = self.store.read();
        let ids = store.grants.get(role_id).cloned().unwrap_or_default();
        store
            .permissions
            .iter()
            .filter(|p| ids.contains(&p.id.to_string()))
            .map(|p| PermissionKey::new(&p.resource, &p.action))
            .collect()
    }

    /// Total endpoint calls served.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn read_failure<T>(&self, failing: bool, operation: &str) -> Option<Result<Envelope<T>>> {
        if !failing {
            return None;
        }
        if self.failures.read().as_transport {
            Some(Err(RoleSyncError::with_internal(
                ErrorCode::TransportError,
                "Failed to connect to backend",
                format!("{} unavailable", operation),
            )))
        } else {
            Some(Ok(Envelope::failure(format!("{} unavailable", operation))))
        }
    }

    /// Map a body element to a permission id string, resolving keys.
    fn resolve(&self, value: &Value) -> Option<String> {
        match value {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if s.contains(':') => {
                let key = PermissionKey::parse(s)?;
                self.store
                    .read()
                    .permissions
                    .iter()
                    .find(|p| PermissionKey::new(&p.resource, &p.action) == key)
                    .map(|p| p.id.to_string())
            }
            Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn classify_add(body: &Value) -> Option<(BodyShape, &Vec<Value>)> {
        let is_key = |items: &Vec<Value>| {
            items
                .iter()
                .all(|v| v.as_str().is_some_and(|s| s.contains(':')))
        };
        match body {
            Value::Array(items) if is_key(items) => Some((BodyShape::KeyArray, items)),
            Value::Array(items) => Some((BodyShape::IdArray, items)),
            Value::Object(map) => {
                if let Some(Value::Array(items)) = map.get("permissionIds") {
                    return Some((BodyShape::PermissionIds, items));
                }
                match map.get("permissions") {
                    Some(Value::Array(items)) if is_key(items) => {
                        Some((BodyShape::PermissionsKeys, items))
                    }
                    Some(Value::Array(items)) => Some((BodyShape::PermissionsIds, items)),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn known_ids(&self, items: &[Value]) -> Option<Vec<String>> {
        let known: BTreeSet<String> = self
            .store
            .read()
            .permissions
            .iter()
            .map(|p| p.id.to_string())
            .collect();
        items
            .iter()
            .map(|v| self.resolve(v).filter(|id| known.contains(id)))
            .collect()
    }

    fn remove_ids(&self, role_id: &RoleId, items: Option<&Value>) -> Envelope<Value> {
        let Some(Value::Array(items)) = items else {
            return Envelope::failure("permissionIds is required");
        };
        let Some(ids) = self.known_ids(items) else {
            return Envelope::failure("unknown permission id");
        };
        let mut store = self.store.write();
        let Some(granted) = store.grants.get_mut(role_id) else {
            return Envelope::failure("role not found");
        };
        for id in ids {
            granted.remove(&id);
        }
        Envelope::ack()
    }
}

#[async_trait]
impl RoleBackend for InMemoryBackend {
    async fn list_roles(&self) -> Result<Envelope<Vec<RawRole>>> {
        self.tick();
        let failing = self.failures.read().list_roles;
        if let Some(failed) = self.read_failure(failing, "roles") {
            return failed;
        }
        Ok(Envelope::ok(self.store.read().roles.clone()))
    }

    async fn list_permissions(&self) -> Result<Envelope<Vec<RawPermission>>> {
        self.tick();
        let failing = self.failures.read().list_permissions;
        if let Some(failed) = self.read_failure(failing, "permissions") {
            return failed;
        }
        Ok(Envelope::ok(self.store.read().permissions.clone()))
    }

    async fn role_detail(&self, role_id: &RoleId) -> Result<Envelope<RawRoleDetail>> {
        self.tick();
        let failing = self.failures.read().role_detail;
        if let Some(failed) = self.read_failure(failing, "role detail") {
            return failed;
        }
        let store = self.store.read();
        let Some(role) = store.roles.iter().find(|r| &r.id == role_id) else {
            return Ok(Envelope::failure("role not found"));
        };
        let granted = store.grants.get(role_id).cloned().unwrap_or_default();
        let permissions = store
            .permissions
            .iter()
            .filter(|p| granted.contains(&p.id.to_string()))
            .map(|p| RawGrant::Nested {
                permission: RawGrantRef {
                    resource: Some(p.resource.clone()),
                    action: Some(p.action.clone()),
                },
            })
            .collect();
        Ok(Envelope::ok(RawRoleDetail {
            id: Some(role.id.clone()),
            name: Some(role.name.clone()),
            permissions,
        }))
    }

    async fn add_permissions(&self, role_id: &RoleId, body: Value) -> Result<Envelope<Value>> {
        self.tick();
        let Some((shape, items)) = Self::classify_add(&body) else {
            return Ok(Envelope::failure("unrecognized body"));
        };
        if !self.accepted_add.read().contains(&shape) {
            return Ok(Envelope::failure(format!("{:?} bodies are not accepted", shape)));
        }
        let Some(ids) = self.known_ids(items) else {
            return Ok(Envelope::failure("unknown permission id"));
        };
        let mut store = self.store.write();
        let Some(granted) = store.grants.get_mut(role_id) else {
            return Ok(Envelope::failure("role not found"));
        };
        granted.extend(ids);
        Ok(Envelope::ack())
    }

    async fn remove_permissions(
        &self,
        role_id: &RoleId,
        body: Value,
    ) -> Result<Envelope<Value>> {
        self.tick();
        if self.failures.read().remove_delete {
            return Ok(Envelope::failure("remove rejected"));
        }
        let items = body.get("data").and_then(|d| d.get("permissionIds"));
        Ok(self.remove_ids(role_id, items))
    }

    async fn remove_permissions_post(
        &self,
        role_id: &RoleId,
        body: Value,
    ) -> Result<Envelope<Value>> {
        self.tick();
        if self.failures.read().remove_post {
            return Ok(Envelope::failure("remove rejected"));
        }
        Ok(self.remove_ids(role_id, body.get("permissionIds")))
    }

    async fn reset_role(&self, role_id: &RoleId) -> Result<Envelope<Value>> {
        self.tick();
        if self.failures.read().reset {
            return Ok(Envelope::failure("reset rejected"));
        }
        let mut store = self.store.write();
        let Some(defaults) = store.defaults.get(role_id).cloned() else {
            return Ok(Envelope::failure("role not found"));
        };
        store.grants.insert(role_id.clone(), defaults);
        Ok(Envelope::ack())
    }
}
