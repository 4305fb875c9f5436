//! Backend access for the role endpoints.
//!
//! This module provides pluggable backends:
//! - **HttpBackend**: `reqwest` client against a live REST backend
//! - **InMemoryBackend**: in-process role store for tests, demos and offline use
//!
//! Both answer with the raw [`Envelope`]; interpreting `success` is left to
//! the caller so fallbacks can tell transport failures from logical ones.

pub mod envelope;
pub mod http;
pub mod memory;

pub use envelope::Envelope;
pub use http::HttpBackend;
pub use memory::InMemoryBackend;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::rbac::{RawPermission, RawRole, RawRoleDetail, RoleId};

/// The role/permission endpoints the engine consumes.
#[async_trait]
pub trait RoleBackend: Send + Sync {
    /// `GET roles`
    async fn list_roles(&self) -> Result<Envelope<Vec<RawRole>>>;

    /// `GET roles/permissions`
    async fn list_permissions(&self) -> Result<Envelope<Vec<RawPermission>>>;

    /// `GET roles/{id}`
    async fn role_detail(&self, role_id: &RoleId) -> Result<Envelope<RawRoleDetail>>;

    /// `POST roles/{id}/permissions/add`
    async fn add_permissions(&self, role_id: &RoleId, body: Value) -> Result<Envelope<Value>>;

    /// `DELETE roles/{id}/permissions/remove`
    async fn remove_permissions(&self, role_id: &RoleId, body: Value)
        -> Result<Envelope<Value>>;

    /// `POST roles/{id}/permissions/remove`
    async fn remove_permissions_post(
        &self,
        role_id: &RoleId,
        body: Value,
    ) -> Result<Envelope<Value>>;

    /// `POST roles/{id}/reset`
    async fn reset_role(&self, role_id: &RoleId) -> Result<Envelope<Value>>;
}
