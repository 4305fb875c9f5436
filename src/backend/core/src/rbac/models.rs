//! RBAC data models: identifiers, permission keys, catalog permissions,
//! roles, and the raw wire records the backend returns.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use super::normalize::{normalize_action, normalize_resource};

// ═══════════════════════════════════════════════════════════════════════════════
// Identifiers
// ═══════════════════════════════════════════════════════════════════════════════

/// Strongly-typed role identifier.
///
/// Backends send role ids as numbers or strings; both deserialize into the
/// same textual form used in request paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RoleId(pub String);

impl RoleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RoleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RoleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl<'de> Deserialize<'de> for RoleId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self(PermissionId::deserialize(deserializer)?.to_string()))
    }
}

/// Permission identifier, kept in the JSON type the backend used so it can be
/// echoed back unchanged in add/remove bodies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PermissionId {
    Number(i64),
    Text(String),
}

impl fmt::Display for PermissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for PermissionId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for PermissionId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Permission Key
// ═══════════════════════════════════════════════════════════════════════════════

/// Canonical `"resource:action"` key identifying one grantable capability.
///
/// Construction always normalizes both halves, so two keys compare equal iff
/// they name the same capability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PermissionKey(String);

impl PermissionKey {
    /// Build from raw resource and action strings.
    pub fn new(resource: &str, action: &str) -> Self {
        Self(format!(
            "{}:{}",
            normalize_resource(resource),
            normalize_action(action)
        ))
    }

    /// Parse `"resource:action"`, normalizing both halves.
    ///
    /// Returns `None` without a colon or when either half normalizes to empty.
    pub fn parse(s: &str) -> Option<Self> {
        let (resource, action) = s.split_once(':')?;
        let key = Self::new(resource, action);
        if key.resource().is_empty() || key.action().is_empty() {
            return None;
        }
        Some(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn resource(&self) -> &str {
        self.0.split_once(':').map(|(r, _)| r).unwrap_or(&self.0)
    }

    pub fn action(&self) -> &str {
        self.0.split_once(':').map(|(_, a)| a).unwrap_or("")
    }
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PermissionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid permission key: {}", raw)))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Permission
// ═══════════════════════════════════════════════════════════════════════════════

/// A grantable permission from the catalog, with canonical resource/action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: PermissionId,
    pub resource: String,
    pub action: String,
    pub name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
}

impl Permission {
    /// Identity of this permission.
    pub fn key(&self) -> PermissionKey {
        PermissionKey::new(&self.resource, &self.action)
    }

    /// Label for display: display name, then name, then the key.
    pub fn label(&self) -> String {
        self.display_name
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or(Some(self.name.as_str()).filter(|s| !s.trim().is_empty()))
            .map(str::to_string)
            .unwrap_or_else(|| self.key().to_string())
    }

    pub fn has_description(&self) -> bool {
        self.description
            .as_deref()
            .is_some_and(|d| !d.trim().is_empty())
    }
}

impl From<RawPermission> for Permission {
    fn from(raw: RawPermission) -> Self {
        Self {
            id: raw.id,
            resource: normalize_resource(&raw.resource),
            action: normalize_action(&raw.action),
            name: raw.name.unwrap_or_default(),
            display_name: raw.display_name,
            description: raw.description,
            is_active: raw.is_active,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Role
// ═══════════════════════════════════════════════════════════════════════════════

/// A role as the engine presents it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: RoleId,
    /// Display name.
    pub name: String,
    /// System identifier (e.g. `ADMIN`).
    pub code: String,
    pub description: Option<String>,
    pub is_customized: bool,
}

impl Role {
    pub fn new(id: impl Into<String>, name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: RoleId::new(id),
            name: name.into(),
            code: code.into(),
            description: None,
            is_customized: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl From<RawRole> for Role {
    fn from(raw: RawRole) -> Self {
        let display = raw
            .display_name
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| raw.name.clone());
        Self {
            id: raw.id,
            name: display,
            code: raw.name,
            description: raw.description,
            is_customized: raw.is_customized,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Wire Records
// ═══════════════════════════════════════════════════════════════════════════════

/// Permission record as returned by `GET roles/permissions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPermission {
    pub id: PermissionId,
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Role record as returned by `GET roles`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRole {
    pub id: RoleId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_customized: bool,
}

/// Role detail as returned by `GET roles/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRoleDetail {
    #[serde(default)]
    pub id: Option<RoleId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub permissions: Vec<RawGrant>,
}

/// A granted permission entry inside a role detail.
///
/// Backends either inline `resource`/`action` or nest them under a
/// `permission` object (join-table shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawGrant {
    Nested { permission: RawGrantRef },
    Flat(RawGrantRef),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawGrantRef {
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
}

impl RawGrant {
    /// Canonical key, or `None` when resource or action is missing/blank.
    pub fn key(&self) -> Option<PermissionKey> {
        let inner = match self {
            Self::Nested { permission } => permission,
            Self::Flat(inner) => inner,
        };
        let resource = inner.resource.as_deref()?;
        let action = inner.action.as_deref()?;
        let key = PermissionKey::new(resource, action);
        if key.resource().is_empty() || key.action().is_empty() {
            None
        } else {
            Some(key)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
