//! Per-navigation access guard.
//!
//! Every activation of a protected route runs two checks in order:
//!
//! 1. **Identity**: a non-empty token and a non-empty role must be present,
//!    otherwise the navigation is sent to the login destination.
//! 2. **Authorization**: the route's allowed-role list is empty (any
//!    authenticated identity) or contains the current role verbatim,
//!    otherwise the navigation is sent to the forbidden destination with the
//!    attempted path attached.
//!
//! The identity is read from the [`IdentityProvider`] on every call; nothing
//! is remembered between navigations.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use rolesync_core::config::GuardConfig;
//! use rolesync_core::rbac::{AccessGuard, GuardDecision, RouteRule, StaticIdentity};
//!
//! let guard = AccessGuard::new(
//!     GuardConfig::default(),
//!     Arc::new(StaticIdentity::new("tok", "STAFF")),
//! );
//! let decision = guard.evaluate("/reports", &RouteRule::roles(["ADMIN"]));
//! assert!(matches!(decision, GuardDecision::RedirectForbidden { .. }));
//! ```

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::GuardConfig;
use crate::telemetry::TokenRedactor;

// ═══════════════════════════════════════════════════════════════════════════════
// Identity
// ═══════════════════════════════════════════════════════════════════════════════

/// The caller's current credentials as the guard sees them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub token: Option<String>,
    pub role: Option<String>,
}

impl Identity {
    pub fn new(token: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            role: Some(role.into()),
        }
    }

    /// No token, no role.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Both token and role present and non-blank.
    pub fn is_authenticated(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.token) && present(&self.role)
    }
}

/// Source of the current identity, consulted on every evaluation.
pub trait IdentityProvider: Send + Sync {
    fn identity(&self) -> Identity;
}

/// An identity fixed at construction.
#[derive(Debug, Clone)]
pub struct StaticIdentity(Identity);

impl StaticIdentity {
    pub fn new(token: impl Into<String>, role: impl Into<String>) -> Self {
        Self(Identity::new(token, role))
    }

    pub fn anonymous() -> Self {
        Self(Identity::anonymous())
    }
}

impl From<Identity> for StaticIdentity {
    fn from(identity: Identity) -> Self {
        Self(identity)
    }
}

impl IdentityProvider for StaticIdentity {
    fn identity(&self) -> Identity {
        self.0.clone()
    }
}

/// An identity that can be swapped at runtime (login, logout, token refresh).
///
/// Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct SharedIdentity {
    inner: Arc<RwLock<Identity>>,
}

impl SharedIdentity {
    pub fn new(identity: Identity) -> Self {
        Self {
            inner: Arc::new(RwLock::new(identity)),
        }
    }

    pub fn set(&self, identity: Identity) {
        *self.inner.write() = identity;
    }

    /// Forget the current identity.
    pub fn clear(&self) {
        self.set(Identity::anonymous());
    }
}

impl IdentityProvider for SharedIdentity {
    fn identity(&self) -> Identity {
        self.inner.read().clone()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Route Rules & Decisions
// ═══════════════════════════════════════════════════════════════════════════════

/// Access rule declared by a protected route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRule {
    /// Roles allowed in. Empty means any authenticated identity.
    #[serde(default)]
    pub allowed_roles: Vec<String>,
}

impl RouteRule {
    /// Any authenticated identity.
    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Exact, case-sensitive membership.
    pub fn permits(&self, role: &str) -> bool {
        self.allowed_roles.is_empty() || self.allowed_roles.iter().any(|r| r == role)
    }
}

/// Context handed to the forbidden destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationState {
    /// The path the caller attempted to open.
    pub from: String,
}

/// Outcome of one guard evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GuardDecision {
    /// Show the protected content.
    Render,
    /// Not authenticated.
    RedirectLogin { redirect: String },
    /// Authenticated but the role is not allowed.
    RedirectForbidden {
        redirect: String,
        state: NavigationState,
    },
}

impl GuardDecision {
    pub fn is_render(&self) -> bool {
        matches!(self, Self::Render)
    }

    /// Redirect target, if any.
    pub fn redirect(&self) -> Option<&str> {
        match self {
            Self::Render => None,
            Self::RedirectLogin { redirect } | Self::RedirectForbidden { redirect, .. } => {
                Some(redirect)
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Guard
// ═══════════════════════════════════════════════════════════════════════════════

/// Evaluates protected-route activations against the current identity.
#[derive(Clone)]
pub struct AccessGuard {
    config: GuardConfig,
    identity: Arc<dyn IdentityProvider>,
}

impl AccessGuard {
    pub fn new(config: GuardConfig, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { config, identity }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Decide whether `path` may render under `rule`.
    pub fn evaluate(&self, path: &str, rule: &RouteRule) -> GuardDecision {
        let identity = self.identity.identity();
        let redactor = TokenRedactor::global();
        let token = identity.token.as_deref().unwrap_or("");

        if !identity.is_authenticated() {
            info!(
                path = %path,
                token = %redactor.redact("token", token),
                "Unauthenticated navigation redirected to login"
            );
            return GuardDecision::RedirectLogin {
                redirect: self.config.login_path.clone(),
            };
        }

        let role = identity.role.as_deref().unwrap_or("");
        if !rule.permits(role) {
            info!(
                path = %path,
                role = %role,
                allowed = ?rule.allowed_roles,
                "Navigation forbidden for role"
            );
            return GuardDecision::RedirectForbidden {
                redirect: self.config.forbidden_path.clone(),
                state: NavigationState {
                    from: path.to_string(),
                },
            };
        }

        debug!(path = %path, role = %role, "Navigation allowed");
        GuardDecision::Render
    }
}

impl std::fmt::Debug for AccessGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGuard")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn guard(identity: impl IdentityProvider + 'static) -> AccessGuard {
        AccessGuard::new(GuardConfig::default(), Arc::new(identity))
    }

    #[test]
    fn test_missing_token_redirects_to_login() {
        let g = guard(StaticIdentity::from(Identity {
            token: None,
            role: Some("ADMIN".into()),
        }));
        assert_eq!(
            g.evaluate("/orders", &RouteRule::authenticated()),
            GuardDecision::RedirectLogin {
                redirect: "/login".into()
            }
        );
    }

    #[test]
    fn test_blank_role_redirects_to_login() {
        let g = guard(StaticIdentity::new("tok", "  "));
        assert_eq!(
            g.evaluate("/orders", &RouteRule::roles(["ADMIN"])).redirect(),
            Some("/login")
        );
    }

    #[test]
    fn test_wrong_role_redirects_to_forbidden_with_origin() {
        let g = guard(StaticIdentity::new("tok", "STAFF"));
        let decision = g.evaluate("/admin/roles", &RouteRule::roles(["ADMIN"]));
        assert_eq!(
            decision,
            GuardDecision::RedirectForbidden {
                redirect: "/forbidden".into(),
                state: NavigationState {
                    from: "/admin/roles".into()
                },
            }
        );
    }

    #[test]
    fn test_empty_allow_list_admits_any_authenticated_role() {
        for role in ["ADMIN", "STAFF", "DEALER", "something-else"] {
            let g = guard(StaticIdentity::new("tok", role));
            assert!(g.evaluate("/dashboard", &RouteRule::authenticated()).is_render());
        }
    }

    #[test]
    fn test_role_match_is_exact() {
        let g = guard(StaticIdentity::new("tok", "admin"));
        assert!(!g.evaluate("/x", &RouteRule::roles(["ADMIN"])).is_render());
        let g = guard(StaticIdentity::new("tok", "ADMIN"));
        assert!(g.evaluate("/x", &RouteRule::roles(["MANAGER", "ADMIN"])).is_render());
    }

    #[test]
    fn test_shared_identity_is_reread_every_navigation() {
        let shared = SharedIdentity::new(Identity::new("tok", "ADMIN"));
        let g = guard(shared.clone());
        let rule = RouteRule::roles(["ADMIN"]);

        assert!(g.evaluate("/roles", &rule).is_render());
        shared.clear();
        assert_eq!(g.evaluate("/roles", &rule).redirect(), Some("/login"));
        shared.set(Identity::new("tok2", "STAFF"));
        assert_eq!(g.evaluate("/roles", &rule).redirect(), Some("/forbidden"));
    }

    #[test]
    fn test_custom_destinations() {
        let config = GuardConfig {
            login_path: "/auth/sign-in".into(),
            forbidden_path: "/403".into(),
        };
        let g = AccessGuard::new(config, Arc::new(StaticIdentity::anonymous()));
        assert_eq!(
            g.evaluate("/x", &RouteRule::authenticated()).redirect(),
            Some("/auth/sign-in")
        );
    }

    #[test]
    fn test_decision_serialization() {
        let decision = GuardDecision::RedirectForbidden {
            redirect: "/forbidden".into(),
            state: NavigationState {
                from: "/orders".into(),
            },
        };
        assert_eq!(
            serde_json::to_value(&decision).unwrap(),
            json!({
                "decision": "redirect_forbidden",
                "redirect": "/forbidden",
                "state": {"from": "/orders"}
            })
        );
        assert_eq!(
            serde_json::to_value(GuardDecision::Render).unwrap(),
            json!({"decision": "render"})
        );
    }

    #[test]
    fn test_route_rule_deserializes_camel_case() {
        let rule: RouteRule = serde_json::from_value(json!({"allowedRoles": ["ADMIN"]})).unwrap();
        assert!(rule.permits("ADMIN"));
        let open: RouteRule = serde_json::from_value(json!({})).unwrap();
        assert!(open.permits("ANYONE"));
    }
}
