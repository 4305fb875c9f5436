//! Static role directory used when the backend cannot be reached.
//!
//! Four built-in roles keep the engine operable offline:
//!
//! | Code      | Display         | Sample grants                                  |
//! |-----------|-----------------|------------------------------------------------|
//! | ADMIN     | Administrator   | Everything in the sample resource set          |
//! | MANAGER   | Manager         | Orders, dealers, inventories, reports          |
//! | STAFF     | Staff           | Day-to-day order handling, read-only elsewhere |
//! | DEALER    | Dealer          | Own orders and inventory, read-only catalog    |

use std::collections::BTreeSet;

use super::models::{PermissionKey, Role};

/// Built-in fallback roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackRole {
    Admin,
    Manager,
    Staff,
    Dealer,
}

const SAMPLE_RESOURCES: &[&str] = &[
    "orders",
    "dealers",
    "inventories",
    "vehicles",
    "vehicle-models",
    "colors",
    "reports",
    "users",
    "roles",
];

const CRUD: &[&str] = &["view", "create", "update", "delete"];

impl FallbackRole {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Admin => "1",
            Self::Manager => "2",
            Self::Staff => "3",
            Self::Dealer => "4",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Manager => "MANAGER",
            Self::Staff => "STAFF",
            Self::Dealer => "DEALER",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Admin => "Administrator",
            Self::Manager => "Manager",
            Self::Staff => "Staff",
            Self::Dealer => "Dealer",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Admin => "Full access to every module",
            Self::Manager => "Manage orders, dealers, inventory and reports",
            Self::Staff => "Handle orders; read-only access elsewhere",
            Self::Dealer => "Manage own orders and inventory",
        }
    }

    /// Look up by system code (exact match, as the backend sends it).
    pub fn from_code(code: &str) -> Option<Self> {
        Self::all().into_iter().find(|r| r.code() == code)
    }

    /// Deterministic sample grant set for this role.
    pub fn sample_permissions(&self) -> BTreeSet<PermissionKey> {
        let mut keys = BTreeSet::new();
        let mut grant = |resource: &str, actions: &[&str]| grant_into(&mut keys, resource, actions);

        match self {
            Self::Admin => {
                for resource in SAMPLE_RESOURCES {
                    grant(*resource, CRUD);
                }
                grant("orders", &["approve"]);
                grant("reports", &["export"]);
            }
            Self::Manager => {
                grant("orders", &["view", "create", "update", "approve"]);
                grant("dealers", CRUD);
                grant("inventories", &["view", "update"]);
                grant("vehicles", &["view"]);
                grant("vehicle-models", &["view"]);
                grant("reports", &["view", "export"]);
            }
            Self::Staff => {
                grant("orders", &["view", "create", "update"]);
                grant("dealers", &["view"]);
                grant("inventories", &["view"]);
                grant("vehicles", &["view"]);
            }
            Self::Dealer => {
                grant("orders", &["view", "create"]);
                grant("inventories", &["view", "update"]);
                grant("vehicles", &["view"]);
                grant("vehicle-models", &["view"]);
                grant("colors", &["view"]);
            }
        }

        keys
    }

    pub fn to_role(&self) -> Role {
        Role::new(self.id(), self.display_name(), self.code()).with_description(self.description())
    }

    pub fn all() -> Vec<FallbackRole> {
        vec![Self::Admin, Self::Manager, Self::Staff, Self::Dealer]
    }

    /// The full fallback directory.
    pub fn directory() -> Vec<Role> {
        Self::all().into_iter().map(|r| r.to_role()).collect()
    }
}

fn grant_into(keys: &mut BTreeSet<PermissionKey>, resource: &str, actions: &[&str]) {
    for action in actions {
        keys.insert(PermissionKey::new(resource, action));
    }
}

/// Sample baseline for a role code; unknown codes get an empty set.
pub fn sample_baseline(code: &str) -> BTreeSet<PermissionKey> {
    FallbackRole::from_code(code)
        .map(|r| r.sample_permissions())
        .unwrap_or_default()
}
