//! Canonicalization of resource and action identifiers.
//!
//! Backends are inconsistent about how they spell the same capability:
//! `Vehicle_Model`, `vehicle model`, `vehicle-models`; `read`, `view`, `get`.
//! Everything is folded into lower-kebab form and then passed through a
//! static alias table. Both functions are pure and idempotent.
//!
//! | Raw                   | Canonical         |
//! |-----------------------|-------------------|
//! | `Dealer`              | `dealers`         |
//! | `vehicle_model`       | `vehicle-models`  |
//! | ` READ `              | `view`            |
//! | `Edit`                | `update`          |
//! | `remove`              | `delete`          |

/// Resource aliases. Targets must not appear as sources.
const RESOURCE_ALIASES: &[(&str, &str)] = &[
    ("dealer", "dealers"),
    ("order", "orders"),
    ("user", "users"),
    ("role", "roles"),
    ("permission", "permissions"),
    ("report", "reports"),
    ("color", "colors"),
    ("colour", "colors"),
    ("colours", "colors"),
    ("vehicle", "vehicles"),
    ("vehicle-model", "vehicle-models"),
    ("vehiclemodel", "vehicle-models"),
    ("vehiclemodels", "vehicle-models"),
    ("model", "vehicle-models"),
    ("models", "vehicle-models"),
    ("inventory", "inventories"),
    ("customer", "customers"),
    ("promotion", "promotions"),
    ("dashboard", "dashboards"),
];

/// Action aliases. Targets must not appear as sources.
const ACTION_ALIASES: &[(&str, &str)] = &[
    ("read", "view"),
    ("get", "view"),
    ("list", "view"),
    ("show", "view"),
    ("edit", "update"),
    ("modify", "update"),
    ("put", "update"),
    ("patch", "update"),
    ("remove", "delete"),
    ("destroy", "delete"),
    ("add", "create"),
    ("new", "create"),
    ("post", "create"),
    ("approval", "approve"),
    ("export-data", "export"),
];

/// Lowercase, trim, and collapse `_` / whitespace / repeated `-` into single `-`.
pub fn collapse_separators(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_dash = false;

    for ch in raw.trim().chars() {
        if ch == '_' || ch == '-' || ch.is_whitespace() {
            pending_dash = !out.is_empty();
            continue;
        }
        if pending_dash {
            out.push('-');
            pending_dash = false;
        }
        out.extend(ch.to_lowercase());
    }

    out
}

fn apply_alias(table: &[(&str, &str)], value: String) -> String {
    table
        .iter()
        .find(|(from, _)| *from == value)
        .map(|(_, to)| (*to).to_string())
        .unwrap_or(value)
}

/// Canonical resource key.
pub fn normalize_resource(raw: &str) -> String {
    apply_alias(RESOURCE_ALIASES, collapse_separators(raw))
}

/// Canonical action key.
pub fn normalize_action(raw: &str) -> String {
    apply_alias(ACTION_ALIASES, collapse_separators(raw))
}
