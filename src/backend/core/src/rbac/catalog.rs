//! The global catalog of grantable permissions.
//!
//! Built from raw backend records by dropping inactive entries, merging
//! records that normalize to the same key, and sorting for stable display.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::debug;

use super::models::{Permission, PermissionId, PermissionKey, RawPermission};

/// Ordered permission list plus a key → id lookup table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PermissionCatalog {
    permissions: Vec<Permission>,
    #[serde(skip)]
    ids: HashMap<PermissionKey, PermissionId>,
}

/// Permissions of one resource, in display order.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceGroup<'a> {
    pub resource: &'a str,
    pub permissions: Vec<&'a Permission>,
}

impl PermissionCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the catalog from raw records.
    ///
    /// On key collision the first record keeps its id and fields; a later
    /// duplicate only contributes a description when the first had none.
    pub fn from_raw(records: impl IntoIterator<Item = RawPermission>) -> Self {
        let mut merged: Vec<Permission> = Vec::new();
        let mut index: HashMap<PermissionKey, usize> = HashMap::new();
        let mut dropped_inactive = 0usize;
        let mut merged_duplicates = 0usize;

        for raw in records {
            if !raw.is_active {
                dropped_inactive += 1;
                continue;
            }
            let perm = Permission::from(raw);
            let key = perm.key();

            match index.get(&key) {
                Some(&pos) => {
                    merged_duplicates += 1;
                    let existing = &mut merged[pos];
                    if !existing.has_description() && perm.has_description() {
                        existing.description = perm.description;
                    }
                }
                None => {
                    index.insert(key, merged.len());
                    merged.push(perm);
                }
            }
        }

        merged.sort_by(|a, b| {
            (a.resource.as_str(), a.action.as_str(), a.description.as_deref().unwrap_or(""))
                .cmp(&(
                    b.resource.as_str(),
                    b.action.as_str(),
                    b.description.as_deref().unwrap_or(""),
                ))
        });

        let ids = merged.iter().map(|p| (p.key(), p.id.clone())).collect();

        debug!(
            permissions = merged.len(),
            dropped_inactive,
            merged_duplicates,
            "Permission catalog built"
        );

        Self {
            permissions: merged,
            ids,
        }
    }

    pub fn permissions(&self) -> &[Permission] {
        &self.permissions
    }

    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    pub fn contains(&self, key: &PermissionKey) -> bool {
        self.ids.contains_key(key)
    }

    /// Resolve a key to the permission id the backend expects.
    pub fn id_of(&self, key: &PermissionKey) -> Option<&PermissionId> {
        self.ids.get(key)
    }

    pub fn lookup(&self, key: &PermissionKey) -> Option<&Permission> {
        self.permissions.iter().find(|p| &p.key() == key)
    }

    /// Every key in display order.
    pub fn keys(&self) -> impl Iterator<Item = PermissionKey> + '_ {
        self.permissions.iter().map(Permission::key)
    }

    /// Keys belonging to one (normalized) resource.
    pub fn keys_for_resource<'a>(&'a self, resource: &'a str) -> impl Iterator<Item = PermissionKey> + 'a {
        self.permissions
            .iter()
            .filter(move |p| p.resource == resource)
            .map(Permission::key)
    }

    /// Distinct resources in display order.
    pub fn resources(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for p in &self.permissions {
            if out.last() != Some(&p.resource.as_str()) {
                out.push(&p.resource);
            }
        }
        out
    }

    /// Permissions grouped by resource.
    pub fn grouped(&self) -> Vec<ResourceGroup<'_>> {
        let mut groups: BTreeMap<&str, Vec<&Permission>> = BTreeMap::new();
        for p in &self.permissions {
            groups.entry(p.resource.as_str()).or_default().push(p);
        }
        groups
            .into_iter()
            .map(|(resource, permissions)| ResourceGroup {
                resource,
                permissions,
            })
            .collect()
    }

    /// Case-insensitive match on key, name, display name or description.
    pub fn search(&self, term: &str) -> Vec<&Permission> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return self.permissions.iter().collect();
        }
        self.permissions
            .iter()
            .filter(|p| {
                p.key().as_str().contains(&needle)
                    || p.name.to_lowercase().contains(&needle)
                    || p
                        .display_name
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
                    || p
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: i64, resource: &str, action: &str, description: Option<&str>) -> RawPermission {
        RawPermission {
            id: PermissionId::Number(id),
            resource: resource.to_string(),
            action: action.to_string(),
            name: Some(format!("{}_{}", resource, action)),
            display_name: None,
            description: description.map(str::to_string),
            is_active: true,
        }
    }

    #[test]
    fn test_drops_inactive() {
        let mut inactive = raw(2, "orders", "delete", None);
        inactive.is_active = false;
        let catalog = PermissionCatalog::from_raw(vec![raw(1, "orders", "view", None), inactive]);
        assert_eq!(catalog.len(), 1);
        assert!(!catalog.contains(&PermissionKey::new("orders", "delete")));
    }

    #[test]
    fn test_duplicate_enriches_missing_description_either_order() {
        let a = raw(1, "Orders", "read", None);
        let b = raw(2, "orders", "view", Some("X"));

        let forward = PermissionCatalog::from_raw(vec![a.clone(), b.clone()]);
        let backward = PermissionCatalog::from_raw(vec![b, a]);

        for catalog in [&forward, &backward] {
            assert_eq!(catalog.len(), 1);
            assert_eq!(catalog.permissions()[0].description.as_deref(), Some("X"));
        }
        // first record keeps its identity
        assert_eq!(forward.permissions()[0].id, PermissionId::Number(1));
        assert_eq!(backward.permissions()[0].id, PermissionId::Number(2));
    }

    #[test]
    fn test_duplicate_never_overwrites_description() {
        let catalog = PermissionCatalog::from_raw(vec![
            raw(1, "orders", "view", Some("first")),
            raw(2, "orders", "read", Some("second")),
        ]);
        assert_eq!(catalog.permissions()[0].description.as_deref(), Some("first"));
    }

    #[test]
    fn test_blank_description_counts_as_missing() {
        let catalog = PermissionCatalog::from_raw(vec![
            raw(1, "orders", "view", Some("  ")),
            raw(2, "orders", "read", Some("Y")),
        ]);
        assert_eq!(catalog.permissions()[0].description.as_deref(), Some("Y"));
    }

    #[test]
    fn test_sorted_and_lookup() {
        let catalog = PermissionCatalog::from_raw(vec![
            raw(3, "orders", "view", None),
            raw(1, "dealers", "update", None),
            raw(2, "dealers", "create", None),
        ]);
        let keys: Vec<String> = catalog.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["dealers:create", "dealers:update", "orders:view"]);
        assert_eq!(
            catalog.id_of(&PermissionKey::new("dealer", "edit")),
            Some(&PermissionId::Number(1))
        );
        assert_eq!(catalog.resources(), vec!["dealers", "orders"]);
    }

    #[test]
    fn test_grouped_and_search() {
        let mut described = raw(4, "reports", "export", None);
        described.display_name = Some("Export Sales Report".into());
        let catalog = PermissionCatalog::from_raw(vec![
            raw(1, "orders", "view", None),
            raw(2, "orders", "create", None),
            described,
        ]);

        let groups = catalog.grouped();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].resource, "orders");
        assert_eq!(groups[0].permissions.len(), 2);

        assert_eq!(catalog.search("SALES").len(), 1);
        assert_eq!(catalog.search("orders:").len(), 2);
        assert_eq!(catalog.search("").len(), 3);
        assert_eq!(catalog.keys_for_resource("orders").count(), 2);
    }
}
