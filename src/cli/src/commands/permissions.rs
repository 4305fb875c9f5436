//! Permission catalog commands.

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;
use tabled::Tabled;

use rolesync_core::engine::PermissionEngine;
use rolesync_core::rbac::{normalize_resource, Permission, PermissionKey};

use crate::commands::roles::report_source;
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum PermissionsCommands {
    /// List the permission catalog
    List {
        /// Only permissions of this resource (any spelling, e.g. "Order")
        #[arg(short, long)]
        resource: Option<String>,

        /// Case-insensitive search over key, name and description
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show the canonical form of permission keys
    Normalize {
        /// Keys as "resource:action"
        #[arg(required = true)]
        keys: Vec<String>,
    },
}

#[derive(Serialize, Tabled)]
struct PermissionRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Description")]
    description: String,
}

impl From<&Permission> for PermissionRow {
    fn from(p: &Permission) -> Self {
        Self {
            key: p.key().to_string(),
            id: p.id.to_string(),
            label: p.label(),
            description: p.description.clone().unwrap_or_default(),
        }
    }
}

#[derive(Serialize, Tabled)]
struct NormalizedRow {
    #[tabled(rename = "Input")]
    input: String,
    #[tabled(rename = "Key")]
    key: String,
}

pub async fn execute(
    cmd: &PermissionsCommands,
    engine: &PermissionEngine,
    format: OutputFormat,
) -> Result<()> {
    match cmd {
        PermissionsCommands::List { resource, search } => {
            let source = engine.load_catalog().await;
            report_source("permissions", source);

            let catalog = engine.catalog();
            let resource = resource.as_deref().map(normalize_resource);
            let matches: Vec<&Permission> = catalog
                .search(search.as_deref().unwrap_or(""))
                .into_iter()
                .filter(|p| resource.as_deref().map_or(true, |r| p.resource == r))
                .collect();

            if format.is_table() {
                let rows: Vec<PermissionRow> =
                    matches.into_iter().map(PermissionRow::from).collect();
                output::print_list(&rows, format)
            } else {
                output::print_item(&matches, format)
            }
        }

        PermissionsCommands::Normalize { keys } => {
            let rows = keys
                .iter()
                .map(|input| {
                    PermissionKey::parse(input)
                        .map(|key| NormalizedRow {
                            input: input.clone(),
                            key: key.to_string(),
                        })
                        .ok_or_else(|| {
                            anyhow::anyhow!("'{}' is not a resource:action pair", input)
                        })
                })
                .collect::<Result<Vec<_>>>()?;
            output::print_list(&rows, format)
        }
    }
}
