//! Role directory commands.

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;
use tabled::Tabled;

use rolesync_core::engine::{DataSource, PermissionEngine};
use rolesync_core::rbac::Role;

use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum RolesCommands {
    /// List the roles the backend knows
    List,
}

#[derive(Serialize, Tabled)]
struct RoleRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Code")]
    code: String,
    #[tabled(rename = "Customized")]
    customized: bool,
    #[tabled(rename = "Description")]
    description: String,
}

impl From<Role> for RoleRow {
    fn from(role: Role) -> Self {
        Self {
            id: role.id.to_string(),
            name: role.name,
            code: role.code,
            customized: role.is_customized,
            description: role.description.unwrap_or_default(),
        }
    }
}

/// Warn when a dataset is not fresh from the backend.
pub fn report_source(dataset: &str, source: DataSource) {
    match source {
        DataSource::Server => {}
        DataSource::Fallback => output::print_warning(&format!(
            "Backend unavailable; showing built-in {}",
            dataset
        )),
        DataSource::Retained => {
            output::print_warning(&format!("Backend unavailable; no {} loaded", dataset))
        }
    }
}

pub async fn execute(cmd: &RolesCommands, engine: &PermissionEngine, format: OutputFormat) -> Result<()> {
    match cmd {
        RolesCommands::List => {
            let source = engine.load_roles().await;
            report_source("roles", source);
            let rows: Vec<RoleRow> = engine.roles().into_iter().map(RoleRow::from).collect();
            if format.is_table() {
                output::print_list(&rows, format)
            } else {
                output::print_item(&engine.roles(), format)
            }
        }
    }
}
