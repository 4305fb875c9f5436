//! Per-role commands: show, edit and reset grants.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use serde::Serialize;
use tabled::Tabled;

use rolesync_core::engine::{Baseline, EditOutcome, PermissionEngine};
use rolesync_core::rbac::{PermissionCatalog, PermissionKey, Role};
use rolesync_core::sync::{PhaseOutcome, SaveReport};

use crate::commands::roles::report_source;
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum RoleCommands {
    /// Show the grants of one role
    Show {
        /// Role id or code (e.g. 3 or STAFF)
        role: String,
    },

    /// Grant or revoke permissions and push the changes
    Edit {
        /// Role id or code
        role: String,

        /// Keys to grant, as "resource:action"
        #[arg(short, long, value_parser = parse_key)]
        grant: Vec<PermissionKey>,

        /// Keys to revoke, as "resource:action"
        #[arg(short, long, value_parser = parse_key)]
        revoke: Vec<PermissionKey>,

        /// Grant every catalog action of a resource
        #[arg(long)]
        grant_resource: Vec<String>,

        /// Revoke every granted action of a resource
        #[arg(long)]
        revoke_resource: Vec<String>,

        /// Print the pending changes without saving
        #[arg(long)]
        dry_run: bool,
    },

    /// Restore the role's default grants
    Reset {
        /// Role id or code
        role: String,

        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}

fn parse_key(raw: &str) -> std::result::Result<PermissionKey, String> {
    PermissionKey::parse(raw).ok_or_else(|| format!("'{}' is not a resource:action pair", raw))
}

#[derive(Serialize, Tabled)]
struct GrantRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "In Catalog")]
    in_catalog: bool,
}

fn grant_rows(catalog: &PermissionCatalog, baseline: &Baseline) -> Vec<GrantRow> {
    baseline
        .keys
        .iter()
        .map(|key| {
            let permission = catalog.lookup(key);
            GrantRow {
                key: key.to_string(),
                label: permission.map(|p| p.label()).unwrap_or_default(),
                in_catalog: permission.is_some(),
            }
        })
        .collect()
}

/// Load catalog and roles, then make `needle` the current role.
async fn open_role(engine: &PermissionEngine, needle: &str) -> Result<(Role, Baseline)> {
    let (catalog, roles) = engine.bootstrap().await;
    report_source("permissions", catalog);
    report_source("roles", roles);

    let role = engine
        .find_role(needle)
        .with_context(|| format!("No role with id or code '{}'", needle))?;
    let baseline = engine.select_role(&role.id).await?;
    if baseline.is_fallback() {
        output::print_warning(&format!(
            "Could not load grants of {}; showing sample grants",
            role.code
        ));
    }
    Ok((role, baseline))
}

fn report_edit(verb: &str, outcome: &EditOutcome) {
    for key in &outcome.rejected {
        output::print_warning(&format!("Not {}: {} is not in the catalog", verb, key));
    }
}

fn describe_phase(outcome: &PhaseOutcome) -> String {
    match outcome {
        PhaseOutcome::Skipped => "skipped".dimmed().to_string(),
        PhaseOutcome::NotAttempted => "not attempted".yellow().to_string(),
        PhaseOutcome::Succeeded { strategy, attempts } => format!(
            "{} via {} ({} attempt{})",
            "ok".green(),
            strategy,
            attempts,
            if *attempts == 1 { "" } else { "s" }
        ),
        PhaseOutcome::Failed { attempts, last_error } => format!(
            "{} after {} attempts ({})",
            "failed".red(),
            attempts,
            last_error.as_deref().unwrap_or("no response")
        ),
    }
}

fn print_report(report: &SaveReport, format: OutputFormat) -> Result<()> {
    if !format.is_table() {
        return output::print_item(report, format);
    }
    output::print_header(&format!("Save {}: {}", report.role_id, report.status()));
    output::print_detail("add", &describe_phase(&report.add));
    output::print_detail("remove", &describe_phase(&report.remove));
    for key in &report.unresolved {
        output::print_warning(&format!("{} has no permission id; sent by key only", key));
    }
    if !report.baseline_refreshed && report.any_applied() {
        output::print_warning("Saved, but the refreshed grants could not be loaded");
    }
    Ok(())
}

pub async fn execute(cmd: &RoleCommands, engine: &PermissionEngine, format: OutputFormat) -> Result<()> {
    match cmd {
        RoleCommands::Show { role } => {
            let (role, baseline) = open_role(engine, role).await?;
            if format.is_table() {
                output::print_header(&format!("{} ({})", role.name, role.code));
                output::print_detail("id", role.id.as_str());
                output::print_detail("source", &format!("{:?}", baseline.source).to_lowercase());
                println!();
                output::print_list(&grant_rows(&engine.catalog(), &baseline), format)
            } else {
                output::print_item(&baseline, format)
            }
        }

        RoleCommands::Edit {
            role,
            grant,
            revoke,
            grant_resource,
            revoke_resource,
            dry_run,
        } => {
            let (role, _) = open_role(engine, role).await?;

            report_edit("granted", &engine.grant(grant.iter().cloned())?);
            for resource in grant_resource {
                report_edit("granted", &engine.grant_resource(resource)?);
            }
            engine.revoke(revoke.iter().cloned())?;
            for resource in revoke_resource {
                engine.revoke_resource(resource)?;
            }

            let pending = engine.pending_diff();
            if pending.is_empty() {
                output::print_info(&format!("{} already matches; nothing to save", role.code));
                return Ok(());
            }

            if format.is_table() {
                output::print_header(&format!("Pending changes for {}", role.code));
                for key in &pending.added {
                    println!("{}", output::change_line('+', key.as_str()));
                }
                for key in &pending.removed {
                    println!("{}", output::change_line('-', key.as_str()));
                }
            }

            if *dry_run {
                if format.is_table() {
                    output::print_info("Dry run; nothing saved");
                    return Ok(());
                }
                return output::print_item(&pending, format);
            }

            let report = engine.save().await?;
            print_report(&report, format)?;
            report.into_result()?;
            if format.is_table() {
                output::print_success(&format!("Saved {} change(s) to {}", pending.len(), role.code));
            }
            Ok(())
        }

        RoleCommands::Reset { role, force } => {
            if !force {
                output::print_info(&format!(
                    "This will restore the default grants of '{}'. Use --force to confirm.",
                    role
                ));
                return Ok(());
            }

            let (role, _) = open_role(engine, role).await?;
            let baseline = engine.reset_to_default().await?;
            if format.is_table() {
                output::print_success(&format!("{} reset to defaults", role.code));
                output::print_list(&grant_rows(&engine.catalog(), &baseline), format)
            } else {
                output::print_item(&baseline, format)
            }
        }
    }
}
