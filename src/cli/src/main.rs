//! RoleSync CLI - Command-line interface for reconciling role permissions.
//!
//! Provides commands for roles, the permission catalog, per-role edits,
//! access-guard checks, and local configuration.

mod commands;
mod output;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

use rolesync_core::config::Config;
use rolesync_core::engine::PermissionEngine;
use rolesync_core::telemetry::{init_telemetry, LogFormat, LoggingConfig};

use commands::{config, guard, permissions, role, roles};
use output::OutputFormat;

const DEFAULT_BACKEND_URL: &str = "http://localhost:8080/api";

/// RoleSync - Role-Permission Reconciliation CLI
#[derive(Parser)]
#[command(
    name = "rolesync",
    author = "Aezi <aezi.zhu@icloud.com>",
    version = "0.1.0",
    about = "RoleSync - Role-Permission Reconciliation",
    long_about = "CLI tool for inspecting role grants, editing them against the permission catalog, and checking route access.",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// Backend base URL (the `roles` endpoints hang off it)
    #[arg(long, global = true, env = "ROLESYNC_BACKEND_URL")]
    backend_url: Option<String>,

    /// Bearer token for the backend
    #[arg(long, global = true, env = "ROLESYNC_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Fail instead of substituting fallback roles and sample grants
    #[arg(long, global = true)]
    no_fallback: bool,

    /// Log engine activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Role directory operations
    #[command(subcommand)]
    Roles(roles::RolesCommands),

    /// Permission catalog operations
    #[command(subcommand)]
    Permissions(permissions::PermissionsCommands),

    /// Inspect and edit one role's grants
    #[command(subcommand)]
    Role(role::RoleCommands),

    /// Evaluate the access guard for a route
    #[command(subcommand)]
    Guard(guard::GuardCommands),

    /// Configuration management
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

impl Cli {
    /// Engine configuration.
    ///
    /// Precedence, highest first: flags, `ROLESYNC__*` environment variables,
    /// the config file, then CLI defaults.
    fn settings(&self) -> Result<Config> {
        let base_url =
            config::load_value("backend-url").unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
        let file_token = config::load_value("token");

        let mut defaults = vec![
            ("backend.base_url", base_url.as_str()),
            ("engine.auto_select_first_role", "false"),
            ("logging.level", "warn"),
            ("logging.format", "compact"),
        ];
        if let Some(token) = file_token.as_deref() {
            defaults.push(("backend.auth_token", token));
        }

        let mut cfg = Config::load_with_defaults(&defaults)?;
        if let Some(url) = &self.backend_url {
            cfg.backend.base_url = url.clone();
        }
        if let Some(token) = &self.token {
            cfg.backend.auth_token = Some(token.clone());
        }
        if self.no_fallback {
            cfg.engine.fallback_enabled = false;
        }
        if self.verbose {
            cfg.logging.level = "debug".to_string();
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let settings = cli.settings();
    let logging = match &settings {
        Ok(cfg) => cfg.logging.clone(),
        Err(_) => LoggingConfig {
            level: if cli.verbose { "debug" } else { "warn" }.to_string(),
            format: LogFormat::Compact,
            ..LoggingConfig::default()
        },
    };
    init_telemetry(&logging)?;

    let format = cli.output;
    let result = async {
        let loaded = || settings.as_ref().map_err(|e| anyhow!("{:#}", e));
        let engine = || -> Result<PermissionEngine> {
            Ok(PermissionEngine::from_config(loaded()?)?)
        };
        match &cli.command {
            Commands::Roles(cmd) => roles::execute(cmd, &engine()?, format).await,
            Commands::Permissions(cmd) => permissions::execute(cmd, &engine()?, format).await,
            Commands::Role(cmd) => role::execute(cmd, &engine()?, format).await,
            Commands::Guard(cmd) => guard::execute(cmd, loaded()?, format),
            Commands::Config(cmd) => config::execute(cmd, format),
        }
    }
    .await;

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
