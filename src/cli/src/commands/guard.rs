//! Access guard commands.

use anyhow::Result;
use clap::Subcommand;
use std::sync::Arc;

use rolesync_core::config::Config;
use rolesync_core::rbac::{AccessGuard, GuardDecision, Identity, RouteRule, StaticIdentity};

use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum GuardCommands {
    /// Decide whether an identity may open a protected route
    Check {
        /// Route path being navigated to
        path: String,

        /// Role of the identity (omit to check an identity without a role)
        #[arg(long)]
        role: Option<String>,

        /// Roles the route allows; none means any authenticated identity
        #[arg(short, long = "allow")]
        allowed: Vec<String>,

        /// Treat the identity as having no token
        #[arg(long)]
        anonymous: bool,
    },
}

pub fn execute(cmd: &GuardCommands, config: &Config, format: OutputFormat) -> Result<()> {
    match cmd {
        GuardCommands::Check {
            path,
            role,
            allowed,
            anonymous,
        } => {
            let identity = Identity {
                token: if *anonymous {
                    None
                } else {
                    config.backend.auth_token.clone()
                },
                role: role.clone(),
            };
            let guard = AccessGuard::new(
                config.guard.clone(),
                Arc::new(StaticIdentity::from(identity)),
            );
            let rule = RouteRule::roles(allowed.iter().cloned());
            let decision = guard.evaluate(path, &rule);

            if !format.is_table() {
                return output::print_item(&decision, format);
            }
            match &decision {
                GuardDecision::Render => output::print_success(&format!("{} renders", path)),
                GuardDecision::RedirectLogin { redirect } => output::print_warning(&format!(
                    "{} redirects to {} (not authenticated)",
                    path, redirect
                )),
                GuardDecision::RedirectForbidden { redirect, state } => {
                    output::print_warning(&format!(
                        "{} redirects to {} (role not allowed; from = {})",
                        path, redirect, state.from
                    ))
                }
            }
            Ok(())
        }
    }
}
