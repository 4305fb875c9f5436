//! Subcommand implementations.

pub mod config;
pub mod guard;
pub mod permissions;
pub mod role;
pub mod roles;
