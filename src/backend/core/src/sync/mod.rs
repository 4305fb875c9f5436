//! Synchronization of a permission diff with the backend.
//!
//! - **strategy**: the named request shapes each phase may use
//! - **protocol**: the interpreter that walks those shapes
//! - **report**: per-phase outcomes and the derived save status

pub mod protocol;
pub mod report;
pub mod strategy;

pub use protocol::{resolve_ids, ResolvedKeys, SyncProtocol};
pub use report::{PhaseOutcome, SaveReport, SaveStatus};
pub use strategy::{AddShape, RemoveShape, RequestShape, SyncPhase};
