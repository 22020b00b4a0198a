//! # telecrm-pipeline-core
//!
//! Lead pipeline status machine for the telecalling CRM.
//!
//! The pipeline is a fixed, directed graph of named statuses. Each status
//! declares which statuses are directly reachable from it, whether entering
//! it requires a note, and whether it is terminal. The UI uses these rules to
//! decide which transition buttons to offer; any backend validation layer can
//! re-check a transition with the same functions before persisting it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────┐
//! │  UI / backend validation │
//! └────────────┬─────────────┘
//!              │ can_transition_to(), advance()
//! ┌────────────▼─────────────┐
//! │       StatusTable        │ ◄── validated once at load
//! │  index + ordered table   │
//! └────────────┬─────────────┘
//!              │
//! ┌────────────▼─────────────┐
//! │ embedded default YAML or │
//! │ $TELECRM_PIPELINE_TABLE  │
//! └──────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use telecrm_pipeline_core::{
//!     can_transition_to, get_next_possible_statuses, get_status_by_id,
//!     get_note_templates_for_status,
//! };
//!
//! assert!(can_transition_to("new_uncontacted", "attempted_contact"));
//! assert!(!can_transition_to("converted_closed_won", "qualified"));
//!
//! let qualified = get_status_by_id("qualified").unwrap();
//! assert!(qualified.note_required);
//!
//! let next: Vec<&str> = get_next_possible_statuses("negotiation")
//!     .iter()
//!     .map(|s| s.id.as_str())
//!     .collect();
//! assert!(next.contains(&"converted_closed_won"));
//!
//! assert!(get_note_templates_for_status("unknown_status").is_empty());
//! ```
//!
//! The free functions operate on [`default_table`]. Custom tables can be
//! built with [`StatusTable::new`], [`StatusTable::from_yaml_str`] or
//! [`StatusTable::load_from_file`]; they go through the same validation.

pub mod error;
pub mod status;
pub mod table;
pub mod transition;

pub use error::{PipelineError, PipelineResult, TableViolation};
pub use status::PipelineStatus;
pub use table::StatusTable;
pub use transition::StatusChange;

use std::sync::LazyLock;

/// Environment variable pointing at a table file that replaces the default
pub const TABLE_PATH_ENV: &str = "TELECRM_PIPELINE_TABLE";

static DEFAULT_TABLE: LazyLock<StatusTable> = LazyLock::new(build_default_table);

fn build_default_table() -> StatusTable {
    if let Ok(custom_path) = std::env::var(TABLE_PATH_ENV) {
        tracing::info!("Loading custom pipeline table from: {}", custom_path);
        match StatusTable::load_from_file(&custom_path) {
            Ok(table) => {
                tracing::info!(statuses = table.len(), "Loaded custom pipeline table");
                return table;
            }
            Err(e) => {
                tracing::error!(
                    path = %custom_path,
                    error = %e,
                    "Custom pipeline table rejected, falling back to default"
                );
            }
        }
    }

    StatusTable::embedded_default().expect("Embedded default pipeline table must be valid")
}

/// The process-wide status table, loaded on first use
pub fn default_table() -> &'static StatusTable {
    &DEFAULT_TABLE
}

/// Look up a status in the default table
pub fn get_status_by_id(id: &str) -> Option<&'static PipelineStatus> {
    default_table().get(id)
}

/// Whether `to_id` is directly reachable from `from_id`; `false` for an
/// unknown `from_id`
pub fn can_transition_to(from_id: &str, to_id: &str) -> bool {
    default_table().can_transition(from_id, to_id)
}

/// Statuses reachable from `current_id`, in the order the table lists them
pub fn get_next_possible_statuses(current_id: &str) -> Vec<&'static PipelineStatus> {
    default_table().next_statuses(current_id)
}

pub fn get_terminal_statuses() -> Vec<&'static PipelineStatus> {
    default_table().terminal_statuses()
}

pub fn get_active_statuses() -> Vec<&'static PipelineStatus> {
    default_table().active_statuses()
}

/// Suggested notes for a status; empty for unrecognized ids
pub fn get_note_templates_for_status(status_id: &str) -> Vec<String> {
    default_table().note_templates(status_id)
}

/// Pipeline-core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
