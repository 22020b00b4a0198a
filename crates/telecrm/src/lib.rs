//! # telecrm - telecalling CRM core
//!
//! This crate bundles the two engines behind the agent dialer screen:
//!
//! - **Call Core**: outbound call sessions over the telephony gateway, with an
//!   optional WebRTC media bridge and a single ordered status event stream
//! - **Pipeline Core**: the lead pipeline status table, transition rules and
//!   note requirements
//!
//! ## Quick Start
//!
//! ```rust
//! use telecrm::prelude::*;
//!
//! // Which buttons to offer for a lead that was just reached
//! let next: Vec<&str> = get_next_possible_statuses("contacted")
//!     .iter()
//!     .map(|s| s.id.as_str())
//!     .collect();
//! assert!(next.contains(&"qualified"));
//!
//! // Where the call engine expects its gateway by default
//! let config = EngineConfig::default();
//! assert!(config.gateway_url().unwrap().as_str().ends_with('/'));
//! ```
//!
//! ## Module Structure
//!
//! - [`call_core`]: call sessions, gateway and media adapters
//! - [`pipeline_core`]: lead status table and transitions

#![deny(missing_docs)]
#![warn(rust_2018_idioms)]

pub use telecrm_call_core as call_core;
pub use telecrm_pipeline_core as pipeline_core;

pub mod prelude {
    //! Common imports for telecrm applications

    pub use crate::call_core::{
        CallEngine, CallEngineBuilder, CallError, CallId, CallOptions, CallResult, CallSession,
        CallStatus, CallStatusEvent, ConcurrentCallPolicy, EngineConfig, SubscriptionId,
    };
    pub use crate::pipeline_core::{
        PipelineError, PipelineResult, PipelineStatus, StatusChange, StatusTable, can_transition_to,
        default_table, get_active_statuses, get_next_possible_statuses,
        get_note_templates_for_status, get_status_by_id, get_terminal_statuses,
    };
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate description
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
