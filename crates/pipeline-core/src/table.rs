//! Validated status table
//!
//! [`StatusTable`] is the single place where pipeline business rules live.
//! Construction runs every integrity check; once a table exists, every id it
//! references is guaranteed to resolve for the lifetime of the table.
//!
//! # Examples
//!
//! ```rust
//! use telecrm_pipeline_core::StatusTable;
//!
//! let table = StatusTable::from_yaml_str(r#"
//! statuses:
//!   - id: open
//!     label: Open
//!     allowed_transitions: [won, lost]
//!   - id: won
//!     label: Won
//!     is_terminal: true
//!   - id: lost
//!     label: Lost
//!     is_terminal: true
//!     note_required: true
//! "#).unwrap();
//!
//! assert!(table.can_transition("open", "won"));
//! assert!(!table.can_transition("won", "open"));
//! assert_eq!(table.terminal_statuses().len(), 2);
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult, TableViolation};
use crate::status::PipelineStatus;

/// Embedded default pipeline definition
const DEFAULT_TABLE_YAML: &str = include_str!("tables/default_pipeline.yaml");

/// On-disk layout of a table definition
#[derive(Debug, Deserialize)]
struct TableDocument {
    statuses: Vec<PipelineStatus>,
}

/// An immutable, integrity-checked set of pipeline statuses
#[derive(Debug, Clone)]
pub struct StatusTable {
    statuses: Vec<PipelineStatus>,
    index: HashMap<String, usize>,
}

impl StatusTable {
    /// Build a table, checking referential integrity and terminal rules
    ///
    /// All violations are collected and reported together.
    pub fn new(statuses: Vec<PipelineStatus>) -> PipelineResult<Self> {
        let violations = Self::check(&statuses);
        if !violations.is_empty() {
            return Err(PipelineError::InvalidTable { violations });
        }

        let index = statuses
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();

        Ok(Self { statuses, index })
    }

    fn check(statuses: &[PipelineStatus]) -> Vec<TableViolation> {
        let mut violations = Vec::new();

        if statuses.is_empty() {
            violations.push(TableViolation::Empty);
            return violations;
        }

        let mut seen = HashSet::new();
        for (index, status) in statuses.iter().enumerate() {
            if status.id.trim().is_empty() {
                violations.push(TableViolation::EmptyId { index });
            } else if !seen.insert(status.id.as_str()) {
                violations.push(TableViolation::DuplicateId { id: status.id.clone() });
            }
        }

        for status in statuses {
            for target in &status.allowed_transitions {
                if !seen.contains(target.as_str()) {
                    violations.push(TableViolation::DanglingTransition {
                        from: status.id.clone(),
                        to: target.clone(),
                    });
                }
            }

            if status.is_terminal && !status.allowed_transitions.is_empty() {
                violations.push(TableViolation::TerminalWithTransitions { id: status.id.clone() });
            }
            if !status.is_terminal && status.allowed_transitions.is_empty() {
                violations.push(TableViolation::DeadEnd { id: status.id.clone() });
            }
        }

        violations
    }

    /// Parse and validate a YAML table definition
    pub fn from_yaml_str(yaml: &str) -> PipelineResult<Self> {
        let doc: TableDocument = serde_yaml::from_str(yaml)?;
        Self::new(doc.statuses)
    }

    /// Parse and validate a JSON table definition
    ///
    /// Accepts either `{"statuses": [...]}` or a bare array of statuses, which
    /// is the shape the web client keeps in its configuration module.
    pub fn from_json_str(json: &str) -> PipelineResult<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let statuses: Vec<PipelineStatus> = if value.is_array() {
            serde_json::from_value(value)?
        } else {
            serde_json::from_value::<TableDocument>(value)?.statuses
        };
        Self::new(statuses)
    }

    /// Load a table definition from disk; `.json` files are parsed as JSON,
    /// everything else as YAML
    pub fn load_from_file(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| PipelineError::TableIo {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        debug!(path = %path.display(), json = is_json, "Loading pipeline status table");
        if is_json {
            Self::from_json_str(&contents)
        } else {
            Self::from_yaml_str(&contents)
        }
    }

    /// The pipeline definition compiled into this crate
    pub fn embedded_default() -> PipelineResult<Self> {
        Self::from_yaml_str(DEFAULT_TABLE_YAML)
    }

    /// Look up a status by id
    pub fn get(&self, id: &str) -> Option<&PipelineStatus> {
        self.index.get(id).map(|&i| &self.statuses[i])
    }

    /// Whether `id` names a status in this table
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// `true` iff `to` appears in `from`'s allowed transitions; `false` for an
    /// unknown `from`
    pub fn can_transition(&self, from: &str, to: &str) -> bool {
        self.get(from).is_some_and(|s| s.allows(to))
    }

    /// Resolve the allowed transitions of `current` to full statuses
    ///
    /// Ids that fail to resolve are skipped. Unknown `current` yields an empty
    /// list.
    pub fn next_statuses(&self, current: &str) -> Vec<&PipelineStatus> {
        match self.get(current) {
            Some(status) => status
                .allowed_transitions
                .iter()
                .filter_map(|id| self.get(id))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Statuses with no further business transition
    pub fn terminal_statuses(&self) -> Vec<&PipelineStatus> {
        self.statuses.iter().filter(|s| s.is_terminal).collect()
    }

    /// Statuses a lead can still move out of
    pub fn active_statuses(&self) -> Vec<&PipelineStatus> {
        self.statuses.iter().filter(|s| !s.is_terminal).collect()
    }

    /// Suggested notes for `id`, empty for unknown ids
    pub fn note_templates(&self, id: &str) -> Vec<String> {
        self.get(id)
            .map(|s| s.note_templates.clone())
            .unwrap_or_default()
    }

    /// All statuses in definition order
    pub fn statuses(&self) -> &[PipelineStatus] {
        &self.statuses
    }

    /// All statuses sorted by `priority`, ties kept in definition order
    pub fn statuses_by_priority(&self) -> Vec<&PipelineStatus> {
        let mut ordered: Vec<&PipelineStatus> = self.statuses.iter().collect();
        ordered.sort_by_key(|s| s.priority);
        ordered
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }
}
