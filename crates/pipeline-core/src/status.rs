//! Pipeline status definitions
//!
//! A [`PipelineStatus`] is static configuration: it is loaded once as part of
//! a [`StatusTable`](crate::table::StatusTable) and never mutated afterwards.

use serde::{Deserialize, Serialize};

/// One stage of the lead pipeline
///
/// Field names accept both the snake_case spelling used by table files and
/// the camelCase spelling used by the web client, so a table exported from
/// the frontend can be validated server-side unchanged.
///
/// # Examples
///
/// ```rust
/// use telecrm_pipeline_core::PipelineStatus;
///
/// let status: PipelineStatus = serde_json::from_str(r#"{
///     "id": "qualified",
///     "label": "Qualified",
///     "noteRequired": true,
///     "allowedTransitions": ["negotiation"],
///     "priority": 5
/// }"#).unwrap();
///
/// assert!(status.note_required);
/// assert!(status.allows("negotiation"));
/// assert!(!status.is_terminal);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStatus {
    /// Stable slug, e.g. `new_uncontacted`
    pub id: String,
    /// Display label
    pub label: String,
    /// Longer display text
    #[serde(default)]
    pub description: String,
    /// A transition INTO this status must carry a non-empty note
    #[serde(default, alias = "noteRequired")]
    pub note_required: bool,
    /// Ids reachable directly from this status, in display order
    #[serde(default, alias = "allowedTransitions")]
    pub allowed_transitions: Vec<String>,
    /// No further business-meaningful transition exists
    #[serde(default, alias = "isTerminal")]
    pub is_terminal: bool,
    /// Default ordering in list and board views (ascending)
    #[serde(default)]
    pub priority: i32,
    /// Suggested note text offered when a lead enters this status
    #[serde(default, alias = "noteTemplates")]
    pub note_templates: Vec<String>,
}

impl PipelineStatus {
    /// Whether `target` is listed as a direct transition from this status
    pub fn allows(&self, target: &str) -> bool {
        self.allowed_transitions.iter().any(|t| t == target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_snake_case_fields() {
        let yaml = r#"
id: lost_closed_lost
label: Lost
note_required: true
is_terminal: true
priority: 9
"#;
        let status: PipelineStatus = serde_yaml::from_str(yaml).unwrap();
        assert!(status.is_terminal);
        assert!(status.note_required);
        assert!(status.allowed_transitions.is_empty());
        assert!(status.note_templates.is_empty());
        assert_eq!(status.description, "");
    }

    #[test]
    fn test_allows_is_directional() {
        let status = PipelineStatus {
            id: "contacted".into(),
            label: "Contacted".into(),
            description: String::new(),
            note_required: true,
            allowed_transitions: vec!["qualified".into()],
            is_terminal: false,
            priority: 3,
            note_templates: vec![],
        };
        assert!(status.allows("qualified"));
        assert!(!status.allows("contacted"));
    }
}
