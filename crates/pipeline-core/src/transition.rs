//! Transition-commit contract
//!
//! Before a new status is written onto a lead, the caller confirms that the
//! move is allowed and that a note accompanies it when the target requires
//! one. The table only answers "is this allowed"; persisting the change is
//! the caller's job.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::table::StatusTable;

/// A validated status change, ready to be persisted on a lead record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: String,
    pub to: String,
    /// Trimmed note text, `None` when no (non-blank) note was supplied
    pub note: Option<String>,
}

impl StatusTable {
    /// Check a proposed lead transition without building a change record
    ///
    /// # Errors
    ///
    /// * `PipelineError::UnknownStatus` - `from` or `to` is not in the table
    /// * `PipelineError::TransitionNotAllowed` - `to` is not reachable from `from`
    /// * `PipelineError::NoteRequired` - the target needs a note and none was given
    pub fn validate_transition(
        &self,
        from: &str,
        to: &str,
        note: Option<&str>,
    ) -> PipelineResult<()> {
        if !self.contains(from) {
            return Err(PipelineError::unknown_status(from));
        }
        let target = self.get(to).ok_or_else(|| PipelineError::unknown_status(to))?;

        if !self.can_transition(from, to) {
            return Err(PipelineError::TransitionNotAllowed {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        if target.note_required && normalize_note(note).is_none() {
            return Err(PipelineError::NoteRequired { status: to.to_string() });
        }

        Ok(())
    }

    /// Validate a transition and package it for the caller to persist
    ///
    /// # Examples
    ///
    /// ```rust
    /// use telecrm_pipeline_core::{default_table, PipelineError};
    ///
    /// let table = default_table();
    ///
    /// let change = table
    ///     .advance("new_uncontacted", "attempted_contact", None)
    ///     .unwrap();
    /// assert_eq!(change.to, "attempted_contact");
    ///
    /// // `qualified` requires a note
    /// let err = table.advance("contacted", "qualified", Some("   ")).unwrap_err();
    /// assert!(matches!(err, PipelineError::NoteRequired { .. }));
    /// ```
    pub fn advance(
        &self,
        from: &str,
        to: &str,
        note: Option<&str>,
    ) -> PipelineResult<StatusChange> {
        self.validate_transition(from, to, note)?;
        Ok(StatusChange {
            from: from.to_string(),
            to: to.to_string(),
            note: normalize_note(note),
        })
    }
}

fn normalize_note(note: Option<&str>) -> Option<String> {
    note.map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> StatusTable {
        StatusTable::embedded_default().unwrap()
    }

    #[test]
    fn test_note_not_required_for_attempted_contact() {
        let change = table()
            .advance("new_uncontacted", "attempted_contact", None)
            .unwrap();
        assert_eq!(change.from, "new_uncontacted");
        assert_eq!(change.note, None);
    }

    #[test]
    fn test_note_is_trimmed() {
        let change = table()
            .advance("contacted", "qualified", Some("  budget confirmed \n"))
            .unwrap();
        assert_eq!(change.note.as_deref(), Some("budget confirmed"));
    }

    #[test]
    fn test_missing_note_rejected() {
        let err = table().validate_transition("qualified", "negotiation", None).unwrap_err();
        assert!(matches!(err, PipelineError::NoteRequired { ref status } if status == "negotiation"));
    }

    #[test]
    fn test_terminal_status_cannot_move() {
        let err = table()
            .validate_transition("converted_closed_won", "qualified", Some("reopen"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::TransitionNotAllowed { .. }));
    }

    #[test]
    fn test_unknown_ids_reported() {
        let t = table();
        assert!(matches!(
            t.validate_transition("bogus", "qualified", Some("n")).unwrap_err(),
            PipelineError::UnknownStatus { ref id } if id == "bogus"
        ));
        assert!(matches!(
            t.validate_transition("contacted", "bogus", Some("n")).unwrap_err(),
            PipelineError::UnknownStatus { ref id } if id == "bogus"
        ));
    }

    #[test]
    fn test_not_interested_can_return_to_follow_up() {
        let change = table()
            .advance("not_interested", "follow_up_scheduled", Some("call after Diwali"))
            .unwrap();
        assert_eq!(change.to, "follow_up_scheduled");
    }
}
