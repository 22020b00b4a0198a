//! Property tests over the default pipeline table
//!
//! These exercise the public query functions against every status pair in
//! the table rather than a handful of hand-picked examples.

use std::collections::HashSet;

use telecrm_pipeline_core::{
    can_transition_to, default_table, get_active_statuses, get_next_possible_statuses,
    get_note_templates_for_status, get_status_by_id, get_terminal_statuses,
};

fn all_ids() -> Vec<String> {
    default_table().statuses().iter().map(|s| s.id.clone()).collect()
}

#[test]
fn test_every_transition_target_resolves() {
    for status in default_table().statuses() {
        for target in &status.allowed_transitions {
            assert!(
                get_status_by_id(target).is_some(),
                "status '{}' references undefined '{}'",
                status.id,
                target
            );
        }
    }
}

#[test]
fn test_can_transition_matches_membership_for_all_pairs() {
    let mut ids = all_ids();
    ids.push("unknown_status".to_string());
    ids.push(String::new());

    for from in &ids {
        for to in &ids {
            let expected = get_status_by_id(from)
                .map(|s| s.allowed_transitions.contains(to))
                .unwrap_or(false);
            assert_eq!(
                can_transition_to(from, to),
                expected,
                "can_transition_to({from:?}, {to:?})"
            );
        }
    }
}

#[test]
fn test_terminal_and_active_partition_the_table() {
    let terminal: HashSet<&str> = get_terminal_statuses().iter().map(|s| s.id.as_str()).collect();
    let active: HashSet<&str> = get_active_statuses().iter().map(|s| s.id.as_str()).collect();

    assert!(terminal.is_disjoint(&active));
    assert_eq!(terminal.len() + active.len(), default_table().len());

    assert_eq!(
        terminal,
        HashSet::from(["converted_closed_won", "lost_closed_lost"])
    );
    assert!(active.contains("not_interested"));
}

#[test]
fn test_documented_examples() {
    assert!(can_transition_to("new_uncontacted", "attempted_contact"));
    assert!(!can_transition_to("converted_closed_won", "qualified"));
    assert!(get_note_templates_for_status("unknown_status").is_empty());
}

#[test]
fn test_transitions_are_not_assumed_symmetric() {
    assert!(can_transition_to("contacted", "qualified"));
    assert!(!can_transition_to("qualified", "contacted"));
}

#[test]
fn test_next_possible_statuses_follow_table_order() {
    let status = get_status_by_id("qualified").unwrap();
    let next: Vec<&str> = get_next_possible_statuses("qualified")
        .iter()
        .map(|s| s.id.as_str())
        .collect();
    let listed: Vec<&str> = status.allowed_transitions.iter().map(String::as_str).collect();
    assert_eq!(next, listed);

    assert!(get_next_possible_statuses("lost_closed_lost").is_empty());
    assert!(get_next_possible_statuses("no_such_status").is_empty());
}

#[test]
fn test_terminal_statuses_have_no_transitions() {
    for status in get_terminal_statuses() {
        assert!(status.allowed_transitions.is_empty(), "{} is terminal", status.id);
    }
}

#[test]
fn test_every_status_offers_note_templates() {
    for id in all_ids() {
        assert!(
            !get_note_templates_for_status(&id).is_empty(),
            "no note templates for {id}"
        );
    }
}

#[test]
fn test_closing_statuses_require_notes() {
    for id in ["converted_closed_won", "lost_closed_lost", "not_interested"] {
        assert!(get_status_by_id(id).unwrap().note_required, "{id}");
    }
    assert!(!get_status_by_id("attempted_contact").unwrap().note_required);
}

#[test]
fn test_priorities_are_unique() {
    let priorities: HashSet<i32> = default_table().statuses().iter().map(|s| s.priority).collect();
    assert_eq!(priorities.len(), default_table().len());
}
