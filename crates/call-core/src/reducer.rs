//! Status reducer for a single call session
//!
//! Status reports arrive from three independent sources: the gateway poller,
//! the media bridge and explicit user actions. They can arrive late, twice or
//! out of order. [`CallStateMachine`] is the only place a session's status
//! changes; every report goes through [`CallStateMachine::apply`], which
//! decides whether it advances the call.

use tokio::time::Instant;

use crate::call::CallStatus;

/// Outcome of feeding a status report into the reducer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Status changed; subscribers should be told
    Applied { from: CallStatus, to: CallStatus },
    /// Report repeats the current status
    Duplicate,
    /// Session already ended; report discarded
    IgnoredTerminal,
    /// Report would move the call backwards
    Regressed { current: CallStatus, attempted: CallStatus },
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied { .. })
    }
}

/// Lifecycle state and talk-time clock of one call
#[derive(Debug, Clone)]
pub struct CallStateMachine {
    status: CallStatus,
    answered_at: Option<Instant>,
    final_duration: Option<u64>,
}

impl CallStateMachine {
    pub fn new() -> Self {
        Self {
            status: CallStatus::Idle,
            answered_at: None,
            final_duration: None,
        }
    }

    pub fn status(&self) -> CallStatus {
        self.status
    }

    /// Instant of the first answered report
    pub fn answered_at(&self) -> Option<Instant> {
        self.answered_at
    }

    /// Feed one status report
    ///
    /// The talk-time clock starts on the first answered report and freezes on
    /// the first terminal one.
    pub fn apply(&mut self, next: CallStatus, now: Instant) -> Transition {
        if self.status.is_terminal() {
            return Transition::IgnoredTerminal;
        }
        if next == self.status {
            return Transition::Duplicate;
        }
        if !self.status.can_transition_to(next) {
            return Transition::Regressed {
                current: self.status,
                attempted: next,
            };
        }

        let from = self.status;
        self.status = next;

        if next == CallStatus::Answered && self.answered_at.is_none() {
            self.answered_at = Some(now);
        }
        if next.is_terminal() {
            self.final_duration = Some(self.elapsed(now));
        }

        Transition::Applied { from, to: next }
    }

    /// Whole seconds since the call was answered
    ///
    /// Zero before answer; fixed once the call has ended.
    pub fn duration_at(&self, now: Instant) -> u64 {
        self.final_duration.unwrap_or_else(|| self.elapsed(now))
    }

    fn elapsed(&self, now: Instant) -> u64 {
        self.answered_at
            .map(|t| now.saturating_duration_since(t).as_secs())
            .unwrap_or(0)
    }
}

impl Default for CallStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_happy_path() {
        let t0 = Instant::now();
        let mut machine = CallStateMachine::new();

        for status in [CallStatus::Initiated, CallStatus::Connecting, CallStatus::Ringing] {
            assert!(machine.apply(status, t0).is_applied());
        }
        assert_eq!(machine.duration_at(t0), 0);

        machine.apply(CallStatus::Answered, t0);
        assert_eq!(machine.duration_at(t0 + Duration::from_millis(2500)), 2);

        let ended = machine.apply(CallStatus::Ended, t0 + Duration::from_secs(7));
        assert_eq!(
            ended,
            Transition::Applied {
                from: CallStatus::Answered,
                to: CallStatus::Ended
            }
        );
        assert_eq!(machine.duration_at(t0 + Duration::from_secs(60)), 7);
    }

    #[test]
    fn test_late_reports_are_discarded() {
        let now = Instant::now();
        let mut machine = CallStateMachine::new();
        machine.apply(CallStatus::Connecting, now);
        machine.apply(CallStatus::Answered, now);

        assert_eq!(machine.apply(CallStatus::Answered, now), Transition::Duplicate);
        assert_eq!(
            machine.apply(CallStatus::Ringing, now),
            Transition::Regressed {
                current: CallStatus::Answered,
                attempted: CallStatus::Ringing
            }
        );
        assert_eq!(machine.status(), CallStatus::Answered);
    }

    #[test]
    fn test_nothing_after_terminal() {
        let now = Instant::now();
        let mut machine = CallStateMachine::new();
        machine.apply(CallStatus::Connecting, now);
        assert!(machine.apply(CallStatus::Busy, now).is_applied());

        for status in [CallStatus::Answered, CallStatus::Ended, CallStatus::Failed] {
            assert_eq!(machine.apply(status, now), Transition::IgnoredTerminal);
        }
        assert_eq!(machine.status(), CallStatus::Busy);
        assert_eq!(machine.duration_at(now), 0);
    }

    #[test]
    fn test_answer_time_kept_across_hold() {
        let t0 = Instant::now();
        let mut machine = CallStateMachine::new();
        machine.apply(CallStatus::Answered, t0);
        machine.apply(CallStatus::OnHold, t0 + Duration::from_secs(3));
        machine.apply(CallStatus::Answered, t0 + Duration::from_secs(5));

        assert_eq!(machine.answered_at(), Some(t0));
        assert_eq!(machine.duration_at(t0 + Duration::from_secs(9)), 9);
    }
}
