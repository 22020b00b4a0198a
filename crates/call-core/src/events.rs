//! Call status events and subscriber fan-out

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

use crate::call::{CallId, CallStatus};

/// Notification sent to subscribers whenever the call status changes, and
/// once per second while the call is connected
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStatusEvent {
    pub status: CallStatus,
    /// Talk time in whole seconds, zero until answered
    pub duration: u64,
    /// Session the event belongs to; `None` when no session was created
    pub call_id: Option<CallId>,
    /// Present on failed events
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl CallStatusEvent {
    pub fn new(status: CallStatus, duration: u64, call_id: Option<CallId>) -> Self {
        Self {
            status,
            duration,
            call_id,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(call_id: Option<CallId>, duration: u64, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(CallStatus::Failed, duration, call_id)
        }
    }
}

/// Callback invoked synchronously for each status event
pub type StatusListener = Arc<dyn Fn(&CallStatusEvent) + Send + Sync>;

/// Handle returned by a subscription, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Ordered list of status listeners
///
/// Listeners run in registration order on the emitting task. A panicking
/// listener is logged and skipped; the remaining listeners still run.
/// Listeners must not block.
pub struct EventEmitter {
    listeners: RwLock<Vec<(SubscriptionId, StatusListener)>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, listener: StatusListener) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.listeners.write().push((id, listener));
        id
    }

    /// Remove a listener; `false` if the id is unknown or already removed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        match listeners.iter().position(|(existing, _)| *existing == id) {
            Some(pos) => {
                listeners.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Deliver an event to every current listener
    pub fn emit(&self, event: &CallStatusEvent) {
        // Snapshot so listeners may subscribe or unsubscribe while running
        let listeners = self.listeners.read().clone();

        for (id, listener) in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                error!(
                    subscription = %id,
                    status = %event.status,
                    "Status listener panicked"
                );
            }
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> StatusListener) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let make = {
            let log = log.clone();
            move |name: &'static str| -> StatusListener {
                let log = log.clone();
                Arc::new(move |event: &CallStatusEvent| {
                    log.lock().push(format!("{name}:{}", event.status));
                })
            }
        };
        (log, make)
    }

    #[test]
    fn test_listeners_run_in_registration_order() {
        let emitter = EventEmitter::new();
        let (log, make) = recorder();
        emitter.subscribe(make("a"));
        emitter.subscribe(make("b"));

        emitter.emit(&CallStatusEvent::new(CallStatus::Ringing, 0, None));
        assert_eq!(*log.lock(), vec!["a:ringing", "b:ringing"]);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let emitter = EventEmitter::new();
        let (log, make) = recorder();
        let id = emitter.subscribe(make("a"));

        assert!(emitter.unsubscribe(id));
        assert!(!emitter.unsubscribe(id));
        assert_eq!(emitter.subscription_count(), 0);

        emitter.emit(&CallStatusEvent::new(CallStatus::Ended, 3, None));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let emitter = EventEmitter::new();
        let (log, make) = recorder();
        emitter.subscribe(Arc::new(|_: &CallStatusEvent| panic!("listener bug")));
        emitter.subscribe(make("after"));

        emitter.emit(&CallStatusEvent::new(CallStatus::Answered, 0, None));
        assert_eq!(*log.lock(), vec!["after:answered"]);
    }

    #[test]
    fn test_failed_event_carries_error() {
        let event = CallStatusEvent::failed(None, 0, "Invalid phone number");
        assert_eq!(event.status, CallStatus::Failed);
        assert_eq!(event.error.as_deref(), Some("Invalid phone number"));
        assert_eq!(event.call_id, None);
    }
}
