//! Call session engine
//!
//! [`CallEngine`] owns at most one outbound call. It acquires the microphone,
//! asks the gateway to place the call, bridges media when the gateway offers
//! a bridge, and reconciles status reports from the gateway poller and the
//! peer connection into a single ordered stream of [`CallStatusEvent`]s.
//!
//! # Lifecycle
//!
//! ```text
//! Idle -> Initiated -> Connecting -> Ringing -> Answered -> Ended
//!                          |            |           |
//!                          +------------+-----------+--> Failed | Busy | NoAnswer
//! ```
//!
//! Every terminal status runs the same cleanup: background tasks stop, the
//! peer connection closes and the microphone is released. The next
//! [`CallEngine::make_call`] re-acquires it.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use telecrm_call_core::testing::{FakeMediaCapture, ScriptedGateway};
//! use telecrm_call_core::{CallEngine, CallOptions, CallStatus};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let gateway = Arc::new(ScriptedGateway::new());
//! gateway.script_statuses(["in-progress"]);
//!
//! let engine = CallEngine::builder()
//!     .gateway(gateway)
//!     .media(Arc::new(FakeMediaCapture::granted()))
//!     .build()
//!     .unwrap();
//!
//! engine.on_status_change(|event| println!("{} ({}s)", event.status, event.duration));
//!
//! assert!(engine.initialize().await);
//! let session = engine.make_call(CallOptions::new("+919800000001")).await.unwrap();
//! assert_eq!(session.status, CallStatus::Connecting);
//!
//! assert!(engine.end_call().await);
//! assert!(engine.current_call().is_none());
//! # }
//! ```

mod builder;
mod calls;
mod controls;
mod monitor;

pub use builder::CallEngineBuilder;

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::call::{CallId, CallSession, CallStatus};
use crate::config::EngineConfig;
use crate::events::{CallStatusEvent, EventEmitter, StatusListener, SubscriptionId};
use crate::gateway::TelephonyGateway;
use crate::media::{LocalMedia, MediaCapture, PeerConnection, PeerConnectionFactory, RemoteMedia, SignalingChannel};
use crate::reducer::CallStateMachine;

/// A `make_call` that has not heard back from the gateway yet
#[derive(Debug)]
struct PendingAttempt {
    id: CallId,
    cancelled: bool,
}

/// The session being tracked plus everything that must be torn down with it
struct ActiveCall {
    session: CallSession,
    machine: CallStateMachine,
    peer: Option<Arc<dyn PeerConnection>>,
    bridge_connected: bool,
    remote_media: Option<RemoteMedia>,
    poll_task: Option<JoinHandle<()>>,
    ticker_task: Option<JoinHandle<()>>,
    peer_task: Option<JoinHandle<()>>,
}

impl ActiveCall {
    fn new(session: CallSession, machine: CallStateMachine) -> Self {
        Self {
            session,
            machine,
            peer: None,
            bridge_connected: false,
            remote_media: None,
            poll_task: None,
            ticker_task: None,
            peer_task: None,
        }
    }

    /// Stop background work and close the bridge
    fn release(mut self) {
        for task in [self.poll_task.take(), self.ticker_task.take(), self.peer_task.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
        if let Some(peer) = self.peer.take() {
            peer.close();
        }
    }
}

#[derive(Default)]
struct EngineState {
    initialized: bool,
    local_media: Option<LocalMedia>,
    active: Option<ActiveCall>,
    pending: Option<PendingAttempt>,
    /// Talk time of the most recently finished session
    last_duration: u64,
}

impl EngineState {
    fn current(&self, call_id: CallId) -> Option<&ActiveCall> {
        self.active.as_ref().filter(|a| a.session.id == call_id)
    }

    fn current_mut(&mut self, call_id: CallId) -> Option<&mut ActiveCall> {
        self.active.as_mut().filter(|a| a.session.id == call_id)
    }
}

struct EngineInner {
    config: EngineConfig,
    gateway: Arc<dyn TelephonyGateway>,
    media: Arc<dyn MediaCapture>,
    peers: Option<Arc<dyn PeerConnectionFactory>>,
    signaling: Option<Arc<dyn SignalingChannel>>,
    emitter: EventEmitter,
    /// Held from the state change until listeners return, so events reach
    /// subscribers in the order the changes were made
    emit_lock: Mutex<()>,
    state: Mutex<EngineState>,
}

impl EngineInner {
    fn is_current(&self, call_id: CallId) -> bool {
        self.state.lock().current(call_id).is_some()
    }

    fn emit(&self, event: CallStatusEvent) {
        let _emitting = self.emit_lock.lock();
        self.emitter.emit(&event);
    }

    fn install_local_media(&self, media: LocalMedia) {
        let mut state = self.state.lock();
        if state.local_media.is_none() {
            state.local_media = Some(media);
        } else {
            drop(state);
            media.stop();
        }
    }

    fn release_local_media(&self) {
        let media = self.state.lock().local_media.take();
        if let Some(media) = media {
            media.stop();
        }
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let Some(call) = state.active.take() {
            call.release();
        }
        if let Some(media) = state.local_media.take() {
            media.stop();
        }
    }
}

/// Handle to the call engine; clones share the same engine
#[derive(Clone)]
pub struct CallEngine {
    inner: Arc<EngineInner>,
}

impl CallEngine {
    pub fn builder() -> CallEngineBuilder {
        CallEngineBuilder::new()
    }

    fn from_parts(
        config: EngineConfig,
        gateway: Arc<dyn TelephonyGateway>,
        media: Arc<dyn MediaCapture>,
        peers: Option<Arc<dyn PeerConnectionFactory>>,
        signaling: Option<Arc<dyn SignalingChannel>>,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                config,
                gateway,
                media,
                peers,
                signaling,
                emitter: EventEmitter::new(),
                emit_lock: Mutex::new(()),
                state: Mutex::new(EngineState::default()),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Register a status listener
    ///
    /// Listeners run synchronously, in registration order, on the task that
    /// produced the event. They must not block.
    pub fn on_status_change<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&CallStatusEvent) + Send + Sync + 'static,
    {
        let listener: StatusListener = Arc::new(listener);
        self.inner.emitter.subscribe(listener)
    }

    /// Remove a listener; unknown ids are ignored and return `false`
    pub fn off_status_change(&self, id: SubscriptionId) -> bool {
        self.inner.emitter.unsubscribe(id)
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.emitter.subscription_count()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.state.lock().initialized
    }

    /// Snapshot of the live session, if any
    pub fn current_call(&self) -> Option<CallSession> {
        self.inner.state.lock().active.as_ref().map(|a| a.session.clone())
    }

    /// Whether a call is connected end to end
    ///
    /// Requires a live session whose media bridge reports connected. A call
    /// the gateway reports answered but that has no bridge, or whose bridge
    /// negotiation failed, is not active; [`CallEngine::status`] still shows
    /// the gateway's view.
    pub fn is_call_active(&self) -> bool {
        let state = self.inner.state.lock();
        state.active.as_ref().is_some_and(|a| {
            a.session.status.is_connected() && a.peer.is_some() && a.bridge_connected
        })
    }

    /// Talk time in whole seconds
    ///
    /// Zero before answer; once the session ends the final value is kept
    /// until the next call starts.
    pub fn call_duration(&self) -> u64 {
        let state = self.inner.state.lock();
        match state.active.as_ref() {
            Some(active) => active.machine.duration_at(Instant::now()),
            None => state.last_duration,
        }
    }

    /// Remote audio from the media bridge, once it has arrived
    pub fn remote_media(&self) -> Option<RemoteMedia> {
        let state = self.inner.state.lock();
        state.active.as_ref().and_then(|a| a.remote_media.clone())
    }

    /// Current status, `Idle` when no session exists
    pub fn status(&self) -> CallStatus {
        let state = self.inner.state.lock();
        state
            .active
            .as_ref()
            .map_or(CallStatus::Idle, |a| a.session.status)
    }
}

impl fmt::Debug for CallEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("CallEngine")
            .field("initialized", &state.initialized)
            .field("call", &state.active.as_ref().map(|a| (a.session.id, a.session.status)))
            .field("subscriptions", &self.inner.emitter.subscription_count())
            .finish()
    }
}
