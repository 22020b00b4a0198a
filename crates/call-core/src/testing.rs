//! Scripted fakes for the engine's capability seams
//!
//! These stand in for the microphone, the telephony gateway and the WebRTC
//! stack so call flows can be exercised without a browser or a carrier.
//!
//! ```rust
//! use std::sync::Arc;
//! use telecrm_call_core::testing::{FakeMediaCapture, ScriptedGateway};
//! use telecrm_call_core::CallEngine;
//!
//! let gateway = Arc::new(ScriptedGateway::new());
//! gateway.script_statuses(["ringing", "in-progress", "completed"]);
//!
//! let engine = CallEngine::builder()
//!     .gateway(gateway.clone())
//!     .media(Arc::new(FakeMediaCapture::granted()))
//!     .build()
//!     .unwrap();
//! assert!(!engine.is_call_active());
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::error::{CallError, CallResult};
use crate::gateway::{GatewayCallStatus, InitiateCallRequest, InitiatedCall, TelephonyGateway};
use crate::media::{
    AudioTrack, BridgeConfig, LocalMedia, MediaCapture, PeerConnection, PeerConnectionFactory,
    PeerConnectionState, PeerEvent, RemoteMedia, SessionDescription, SignalingChannel,
};

/// In-memory audio track
#[derive(Debug)]
pub struct FakeTrack {
    id: String,
    enabled: AtomicBool,
    stopped: AtomicBool,
}

impl FakeTrack {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
        }
    }
}

impl AudioTrack for FakeTrack {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MicrophoneAccess {
    Granted,
    Denied,
    NoDevice,
}

/// Microphone that grants or refuses access on demand
#[derive(Debug)]
pub struct FakeMediaCapture {
    access: Mutex<MicrophoneAccess>,
    delay: Mutex<Option<Duration>>,
    issued: Mutex<Vec<Arc<FakeTrack>>>,
}

impl FakeMediaCapture {
    pub fn granted() -> Self {
        Self::with_access(MicrophoneAccess::Granted)
    }

    pub fn denied() -> Self {
        Self::with_access(MicrophoneAccess::Denied)
    }

    pub fn no_device() -> Self {
        Self::with_access(MicrophoneAccess::NoDevice)
    }

    fn with_access(access: MicrophoneAccess) -> Self {
        Self {
            access: Mutex::new(access),
            delay: Mutex::new(None),
            issued: Mutex::new(Vec::new()),
        }
    }

    pub fn set_granted(&self, granted: bool) {
        *self.access.lock() = if granted {
            MicrophoneAccess::Granted
        } else {
            MicrophoneAccess::Denied
        };
    }

    /// Keep the permission prompt open for `delay` before answering
    pub fn delay_acquisition(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Every track handed out so far, oldest first
    pub fn issued_tracks(&self) -> Vec<Arc<FakeTrack>> {
        self.issued.lock().clone()
    }

    pub fn acquisitions(&self) -> usize {
        self.issued.lock().len()
    }
}

#[async_trait]
impl MediaCapture for FakeMediaCapture {
    async fn acquire_audio(&self) -> CallResult<LocalMedia> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let access = *self.access.lock();
        match access {
            MicrophoneAccess::Denied => Err(CallError::permission_denied("user dismissed the prompt")),
            MicrophoneAccess::NoDevice => Err(CallError::audio_device_error("no audio input device")),
            MicrophoneAccess::Granted => {
                let mut issued = self.issued.lock();
                let track = Arc::new(FakeTrack::new(format!("mic-{}", issued.len() + 1)));
                issued.push(track.clone());
                Ok(LocalMedia::new(vec![track as Arc<dyn AudioTrack>]))
            }
        }
    }
}

/// Gateway that replays a scripted sequence of vendor statuses
///
/// Each status poll consumes the next scripted value; the last one repeats
/// once the script runs out. With no script the call stays `ringing`.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    initiation_failure: Mutex<Option<CallError>>,
    initiation_delay: Mutex<Option<Duration>>,
    bridge_url: Mutex<Option<String>>,
    statuses: Mutex<VecDeque<String>>,
    last_status: Mutex<Option<String>>,
    status_failure: Mutex<Option<CallError>>,
    end_call_failures: AtomicU32,
    requests: Mutex<Vec<InitiateCallRequest>>,
    ended: Mutex<Vec<String>>,
    polls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_statuses<I, S>(&self, statuses: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.statuses.lock() = statuses.into_iter().map(Into::into).collect();
    }

    /// Refuse every initiation with `error`; `None` accepts them again
    pub fn fail_initiation(&self, error: Option<CallError>) {
        *self.initiation_failure.lock() = error;
    }

    /// Delay initiation replies, to exercise cancellation while pending
    pub fn delay_initiation(&self, delay: Duration) {
        *self.initiation_delay.lock() = Some(delay);
    }

    pub fn offer_bridge(&self, url: impl Into<String>) {
        *self.bridge_url.lock() = Some(url.into());
    }

    /// Make every status poll fail with `error`; `None` restores the script
    pub fn fail_status_polls(&self, error: Option<CallError>) {
        *self.status_failure.lock() = error;
    }

    /// Fail the next `count` hang-up requests with a network error
    pub fn fail_end_call(&self, count: u32) {
        self.end_call_failures.store(count, Ordering::SeqCst);
    }

    pub fn initiate_requests(&self) -> Vec<InitiateCallRequest> {
        self.requests.lock().clone()
    }

    /// Call sids of every hang-up request that reached the gateway
    pub fn ended_calls(&self) -> Vec<String> {
        self.ended.lock().clone()
    }

    pub fn status_polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TelephonyGateway for ScriptedGateway {
    async fn initiate_call(&self, request: &InitiateCallRequest) -> CallResult<InitiatedCall> {
        let sequence = {
            let mut requests = self.requests.lock();
            requests.push(request.clone());
            requests.len()
        };

        let delay = *self.initiation_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.initiation_failure.lock().clone();
        if let Some(error) = failure {
            return Err(error);
        }

        Ok(InitiatedCall {
            call_sid: format!("CA-scripted-{sequence}"),
            bridge_url: self.bridge_url.lock().clone(),
        })
    }

    async fn call_status(&self, _call_sid: &str) -> CallResult<GatewayCallStatus> {
        self.polls.fetch_add(1, Ordering::SeqCst);

        let failure = self.status_failure.lock().clone();
        if let Some(error) = failure {
            return Err(error);
        }

        let next = self.statuses.lock().pop_front();
        let mut last = self.last_status.lock();
        if let Some(status) = next {
            *last = Some(status);
        }
        Ok(GatewayCallStatus::new(last.clone().unwrap_or_else(|| "ringing".to_string())))
    }

    async fn end_call(&self, call_sid: &str) -> CallResult<()> {
        let remaining = self.end_call_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.end_call_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(CallError::network_error("gateway unreachable"));
        }
        self.ended.lock().push(call_sid.to_string());
        Ok(())
    }
}

/// Peer connection driven by the test
pub struct FakePeerConnection {
    state: Mutex<PeerConnectionState>,
    events: broadcast::Sender<PeerEvent>,
    tracks: Mutex<Vec<Arc<dyn AudioTrack>>>,
    local_description: Mutex<Option<SessionDescription>>,
    remote_description: Mutex<Option<SessionDescription>>,
    closed: AtomicBool,
    fail_offer: bool,
}

impl FakePeerConnection {
    fn new(fail_offer: bool) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            state: Mutex::new(PeerConnectionState::New),
            events,
            tracks: Mutex::new(Vec::new()),
            local_description: Mutex::new(None),
            remote_description: Mutex::new(None),
            closed: AtomicBool::new(false),
            fail_offer,
        }
    }

    /// Move to `state` and notify subscribers
    pub fn set_state(&self, state: PeerConnectionState) {
        *self.state.lock() = state;
        let _ = self.events.send(PeerEvent::StateChanged(state));
    }

    pub fn deliver_remote_track(&self, stream_id: impl Into<String>) {
        let track: Arc<dyn AudioTrack> = Arc::new(FakeTrack::new("remote-audio"));
        let _ = self.events.send(PeerEvent::Track(RemoteMedia {
            stream_id: stream_id.into(),
            tracks: vec![track],
        }));
    }

    pub fn attached_track_ids(&self) -> Vec<String> {
        self.tracks.lock().iter().map(|t| t.id()).collect()
    }

    pub fn local_description(&self) -> Option<SessionDescription> {
        self.local_description.lock().clone()
    }

    pub fn remote_description(&self) -> Option<SessionDescription> {
        self.remote_description.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeerConnection for FakePeerConnection {
    fn add_track(&self, track: Arc<dyn AudioTrack>) -> CallResult<()> {
        if self.is_closed() {
            return Err(CallError::MediaError {
                details: "peer connection closed".to_string(),
            });
        }
        self.tracks.lock().push(track);
        Ok(())
    }

    async fn create_offer(&self) -> CallResult<SessionDescription> {
        if self.fail_offer {
            return Err(CallError::negotiation_failed("no usable audio codec"));
        }
        let tracks = self.tracks.lock().len();
        Ok(SessionDescription::offer(format!("v=0\r\nm=audio {tracks}\r\n")))
    }

    async fn set_local_description(&self, description: SessionDescription) -> CallResult<()> {
        *self.local_description.lock() = Some(description);
        Ok(())
    }

    async fn set_remote_description(&self, description: SessionDescription) -> CallResult<()> {
        *self.remote_description.lock() = Some(description);
        Ok(())
    }

    fn connection_state(&self) -> PeerConnectionState {
        *self.state.lock()
    }

    fn subscribe(&self) -> broadcast::Receiver<PeerEvent> {
        self.events.subscribe()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        *self.state.lock() = PeerConnectionState::Closed;
    }
}

/// Hands out [`FakePeerConnection`]s and keeps them for inspection
#[derive(Default)]
pub struct FakePeerConnectionFactory {
    created: Mutex<Vec<Arc<FakePeerConnection>>>,
    fail_offers: AtomicBool,
}

impl FakePeerConnectionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connections created after this call fail to produce an offer
    pub fn fail_offers(&self, fail: bool) {
        self.fail_offers.store(fail, Ordering::SeqCst);
    }

    pub fn last(&self) -> Option<Arc<FakePeerConnection>> {
        self.created.lock().last().cloned()
    }

    pub fn created(&self) -> usize {
        self.created.lock().len()
    }
}

#[async_trait]
impl PeerConnectionFactory for FakePeerConnectionFactory {
    async fn create(&self, _config: &BridgeConfig) -> CallResult<Arc<dyn PeerConnection>> {
        let peer = Arc::new(FakePeerConnection::new(self.fail_offers.load(Ordering::SeqCst)));
        self.created.lock().push(peer.clone());
        Ok(peer)
    }
}

/// Bridge that answers every offer, or refuses them all
#[derive(Debug, Default)]
pub struct FakeSignaling {
    reject: AtomicBool,
    offers: Mutex<Vec<(String, SessionDescription)>>,
}

impl FakeSignaling {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_offers(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    /// `(bridge_url, offer)` pairs received so far
    pub fn offers(&self) -> Vec<(String, SessionDescription)> {
        self.offers.lock().clone()
    }
}

#[async_trait]
impl SignalingChannel for FakeSignaling {
    async fn exchange(&self, bridge_url: &str, offer: &SessionDescription) -> CallResult<SessionDescription> {
        self.offers.lock().push((bridge_url.to_string(), offer.clone()));
        if self.reject.load(Ordering::SeqCst) {
            return Err(CallError::negotiation_failed("bridge refused the offer"));
        }
        Ok(SessionDescription::answer("v=0\r\nm=audio answer\r\n"))
    }
}
