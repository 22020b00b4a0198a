//! Status producers and the single place status changes are applied
//!
//! Three background tasks feed the reducer: the gateway poller, the duration
//! ticker and the peer connection event pump. Each one carries the `CallId`
//! it was started for and goes quiet as soon as that session is retired.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{Instant, MissedTickBehavior, interval, interval_at};
use tracing::{debug, info, warn};

use super::{ActiveCall, EngineInner, EngineState};
use crate::call::{CallId, CallStatus};
use crate::error::CallResult;
use crate::events::CallStatusEvent;
use crate::gateway::TelephonyGateway;
use crate::media::{BridgeConfig, LocalMedia, PeerConnectionState, PeerEvent, RemoteMedia};
use crate::recovery::{ErrorContext, with_timeout};
use crate::reducer::Transition;

impl EngineInner {
    /// Feed a status report for `call_id` through the reducer
    ///
    /// Applied changes are emitted; a terminal change also retires the
    /// session and releases its resources after listeners have run.
    pub(super) fn apply_status(
        self: &Arc<Self>,
        call_id: CallId,
        next: CallStatus,
        error: Option<String>,
    ) -> Transition {
        let _emitting = self.emit_lock.lock();
        let now = Instant::now();
        let mut state = self.state.lock();

        let Some(active) = state.current_mut(call_id) else {
            debug!(%call_id, status = %next, "Discarding status for retired session");
            return Transition::IgnoredTerminal;
        };

        let transition = active.machine.apply(next, now);
        let Transition::Applied { from, to } = transition else {
            debug!(%call_id, status = %next, ?transition, "Status report ignored");
            return transition;
        };

        active.session.status = to;
        if to == CallStatus::Answered && active.session.answered_at.is_none() {
            active.session.answered_at = Some(Utc::now());
        }
        if to.is_connected() && active.ticker_task.is_none() {
            if let Some(answered_at) = active.machine.answered_at() {
                active.ticker_task = Some(tokio::spawn(run_duration_ticker(
                    Arc::downgrade(self),
                    call_id,
                    answered_at,
                    self.config.duration_tick(),
                )));
            }
        }

        let duration = active.machine.duration_at(now);
        info!(%call_id, %from, %to, duration, "Call status changed");

        let retired = if to.is_terminal() {
            retire(&mut state, duration)
        } else {
            None
        };
        drop(state);

        let mut event = CallStatusEvent::new(to, duration, Some(call_id));
        if to == CallStatus::Failed {
            event.error = Some(error.unwrap_or_else(|| "Call failed".to_string()));
        }
        self.emitter.emit(&event);
        drop(_emitting);

        if let Some((call, media)) = retired {
            call.release();
            if let Some(media) = media {
                media.stop();
            }
            debug!(%call_id, "Call resources released");
        }

        transition
    }

    /// Emit the current status with the running talk time; `false` once the
    /// session is no longer connected
    fn emit_duration_tick(&self, call_id: CallId) -> bool {
        let _emitting = self.emit_lock.lock();
        let event = {
            let state = self.state.lock();
            match state.current(call_id) {
                Some(active) if active.session.status.is_connected() => CallStatusEvent::new(
                    active.session.status,
                    active.machine.duration_at(Instant::now()),
                    Some(call_id),
                ),
                _ => return false,
            }
        };
        self.emitter.emit(&event);
        true
    }

    pub(super) fn start_polling(self: &Arc<Self>, call_id: CallId, call_sid: String) {
        let task = tokio::spawn(run_status_poll(
            Arc::downgrade(self),
            self.gateway.clone(),
            call_id,
            call_sid,
            self.config.poll_interval(),
            self.config.request_timeout(),
        ));

        let mut state = self.state.lock();
        match state.current_mut(call_id) {
            Some(active) => active.poll_task = Some(task),
            None => task.abort(),
        }
    }

    /// Negotiate the media bridge for `call_id`
    ///
    /// On failure the half-built bridge is torn down and the session carries
    /// on without it.
    pub(super) async fn establish_bridge(self: &Arc<Self>, call_id: CallId, bridge_url: &str) -> CallResult<()> {
        let (Some(factory), Some(signaling)) = (self.peers.clone(), self.signaling.clone()) else {
            info!(%call_id, "No peer connection support configured, relying on gateway status");
            return Ok(());
        };

        let peer = factory
            .create(&BridgeConfig {
                ice_servers: self.config.ice_servers.clone(),
            })
            .await
            .context("Creating peer connection")?;
        let events = peer.subscribe();

        let tracks = {
            let mut state = self.state.lock();
            let tracks = state
                .local_media
                .as_ref()
                .map(|m| m.tracks().to_vec())
                .unwrap_or_default();
            match state.current_mut(call_id) {
                Some(active) => {
                    active.peer = Some(peer.clone());
                    active.peer_task = Some(tokio::spawn(run_peer_events(Arc::downgrade(self), call_id, events)));
                    Some(tracks)
                }
                None => None,
            }
        };
        let Some(tracks) = tracks else {
            debug!(%call_id, "Session retired before the bridge was set up");
            peer.close();
            return Ok(());
        };

        let negotiated: CallResult<()> = async {
            for track in tracks {
                peer.add_track(track)?;
            }
            let offer = peer.create_offer().await?;
            peer.set_local_description(offer.clone()).await?;

            let answer = with_timeout(
                "bridge_signaling",
                self.config.request_timeout(),
                signaling.exchange(bridge_url, &offer),
            )
            .await?;

            if !self.is_current(call_id) {
                return Ok(());
            }
            peer.set_remote_description(answer).await
        }
        .await;

        if let Err(e) = negotiated {
            self.drop_bridge(call_id);
            peer.close();
            return Err::<(), _>(e).context("Negotiating media bridge");
        }

        debug!(%call_id, "Media bridge negotiated");
        Ok(())
    }

    /// Detach the peer connection from the session without ending the call
    fn drop_bridge(&self, call_id: CallId) {
        let mut state = self.state.lock();
        if let Some(active) = state.current_mut(call_id) {
            if let Some(task) = active.peer_task.take() {
                task.abort();
            }
            active.peer = None;
            active.bridge_connected = false;
        }
    }

    fn on_peer_state(self: &Arc<Self>, call_id: CallId, peer_state: PeerConnectionState) {
        debug!(%call_id, ?peer_state, "Peer connection state changed");
        match peer_state {
            PeerConnectionState::Connected => {
                self.set_bridge_connected(call_id, true);
                self.apply_status(call_id, CallStatus::Answered, None);
            }
            PeerConnectionState::Disconnected | PeerConnectionState::Closed => {
                self.set_bridge_connected(call_id, false);
                self.apply_status(call_id, CallStatus::Ended, None);
            }
            PeerConnectionState::Failed => {
                self.set_bridge_connected(call_id, false);
                warn!(%call_id, "Media bridge failed, relying on gateway status");
            }
            PeerConnectionState::New | PeerConnectionState::Connecting => {}
        }
    }

    fn set_bridge_connected(&self, call_id: CallId, connected: bool) {
        if let Some(active) = self.state.lock().current_mut(call_id) {
            active.bridge_connected = connected;
        }
    }

    fn on_remote_track(&self, call_id: CallId, remote: RemoteMedia) {
        if let Some(active) = self.state.lock().current_mut(call_id) {
            debug!(%call_id, stream = %remote.stream_id, "Remote audio attached");
            active.remote_media = Some(remote);
        }
    }
}

/// Take the session out of the engine state, freezing its talk time
fn retire(state: &mut EngineState, duration: u64) -> Option<(ActiveCall, Option<LocalMedia>)> {
    let call = state.active.take()?;
    state.last_duration = duration;
    Some((call, state.local_media.take()))
}

async fn run_status_poll(
    engine: Weak<EngineInner>,
    gateway: Arc<dyn TelephonyGateway>,
    call_id: CallId,
    call_sid: String,
    period: Duration,
    timeout: Duration,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let live = engine.upgrade().is_some_and(|e| e.is_current(call_id));
        if !live {
            break;
        }

        let report = with_timeout("call_status", timeout, gateway.call_status(&call_sid)).await;
        let Some(engine) = engine.upgrade() else {
            break;
        };

        match report {
            Ok(report) => match report.normalized() {
                Some(status) => {
                    debug!(%call_id, raw = %report.status, %status, "Gateway status polled");
                    let error = (status == CallStatus::Failed)
                        .then(|| format!("Gateway reported call {}", report.status.trim()));
                    engine.apply_status(call_id, status, error);
                    if status.is_terminal() {
                        break;
                    }
                }
                None => {
                    warn!(%call_id, raw = %report.status, "Unrecognized gateway call status");
                }
            },
            Err(e) => {
                warn!(%call_id, error = %e, "Call status poll failed");
            }
        }
    }

    debug!(%call_id, "Status polling stopped");
}

async fn run_duration_ticker(engine: Weak<EngineInner>, call_id: CallId, answered_at: Instant, period: Duration) {
    let mut ticker = interval_at(answered_at + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(engine) = engine.upgrade() else {
            break;
        };
        if !engine.emit_duration_tick(call_id) {
            break;
        }
    }
}

async fn run_peer_events(engine: Weak<EngineInner>, call_id: CallId, mut events: broadcast::Receiver<PeerEvent>) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!(%call_id, skipped, "Peer events dropped");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        let Some(engine) = engine.upgrade() else {
            break;
        };
        match event {
            PeerEvent::StateChanged(state) => engine.on_peer_state(call_id, state),
            PeerEvent::Track(remote) => engine.on_remote_track(call_id, remote),
        }
    }
}
