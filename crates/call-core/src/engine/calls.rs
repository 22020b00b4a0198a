//! Placing and ending calls

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::{ActiveCall, CallEngine, PendingAttempt};
use crate::call::{CallId, CallOptions, CallSession, CallStatus};
use crate::config::ConcurrentCallPolicy;
use crate::error::{CallError, CallResult};
use crate::events::CallStatusEvent;
use crate::gateway::InitiateCallRequest;
use crate::recovery::{retry_with_backoff, with_timeout};
use crate::reducer::CallStateMachine;

impl CallEngine {
    /// Acquire the microphone
    ///
    /// Returns `false` when access is denied or no input device exists; the
    /// reason is logged. Calling it again while the microphone is held is a
    /// no-op that returns `true`.
    pub async fn initialize(&self) -> bool {
        let held = {
            let mut state = self.inner.state.lock();
            if state.local_media.is_some() {
                state.initialized = true;
            }
            state.initialized && state.local_media.is_some()
        };
        if held {
            return true;
        }

        match self.inner.media.acquire_audio().await {
            Ok(media) => {
                let tracks = media.tracks().len();
                self.inner.install_local_media(media);
                self.inner.state.lock().initialized = true;
                info!(tracks, "Microphone acquired, call engine ready");
                true
            }
            Err(e) => {
                warn!(error = %e, category = e.category(), "Microphone unavailable");
                false
            }
        }
    }

    /// Place an outbound call
    ///
    /// Emits `Connecting` as soon as the gateway accepts the request, then
    /// keeps reporting status changes until the call reaches a terminal
    /// status. If the gateway refuses, a single `Failed` event carrying the
    /// reason is emitted and the error is returned; no session is created.
    ///
    /// # Errors
    ///
    /// * `CallError::InvalidDestination` - `to` is blank
    /// * `CallError::NotInitialized` - [`CallEngine::initialize`] has not succeeded
    /// * `CallError::CallInProgress` - another call is live and the policy is
    ///   [`ConcurrentCallPolicy::Reject`]
    /// * `CallError::CallCancelled` - [`CallEngine::end_call`] ran while the
    ///   gateway request was still pending
    /// * media or gateway errors from acquiring the microphone or initiating
    pub async fn make_call(&self, options: CallOptions) -> CallResult<CallSession> {
        let to = options.to.trim().to_string();
        if to.is_empty() {
            return Err(CallError::invalid_destination("destination number is empty"));
        }
        let options = CallOptions {
            to,
            from: options
                .from
                .or_else(|| self.inner.config.default_caller_id.clone()),
            custom_field: options.custom_field,
        };

        let attempt_id = CallId::new_v4();
        if self.reserve_attempt(attempt_id)? {
            info!(%attempt_id, "Replacing live call");
            self.end_call().await;
        }

        if let Err(e) = self.ensure_local_media().await {
            self.inner.state.lock().pending = None;
            error!(%attempt_id, error = %e, "Cannot place call without microphone");
            self.inner.emit(CallStatusEvent::failed(None, 0, e.to_string()));
            return Err(e);
        }

        if self.take_cancelled_attempt() {
            info!(%attempt_id, "Call cancelled before reaching the gateway");
            self.inner.release_local_media();
            self.inner.emit(CallStatusEvent::new(CallStatus::Ended, 0, None));
            return Err(CallError::CallCancelled);
        }

        let request = InitiateCallRequest {
            to: options.to.clone(),
            from: options.from.clone(),
            custom_field: options.custom_field.clone(),
        };
        info!(%attempt_id, to = %request.to, "Placing call");

        let result = with_timeout(
            "initiate_call",
            self.inner.config.request_timeout(),
            self.inner.gateway.initiate_call(&request),
        )
        .await;

        let initiated = match result {
            Ok(initiated) => initiated,
            Err(e) => {
                self.inner.state.lock().pending = None;
                error!(%attempt_id, error = %e, category = e.category(), "Call initiation failed");
                self.inner.release_local_media();
                self.inner.emit(CallStatusEvent::failed(None, 0, e.to_string()));
                return Err(e);
            }
        };

        let call_id = attempt_id;
        let session = CallSession::new(
            call_id,
            initiated.call_sid.clone(),
            &options,
            initiated.bridge_url.clone(),
        );

        let cancelled = {
            let mut state = self.inner.state.lock();
            let cancelled = state.pending.take().is_some_and(|p| p.cancelled);
            if !cancelled {
                let mut machine = CallStateMachine::new();
                machine.apply(CallStatus::Initiated, Instant::now());
                state.last_duration = 0;
                state.active = Some(ActiveCall::new(session.clone(), machine));
            }
            cancelled
        };

        if cancelled {
            info!(%call_id, call_sid = %initiated.call_sid, "Call cancelled while initiating, hanging up");
            if let Err(e) = self.terminate_at_gateway(&initiated.call_sid).await {
                warn!(%call_id, error = %e, "Could not hang up cancelled call");
            }
            self.inner.release_local_media();
            self.inner.emit(CallStatusEvent::new(CallStatus::Ended, 0, None));
            return Err(CallError::CallCancelled);
        }

        info!(%call_id, call_sid = %initiated.call_sid, bridge = initiated.bridge_url.is_some(), "Call initiated");
        self.inner.apply_status(call_id, CallStatus::Connecting, None);
        self.inner.start_polling(call_id, initiated.call_sid.clone());

        if let Some(bridge_url) = initiated.bridge_url.as_deref() {
            if let Err(e) = self.inner.establish_bridge(call_id, bridge_url).await {
                warn!(
                    %call_id,
                    error = %e,
                    "Media bridge negotiation failed, continuing with gateway status"
                );
            }
        }

        Ok(self
            .current_call()
            .filter(|current| current.id == call_id)
            .unwrap_or(session))
    }

    /// Hang up the live call
    ///
    /// Returns `false` without side effects when there is nothing to end.
    /// Gateway termination is retried with backoff; if it still fails the
    /// call is ended locally anyway. A final `Ended` event with the talk time
    /// is emitted and all call resources are released.
    ///
    /// While a [`CallEngine::make_call`] is still acquiring the microphone or
    /// waiting on the gateway, the attempt is marked cancelled and `true` is
    /// returned. An attempt cancelled before dialing never reaches the
    /// gateway; one already dialed is hung up as soon as the gateway replies.
    pub async fn end_call(&self) -> bool {
        let target = {
            let mut state = self.inner.state.lock();
            if let Some(active) = state.active.as_ref() {
                Some((active.session.id, active.session.gateway_call_id.clone()))
            } else if let Some(pending) = state.pending.as_mut() {
                pending.cancelled = true;
                None
            } else {
                debug!("No call to end");
                return false;
            }
        };

        let Some((call_id, call_sid)) = target else {
            info!("Cancelling call attempt still waiting on the gateway");
            return true;
        };

        info!(%call_id, "Ending call");
        if let Err(e) = self.terminate_at_gateway(&call_sid).await {
            warn!(%call_id, error = %e, "Gateway termination failed, ending call locally");
        }
        self.inner.apply_status(call_id, CallStatus::Ended, None);
        true
    }

    /// Hang up any call and release the microphone
    ///
    /// [`CallEngine::initialize`] must succeed again before the next call.
    pub async fn shutdown(&self) {
        self.end_call().await;
        let media = {
            let mut state = self.inner.state.lock();
            state.initialized = false;
            state.local_media.take()
        };
        if let Some(media) = media {
            media.stop();
        }
        info!("Call engine shut down");
    }

    /// Claim the single call slot for `attempt_id`; `true` if a live call
    /// has to be replaced first
    fn reserve_attempt(&self, attempt_id: CallId) -> CallResult<bool> {
        let mut state = self.inner.state.lock();
        if !state.initialized {
            return Err(CallError::NotInitialized);
        }
        if let Some(pending) = &state.pending {
            return Err(CallError::CallInProgress { call_id: pending.id });
        }

        let replace = match (&state.active, self.inner.config.concurrent_call_policy) {
            (None, _) => false,
            (Some(active), ConcurrentCallPolicy::Reject) => {
                warn!(call_id = %active.session.id, "Call already in progress");
                return Err(CallError::CallInProgress {
                    call_id: active.session.id,
                });
            }
            (Some(_), ConcurrentCallPolicy::ReplaceActive) => true,
        };

        state.pending = Some(PendingAttempt {
            id: attempt_id,
            cancelled: false,
        });
        Ok(replace)
    }

    /// Clear the pending attempt if [`CallEngine::end_call`] cancelled it
    fn take_cancelled_attempt(&self) -> bool {
        let mut state = self.inner.state.lock();
        if state.pending.as_ref().is_some_and(|p| p.cancelled) {
            state.pending = None;
            return true;
        }
        false
    }

    async fn ensure_local_media(&self) -> CallResult<()> {
        let held = self.inner.state.lock().local_media.is_some();
        if held {
            return Ok(());
        }
        debug!("Re-acquiring microphone");
        let media = self.inner.media.acquire_audio().await?;
        self.inner.install_local_media(media);
        Ok(())
    }

    async fn terminate_at_gateway(&self, call_sid: &str) -> CallResult<()> {
        let gateway = &self.inner.gateway;
        let timeout = self.inner.config.request_timeout();
        retry_with_backoff("end_call", self.inner.config.end_call_retry.clone(), move || {
            with_timeout("end_call", timeout, gateway.end_call(call_sid))
        })
        .await
    }
}
