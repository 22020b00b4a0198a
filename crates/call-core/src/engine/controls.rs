//! In-call controls

use tracing::{debug, info};

use super::CallEngine;
use crate::call::CallStatus;
use crate::error::{CallError, CallResult};

impl CallEngine {
    /// Flip the microphone between muted and live
    ///
    /// Returns the new muted state, or `false` when no microphone is held.
    pub fn toggle_mute(&self) -> bool {
        let state = self.inner.state.lock();
        let Some(media) = state.local_media.as_ref().filter(|m| !m.tracks().is_empty()) else {
            debug!("No local audio to mute");
            return false;
        };

        let muted = !media.is_muted();
        media.set_muted(muted);
        info!(muted, "Microphone toggled");
        muted
    }

    pub fn is_muted(&self) -> bool {
        self.inner
            .state
            .lock()
            .local_media
            .as_ref()
            .is_some_and(|m| m.is_muted())
    }

    /// Hold is not offered by the telephony gateway
    ///
    /// Always fails with `CallError::NotImplemented` and leaves the call
    /// untouched.
    pub fn toggle_hold(&self) -> CallResult<bool> {
        Err(CallError::NotImplemented {
            feature: "hold".to_string(),
            reason: "the telephony gateway exposes no hold control".to_string(),
        })
    }

    pub fn is_on_hold(&self) -> bool {
        self.status() == CallStatus::OnHold
    }
}
