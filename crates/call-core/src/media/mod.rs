//! Media capability seams
//!
//! Microphone capture and the WebRTC peer connection live outside this crate.
//! The engine drives them through the traits below; a native WebRTC stack or
//! the scripted fakes in [`crate::testing`] plug in behind them.

mod signaling;

pub use signaling::{HttpSignaling, SignalingChannel};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::CallResult;

/// One local or remote audio track
pub trait AudioTrack: Send + Sync + fmt::Debug {
    fn id(&self) -> String;

    fn is_enabled(&self) -> bool;

    /// Disabled tracks send silence
    fn set_enabled(&self, enabled: bool);

    /// Release the underlying device; idempotent
    fn stop(&self);

    fn is_stopped(&self) -> bool;
}

/// Audio tracks captured from the local microphone
#[derive(Debug, Clone)]
pub struct LocalMedia {
    tracks: Vec<Arc<dyn AudioTrack>>,
}

impl LocalMedia {
    pub fn new(tracks: Vec<Arc<dyn AudioTrack>>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[Arc<dyn AudioTrack>] {
        &self.tracks
    }

    /// Muted when there are tracks and all of them are disabled
    pub fn is_muted(&self) -> bool {
        !self.tracks.is_empty() && self.tracks.iter().all(|t| !t.is_enabled())
    }

    pub fn set_muted(&self, muted: bool) {
        for track in &self.tracks {
            track.set_enabled(!muted);
        }
    }

    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

/// Remote audio delivered by the media bridge
#[derive(Debug, Clone)]
pub struct RemoteMedia {
    pub stream_id: String,
    pub tracks: Vec<Arc<dyn AudioTrack>>,
}

/// Access to the local microphone
#[async_trait]
pub trait MediaCapture: Send + Sync {
    /// Prompt for (or reuse) microphone access
    ///
    /// Fails with `CallError::PermissionDenied` when the user refuses and
    /// `CallError::AudioDeviceError` when no input device exists.
    async fn acquire_audio(&self) -> CallResult<LocalMedia>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Notifications from a peer connection
#[derive(Debug, Clone)]
pub enum PeerEvent {
    StateChanged(PeerConnectionState),
    /// Remote audio arrived
    Track(RemoteMedia),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

/// SDP offer or answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Settings for a new peer connection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeConfig {
    pub ice_servers: Vec<String>,
}

/// A WebRTC peer connection to the gateway's media bridge
#[async_trait]
pub trait PeerConnection: Send + Sync {
    fn add_track(&self, track: Arc<dyn AudioTrack>) -> CallResult<()>;

    async fn create_offer(&self) -> CallResult<SessionDescription>;

    async fn set_local_description(&self, description: SessionDescription) -> CallResult<()>;

    async fn set_remote_description(&self, description: SessionDescription) -> CallResult<()>;

    fn connection_state(&self) -> PeerConnectionState;

    /// Subscribe to state changes and remote tracks
    fn subscribe(&self) -> broadcast::Receiver<PeerEvent>;

    /// Tear down the connection; idempotent
    fn close(&self);
}

#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    async fn create(&self, config: &BridgeConfig) -> CallResult<Arc<dyn PeerConnection>>;
}
