//! # telecrm-call-core
//!
//! Outbound call session engine for the telecalling CRM.
//!
//! An agent clicks "call" on a lead; the engine asks the telephony gateway to
//! dial the customer, bridges the agent's microphone to the carrier leg over
//! WebRTC when the gateway offers a bridge, and keeps the UI informed through
//! a stream of [`CallStatusEvent`]s until the call ends.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                  CallEngine                  │
//! │  make_call / end_call / toggle_mute / ...    │
//! └──────┬──────────────┬──────────────┬─────────┘
//!        │              │              │
//! ┌──────▼──────┐ ┌─────▼──────┐ ┌─────▼─────────────┐
//! │  Telephony  │ │   Media    │ │ PeerConnection +  │
//! │  Gateway    │ │  Capture   │ │ SignalingChannel  │
//! └──────┬──────┘ └────────────┘ └─────┬─────────────┘
//!        │ status polls                │ peer events
//!        └──────────────┬──────────────┘
//!              ┌────────▼─────────┐
//!              │ CallStateMachine │ ──► CallStatusEvent listeners
//!              └──────────────────┘
//! ```
//!
//! Gateway polling and peer-connection events are independent producers.
//! Both feed one reducer that drops duplicates, regressions and anything
//! after a terminal status, so subscribers see each change once and in
//! order.
//!
//! ## Capabilities
//!
//! The gateway, microphone and WebRTC stack are traits. Production adapters
//! ([`HttpGateway`], [`HttpSignaling`]) speak HTTP; [`testing`] has scripted
//! fakes for all of them.

pub mod call;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod gateway;
pub mod media;
pub mod recovery;
pub mod reducer;
pub mod testing;

pub use call::{CallId, CallOptions, CallSession, CallStatus};
pub use config::{ConcurrentCallPolicy, EngineConfig};
pub use engine::{CallEngine, CallEngineBuilder};
pub use error::{CallError, CallResult};
pub use events::{CallStatusEvent, StatusListener, SubscriptionId};
pub use gateway::{GatewayCallStatus, HttpGateway, InitiateCallRequest, InitiatedCall, TelephonyGateway};
pub use media::{
    AudioTrack, BridgeConfig, HttpSignaling, LocalMedia, MediaCapture, PeerConnection,
    PeerConnectionFactory, PeerConnectionState, PeerEvent, RemoteMedia, SdpType, SessionDescription,
    SignalingChannel,
};
pub use recovery::RetryConfig;
pub use reducer::{CallStateMachine, Transition};

/// Call-core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
