//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use telecrm_call_core::testing::{FakeMediaCapture, FakePeerConnectionFactory, FakeSignaling, ScriptedGateway};
use telecrm_call_core::{CallEngine, CallId, CallStatus, CallStatusEvent, EngineConfig};

pub const CUSTOMER: &str = "+919800000001";

pub struct Harness {
    pub engine: CallEngine,
    pub gateway: Arc<ScriptedGateway>,
    pub media: Arc<FakeMediaCapture>,
    pub peers: Arc<FakePeerConnectionFactory>,
    pub signaling: Arc<FakeSignaling>,
    events: Arc<Mutex<Vec<CallStatusEvent>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("telecrm_call_core=debug")
            .with_test_writer()
            .try_init();

        let gateway = Arc::new(ScriptedGateway::new());
        let media = Arc::new(FakeMediaCapture::granted());
        let peers = Arc::new(FakePeerConnectionFactory::new());
        let signaling = Arc::new(FakeSignaling::new());

        let engine = CallEngine::builder()
            .config(config)
            .gateway(gateway.clone())
            .media(media.clone())
            .peer_connections(peers.clone())
            .signaling(signaling.clone())
            .build()
            .expect("engine should build");

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        engine.on_status_change(move |event| sink.lock().push(event.clone()));

        Self {
            engine,
            gateway,
            media,
            peers,
            signaling,
            events,
        }
    }

    /// Recorded events as `(status, duration)` pairs
    pub fn statuses(&self) -> Vec<(CallStatus, u64)> {
        self.events
            .lock()
            .iter()
            .map(|e| (e.status, e.duration))
            .collect()
    }

    pub fn events(&self) -> Vec<CallStatusEvent> {
        self.events.lock().clone()
    }

    pub fn events_for(&self, call_id: CallId) -> Vec<CallStatus> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.call_id == Some(call_id))
            .map(|e| e.status)
            .collect()
    }

    pub fn clear_events(&self) {
        self.events.lock().clear();
    }
}

/// Let spawned tasks run without moving the clock
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
