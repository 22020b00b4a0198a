//! Builder for [`CallEngine`]

use std::sync::Arc;

use super::CallEngine;
use crate::config::EngineConfig;
use crate::error::{CallError, CallResult};
use crate::gateway::{HttpGateway, TelephonyGateway};
use crate::media::{HttpSignaling, MediaCapture, PeerConnectionFactory, SignalingChannel};

/// Assembles a [`CallEngine`] from its configuration and capabilities
///
/// Only the microphone is mandatory. The gateway defaults to
/// [`HttpGateway`] on `gateway_base_url`; signaling defaults to
/// [`HttpSignaling`] when a peer connection factory is supplied. Without a
/// factory, calls run on gateway status alone.
#[derive(Default)]
pub struct CallEngineBuilder {
    config: EngineConfig,
    gateway: Option<Arc<dyn TelephonyGateway>>,
    media: Option<Arc<dyn MediaCapture>>,
    peers: Option<Arc<dyn PeerConnectionFactory>>,
    signaling: Option<Arc<dyn SignalingChannel>>,
}

impl CallEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn gateway(mut self, gateway: Arc<dyn TelephonyGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn media(mut self, media: Arc<dyn MediaCapture>) -> Self {
        self.media = Some(media);
        self
    }

    pub fn peer_connections(mut self, factory: Arc<dyn PeerConnectionFactory>) -> Self {
        self.peers = Some(factory);
        self
    }

    pub fn signaling(mut self, signaling: Arc<dyn SignalingChannel>) -> Self {
        self.signaling = Some(signaling);
        self
    }

    pub fn build(self) -> CallResult<CallEngine> {
        self.config.validate()?;

        let media = self.media.ok_or_else(|| CallError::MissingConfiguration {
            field: "media".to_string(),
        })?;

        let gateway = match self.gateway {
            Some(gateway) => gateway,
            None => Arc::new(HttpGateway::new(&self.config)?),
        };

        let signaling = match (self.signaling, &self.peers) {
            (Some(signaling), _) => Some(signaling),
            (None, Some(_)) => {
                Some(Arc::new(HttpSignaling::new(&self.config)?) as Arc<dyn SignalingChannel>)
            }
            (None, None) => None,
        };

        Ok(CallEngine::from_parts(
            self.config,
            gateway,
            media,
            self.peers,
            signaling,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeMediaCapture, ScriptedGateway};
    use std::time::Duration;

    #[test]
    fn test_media_is_required() {
        let err = CallEngineBuilder::new()
            .gateway(Arc::new(ScriptedGateway::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, CallError::MissingConfiguration { ref field } if field == "media"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = CallEngineBuilder::new()
            .config(EngineConfig::default().with_duration_tick(Duration::ZERO))
            .media(Arc::new(FakeMediaCapture::granted()))
            .build()
            .unwrap_err();
        assert_eq!(err.category(), "configuration");
    }

    #[test]
    fn test_defaults_to_http_gateway() {
        let engine = CallEngineBuilder::new()
            .config(EngineConfig::new("https://crm.example.com/api/telephony"))
            .media(Arc::new(FakeMediaCapture::granted()))
            .build()
            .unwrap();
        assert!(!engine.is_initialized());
        assert_eq!(engine.config().gateway_base_url, "https://crm.example.com/api/telephony");
    }
}
