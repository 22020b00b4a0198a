//! Offer/answer exchange with the media bridge

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{SdpType, SessionDescription};
use crate::config::EngineConfig;
use crate::error::{CallError, CallResult};

/// Delivers the local SDP offer to a bridge endpoint and returns its answer
#[async_trait]
pub trait SignalingChannel: Send + Sync {
    async fn exchange(&self, bridge_url: &str, offer: &SessionDescription) -> CallResult<SessionDescription>;
}

/// Single-POST signaling: `{type: "offer", sdp}` in, `{type: "answer", sdp}` out
#[derive(Debug, Clone)]
pub struct HttpSignaling {
    client: Client,
    api_token: Option<String>,
}

impl HttpSignaling {
    pub fn new(config: &EngineConfig) -> CallResult<Self> {
        Self::with_timeout(config.request_timeout(), config.api_token.clone())
    }

    pub fn with_timeout(timeout: Duration, api_token: Option<String>) -> CallResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CallError::internal_error(format!("HTTP client: {e}")))?;
        Ok(Self { client, api_token })
    }
}

#[async_trait]
impl SignalingChannel for HttpSignaling {
    async fn exchange(&self, bridge_url: &str, offer: &SessionDescription) -> CallResult<SessionDescription> {
        debug!(bridge_url, "Sending SDP offer");

        let mut request = self.client.post(bridge_url).json(offer);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CallError::negotiation_failed(format!("signaling request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CallError::negotiation_failed(format!("bridge answered {status}")));
        }

        let answer: SessionDescription = response
            .json()
            .await
            .map_err(|e| CallError::negotiation_failed(format!("invalid SDP answer: {e}")))?;

        if answer.kind != SdpType::Answer || answer.sdp.trim().is_empty() {
            return Err(CallError::negotiation_failed("bridge did not return an SDP answer"));
        }
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn signaling() -> HttpSignaling {
        HttpSignaling::with_timeout(Duration::from_secs(5), None).unwrap()
    }

    #[tokio::test]
    async fn test_exchange_returns_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bridge/CA1"))
            .and(body_json(serde_json::json!({ "type": "offer", "sdp": "v=0 offer" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "type": "answer", "sdp": "v=0 answer" })),
            )
            .mount(&server)
            .await;

        let answer = signaling()
            .exchange(&format!("{}/bridge/CA1", server.uri()), &SessionDescription::offer("v=0 offer"))
            .await
            .unwrap();
        assert_eq!(answer, SessionDescription::answer("v=0 answer"));
    }

    #[tokio::test]
    async fn test_rejected_offer_is_negotiation_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(488))
            .mount(&server)
            .await;

        let err = signaling()
            .exchange(&server.uri(), &SessionDescription::offer("v=0"))
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::NegotiationFailed { .. }));
    }

    #[tokio::test]
    async fn test_offer_echoed_back_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "type": "offer", "sdp": "v=0" })),
            )
            .mount(&server)
            .await;

        let err = signaling()
            .exchange(&server.uri(), &SessionDescription::offer("v=0"))
            .await
            .unwrap_err();
        assert!(err.is_media_error());
    }
}
