//! HTTP adapter for the telephony gateway API
//!
//! ```text
//! POST {base}/initiate-call          {to, from?, customField?} -> {callSid, bridgeUrl?}
//! GET  {base}/call-status/{callSid}  -> {status, duration?}
//! POST {base}/end-call/{callSid}     -> ack
//! ```
//!
//! Any endpoint may answer with `{"error": "..."}` instead, even with a 2xx
//! status.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

use super::{GatewayCallStatus, InitiateCallRequest, InitiatedCall, TelephonyGateway};
use crate::config::EngineConfig;
use crate::error::{CallError, CallResult};

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Reply<T> {
    Failure(ErrorBody),
    Success(T),
}

/// [`TelephonyGateway`] over the CRM backend's telephony REST endpoints
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
    api_token: Option<String>,
}

impl HttpGateway {
    pub fn new(config: &EngineConfig) -> CallResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| CallError::internal_error(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.gateway_url()?,
            api_token: config.api_token.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> CallResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CallError::invalid_configuration("gateway_base_url", "URL cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn read_reply<T: DeserializeOwned>(response: Response) -> CallResult<T> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let reason = failure_reason(&body)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
            return Err(CallError::gateway_error(status.as_u16(), reason));
        }

        match serde_json::from_str::<Reply<T>>(&body) {
            Ok(Reply::Success(value)) => Ok(value),
            Ok(Reply::Failure(failure)) => Err(CallError::gateway_error(status.as_u16(), failure.error)),
            Err(e) => Err(CallError::malformed_response(e.to_string())),
        }
    }

    /// Ack bodies are free-form; only an explicit `{error}` counts as failure
    async fn read_ack(response: Response) -> CallResult<()> {
        let status = response.status();
        let body = response.text().await?;

        let reported = if status.is_success() {
            serde_json::from_str::<ErrorBody>(&body).ok().map(|b| b.error)
        } else {
            failure_reason(&body)
        };
        match (status.is_success(), reported) {
            (true, None) => Ok(()),
            (_, Some(reason)) => Err(CallError::gateway_error(status.as_u16(), reason)),
            (false, None) => Err(CallError::gateway_error(
                status.as_u16(),
                status.canonical_reason().unwrap_or("request failed"),
            )),
        }
    }
}

/// Reason from a non-2xx body: `error`, else `message`
fn failure_reason(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["error", "message"]
        .iter()
        .find_map(|key| value.get(key)?.as_str().map(str::to_string))
}

#[async_trait]
impl TelephonyGateway for HttpGateway {
    async fn initiate_call(&self, request: &InitiateCallRequest) -> CallResult<InitiatedCall> {
        let url = self.endpoint(&["initiate-call"])?;
        info!(to = %request.to, "Requesting call initiation");

        let response = self.authorize(self.client.post(url)).json(request).send().await?;
        let initiated: InitiatedCall = Self::read_reply(response).await?;

        if initiated.call_sid.trim().is_empty() {
            return Err(CallError::malformed_response("empty callSid"));
        }
        debug!(call_sid = %initiated.call_sid, bridge = initiated.bridge_url.is_some(), "Call initiated");
        Ok(initiated)
    }

    async fn call_status(&self, call_sid: &str) -> CallResult<GatewayCallStatus> {
        let url = self.endpoint(&["call-status", call_sid])?;
        let response = self.authorize(self.client.get(url)).send().await?;
        Self::read_reply(response).await
    }

    async fn end_call(&self, call_sid: &str) -> CallResult<()> {
        let url = self.endpoint(&["end-call", call_sid])?;
        debug!(call_sid, "Requesting call termination");
        let response = self.authorize(self.client.post(url)).send().await?;
        Self::read_ack(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn gateway(server: &MockServer) -> HttpGateway {
        let config = EngineConfig::new(format!("{}/api/telephony", server.uri())).with_api_token("secret");
        HttpGateway::new(&config).unwrap()
    }

    fn request() -> InitiateCallRequest {
        InitiateCallRequest {
            to: "+919800000001".to_string(),
            from: None,
            custom_field: Some("lead-42".to_string()),
        }
    }

    #[tokio::test]
    async fn test_initiate_call_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/telephony/initiate-call"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(serde_json::json!({
                "to": "+919800000001",
                "customField": "lead-42"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "callSid": "CA123",
                "bridgeUrl": "https://bridge.example.com/sdp"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let initiated = gateway(&server).await.initiate_call(&request()).await.unwrap();
        assert_eq!(initiated.call_sid, "CA123");
        assert_eq!(initiated.bridge_url.as_deref(), Some("https://bridge.example.com/sdp"));
    }

    #[tokio::test]
    async fn test_error_payload_with_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/telephony/initiate-call"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "error": "Invalid phone number" })),
            )
            .mount(&server)
            .await;

        let err = gateway(&server).await.initiate_call(&request()).await.unwrap_err();
        assert!(matches!(err, CallError::GatewayError { status: 200, ref reason } if reason == "Invalid phone number"));
    }

    #[tokio::test]
    async fn test_non_2xx_is_gateway_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/telephony/initiate-call"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let err = gateway(&server).await.initiate_call(&request()).await.unwrap_err();
        assert!(matches!(err, CallError::GatewayError { status: 502, .. }));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/telephony/call-status/CA123"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = gateway(&server).await.call_status("CA123").await.unwrap_err();
        assert!(matches!(err, CallError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_call_status_and_end_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/telephony/call-status/CA123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "in-progress",
                "duration": 12
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/telephony/end-call/CA123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "success": true })))
            .expect(1)
            .mount(&server)
            .await;

        let gw = gateway(&server).await;
        let status = gw.call_status("CA123").await.unwrap();
        assert_eq!(status.normalized(), Some(crate::CallStatus::Answered));
        assert_eq!(status.duration, Some(12));
        gw.end_call("CA123").await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_network_error() {
        let config = EngineConfig::new("http://127.0.0.1:9/api/telephony/");
        let err = HttpGateway::new(&config).unwrap().end_call("CA1").await.unwrap_err();
        assert!(matches!(err, CallError::NetworkError { .. }));
    }
}
