//! Telephony gateway seam
//!
//! The gateway places the carrier leg of a call, reports its status and hangs
//! it up. The engine only talks to it through [`TelephonyGateway`]; the
//! production adapter is [`HttpGateway`].

mod http;

pub use http::HttpGateway;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::call::CallStatus;
use crate::error::CallResult;

/// Body of an initiation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateCallRequest {
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_field: Option<String>,
}

/// Successful initiation reply
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatedCall {
    /// Gateway's identifier for the call
    pub call_sid: String,
    /// Media bridge endpoint, when the gateway offers one
    #[serde(default)]
    pub bridge_url: Option<String>,
}

/// Raw status report for one call
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayCallStatus {
    /// Vendor status string, e.g. `in-progress`
    pub status: String,
    /// Vendor's own talk-time figure, informational only
    #[serde(default)]
    pub duration: Option<u64>,
}

impl GatewayCallStatus {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            duration: None,
        }
    }

    /// Vendor status mapped onto the call lifecycle, `None` if unrecognized
    pub fn normalized(&self) -> Option<CallStatus> {
        CallStatus::from_gateway(&self.status)
    }
}

/// Operations the engine needs from a telephony provider
#[async_trait]
pub trait TelephonyGateway: Send + Sync {
    /// Place a call. Not idempotent; callers must not retry it.
    async fn initiate_call(&self, request: &InitiateCallRequest) -> CallResult<InitiatedCall>;

    async fn call_status(&self, call_sid: &str) -> CallResult<GatewayCallStatus>;

    /// Hang up a call. Safe to repeat.
    async fn end_call(&self, call_sid: &str) -> CallResult<()>;
}
