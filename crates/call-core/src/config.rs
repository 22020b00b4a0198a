//! Engine configuration
//!
//! Settings can be built in code with the `with_*` methods or read from
//! `TELECRM_CALL_*` environment variables with [`EngineConfig::from_env`]:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `TELECRM_CALL_GATEWAY_BASE_URL` | `gateway_base_url` |
//! | `TELECRM_CALL_API_TOKEN` | `api_token` |
//! | `TELECRM_CALL_DEFAULT_CALLER_ID` | `default_caller_id` |
//! | `TELECRM_CALL_POLL_INTERVAL_MS` | `poll_interval_ms` |
//! | `TELECRM_CALL_DURATION_TICK_MS` | `duration_tick_ms` |
//! | `TELECRM_CALL_REQUEST_TIMEOUT_MS` | `request_timeout_ms` |
//! | `TELECRM_CALL_ICE_SERVERS` | `ice_servers` (comma separated) |
//! | `TELECRM_CALL_CONCURRENT_CALL_POLICY` | `reject` or `replace_active` |

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CallError, CallResult};
use crate::recovery::RetryConfig;

/// Prefix for configuration environment variables
pub const ENV_PREFIX: &str = "TELECRM_CALL";

/// What `make_call` does while another call is still live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrentCallPolicy {
    /// Refuse the new call with `CallError::CallInProgress`
    #[default]
    Reject,
    /// Hang up the live call, then place the new one
    ReplaceActive,
}

/// Call engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base URL of the telephony gateway API
    pub gateway_base_url: String,
    /// Bearer token sent to the gateway and signaling endpoints
    pub api_token: Option<String>,
    /// Caller id used when `CallOptions::from` is absent
    pub default_caller_id: Option<String>,
    /// Gateway status poll period
    pub poll_interval_ms: u64,
    /// Period of duration events while connected
    pub duration_tick_ms: u64,
    /// Deadline for each gateway or signaling request
    pub request_timeout_ms: u64,
    /// STUN/TURN servers for the media bridge
    pub ice_servers: Vec<String>,
    pub concurrent_call_policy: ConcurrentCallPolicy,
    /// Backoff for hang-up requests
    #[serde(skip)]
    pub end_call_retry: RetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gateway_base_url: "http://localhost:3000/api/telephony/".to_string(),
            api_token: None,
            default_caller_id: None,
            poll_interval_ms: 2000,
            duration_tick_ms: 1000,
            request_timeout_ms: 10_000,
            ice_servers: vec!["stun:stun.l.google.com:19302".to_string()],
            concurrent_call_policy: ConcurrentCallPolicy::default(),
            end_call_retry: RetryConfig::quick(),
        }
    }
}

impl EngineConfig {
    pub fn new(gateway_base_url: impl Into<String>) -> Self {
        Self {
            gateway_base_url: gateway_base_url.into(),
            ..Default::default()
        }
    }

    /// Read settings from `TELECRM_CALL_*` variables over the defaults
    pub fn from_env() -> CallResult<Self> {
        let settings = config::Config::builder()
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("ice_servers"),
            )
            .build()?;

        let config: EngineConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_default_caller_id(mut self, caller_id: impl Into<String>) -> Self {
        self.default_caller_id = Some(caller_id.into());
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_duration_tick(mut self, tick: Duration) -> Self {
        self.duration_tick_ms = tick.as_millis() as u64;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_ice_servers(mut self, servers: Vec<String>) -> Self {
        self.ice_servers = servers;
        self
    }

    pub fn with_concurrent_call_policy(mut self, policy: ConcurrentCallPolicy) -> Self {
        self.concurrent_call_policy = policy;
        self
    }

    pub fn with_end_call_retry(mut self, retry: RetryConfig) -> Self {
        self.end_call_retry = retry;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn duration_tick(&self) -> Duration {
        Duration::from_millis(self.duration_tick_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Parsed gateway base URL, always ending in `/` so relative joins keep
    /// the full path
    pub fn gateway_url(&self) -> CallResult<Url> {
        let mut url = Url::parse(&self.gateway_base_url)?;
        if url.cannot_be_a_base() {
            return Err(CallError::invalid_configuration(
                "gateway_base_url",
                "URL cannot be used as a base",
            ));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    pub fn validate(&self) -> CallResult<()> {
        for (field, value) in [
            ("poll_interval_ms", self.poll_interval_ms),
            ("duration_tick_ms", self.duration_tick_ms),
            ("request_timeout_ms", self.request_timeout_ms),
        ] {
            if value == 0 {
                return Err(CallError::invalid_configuration(field, "must be greater than zero"));
            }
        }
        if self.end_call_retry.max_attempts == 0 {
            return Err(CallError::invalid_configuration(
                "end_call_retry",
                "at least one attempt is required",
            ));
        }
        self.gateway_url()?;
        Ok(())
    }
}
