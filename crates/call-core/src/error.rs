//! Error types for call-core operations
//!
//! Every fallible engine operation returns [`CallResult`]. Errors are grouped
//! into categories so callers can decide how to react:
//!
//! - **Media Errors** - microphone permission or device problems; the user has
//!   to act before another attempt can succeed
//! - **Call Errors** - the operation does not fit the current call state
//! - **Gateway Errors** - the telephony service rejected a request or could
//!   not be reached; network failures are usually recoverable with retry
//! - **Configuration Errors** - invalid settings, fix config and rebuild
//!
//! # Handling a failed call
//!
//! ```rust
//! use telecrm_call_core::CallError;
//!
//! fn describe(err: &CallError) -> &'static str {
//!     match err {
//!         CallError::PermissionDenied { .. } => "allow microphone access and retry",
//!         CallError::CallInProgress { .. } => "finish the current call first",
//!         e if e.is_recoverable() => "temporary problem, try again",
//!         _ => "call could not be placed",
//!     }
//! }
//!
//! let err = CallError::network_error("connection reset");
//! assert_eq!(describe(&err), "temporary problem, try again");
//! assert_eq!(err.category(), "gateway");
//! ```

use thiserror::Error;

use crate::call::CallId;

/// Result type alias for call-core operations
pub type CallResult<T> = Result<T, CallError>;

/// Errors raised by the call engine and its adapters
#[derive(Error, Debug, Clone)]
pub enum CallError {
    /// Media errors
    #[error("Microphone permission denied: {reason}")]
    PermissionDenied { reason: String },

    #[error("Audio device error: {reason}")]
    AudioDeviceError { reason: String },

    #[error("Media negotiation failed: {reason}")]
    NegotiationFailed { reason: String },

    #[error("Media error: {details}")]
    MediaError { details: String },

    /// Call state errors
    #[error("Call engine not initialized")]
    NotInitialized,

    #[error("Invalid destination: {reason}")]
    InvalidDestination { reason: String },

    #[error("Call already in progress: {call_id}")]
    CallInProgress { call_id: CallId },

    #[error("No active call")]
    NoActiveCall,

    #[error("Call setup failed: {reason}")]
    CallSetupFailed { reason: String },

    #[error("Call cancelled before it was connected")]
    CallCancelled,

    /// Gateway and transport errors
    #[error("Gateway rejected request ({status}): {reason}")]
    GatewayError { status: u16, reason: String },

    #[error("Network error: {reason}")]
    NetworkError { reason: String },

    #[error("Malformed gateway response: {reason}")]
    MalformedResponse { reason: String },

    /// Configuration errors
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("Missing required configuration: {field}")]
    MissingConfiguration { field: String },

    /// Generic errors
    #[error("Operation timeout after {duration_ms}ms")]
    OperationTimeout { duration_ms: u64 },

    #[error("Not implemented: {feature} - {reason}")]
    NotImplemented { feature: String, reason: String },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl CallError {
    pub fn permission_denied(reason: impl Into<String>) -> Self {
        Self::PermissionDenied { reason: reason.into() }
    }

    pub fn audio_device_error(reason: impl Into<String>) -> Self {
        Self::AudioDeviceError { reason: reason.into() }
    }

    pub fn negotiation_failed(reason: impl Into<String>) -> Self {
        Self::NegotiationFailed { reason: reason.into() }
    }

    pub fn invalid_destination(reason: impl Into<String>) -> Self {
        Self::InvalidDestination { reason: reason.into() }
    }

    pub fn call_setup_failed(reason: impl Into<String>) -> Self {
        Self::CallSetupFailed { reason: reason.into() }
    }

    pub fn gateway_error(status: u16, reason: impl Into<String>) -> Self {
        Self::GatewayError { status, reason: reason.into() }
    }

    pub fn network_error(reason: impl Into<String>) -> Self {
        Self::NetworkError { reason: reason.into() }
    }

    pub fn malformed_response(reason: impl Into<String>) -> Self {
        Self::MalformedResponse { reason: reason.into() }
    }

    pub fn invalid_configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError { message: message.into() }
    }

    /// Whether retrying the same request may succeed
    ///
    /// Server-side gateway failures (5xx) count as transient; client-side
    /// rejections do not.
    pub fn is_recoverable(&self) -> bool {
        match self {
            CallError::NetworkError { .. } | CallError::OperationTimeout { .. } => true,
            CallError::GatewayError { status, .. } => *status >= 500,

            CallError::PermissionDenied { .. }
            | CallError::InvalidConfiguration { .. }
            | CallError::MissingConfiguration { .. }
            | CallError::InvalidDestination { .. }
            | CallError::NotImplemented { .. } => false,

            _ => false,
        }
    }

    /// Whether the error came from the microphone or the media path
    pub fn is_media_error(&self) -> bool {
        self.category() == "media"
    }

    /// Error category for logs and metrics
    pub fn category(&self) -> &'static str {
        match self {
            CallError::PermissionDenied { .. }
            | CallError::AudioDeviceError { .. }
            | CallError::NegotiationFailed { .. }
            | CallError::MediaError { .. } => "media",

            CallError::NotInitialized
            | CallError::InvalidDestination { .. }
            | CallError::CallInProgress { .. }
            | CallError::NoActiveCall
            | CallError::CallSetupFailed { .. }
            | CallError::CallCancelled => "call",

            CallError::GatewayError { .. }
            | CallError::NetworkError { .. }
            | CallError::MalformedResponse { .. } => "gateway",

            CallError::InvalidConfiguration { .. } | CallError::MissingConfiguration { .. } => {
                "configuration"
            }

            CallError::OperationTimeout { .. }
            | CallError::NotImplemented { .. }
            | CallError::InternalError { .. } => "system",
        }
    }
}

impl From<reqwest::Error> for CallError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CallError::malformed_response(err.to_string())
        } else if let Some(status) = err.status() {
            CallError::gateway_error(status.as_u16(), err.to_string())
        } else {
            CallError::network_error(err.to_string())
        }
    }
}

impl From<url::ParseError> for CallError {
    fn from(err: url::ParseError) -> Self {
        CallError::invalid_configuration("gateway_base_url", err.to_string())
    }
}

impl From<config::ConfigError> for CallError {
    fn from(err: config::ConfigError) -> Self {
        CallError::invalid_configuration("environment", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_errors_recoverable_only_for_server_faults() {
        assert!(CallError::gateway_error(503, "unavailable").is_recoverable());
        assert!(!CallError::gateway_error(400, "bad number").is_recoverable());
        assert!(CallError::network_error("reset").is_recoverable());
        assert!(!CallError::permission_denied("blocked").is_recoverable());
    }

    #[test]
    fn test_categories() {
        assert_eq!(CallError::permission_denied("x").category(), "media");
        assert!(CallError::audio_device_error("x").is_media_error());
        assert_eq!(CallError::NoActiveCall.category(), "call");
        assert_eq!(CallError::malformed_response("x").category(), "gateway");
        assert_eq!(
            CallError::invalid_configuration("poll_interval_ms", "zero").category(),
            "configuration"
        );
        assert_eq!(CallError::OperationTimeout { duration_ms: 10 }.category(), "system");
    }

    #[test]
    fn test_display_includes_reason() {
        let err = CallError::gateway_error(422, "Invalid phone number");
        assert_eq!(err.to_string(), "Gateway rejected request (422): Invalid phone number");
    }
}
