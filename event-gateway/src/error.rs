//! Error types for the event gateway.

use std::net::SocketAddr;

use agent_events::BusError;
use agent_hotplug::HotplugError;
use warp::http::StatusCode;

use crate::transport::TransportError;

/// Errors that can occur in the event gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No listener transport could be established for the request
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A submitted event was not valid JSON
    #[error("Failed to decode event: {0}")]
    Decode(#[from] serde_json::Error),

    /// The event bus refused the listener or the event
    #[error(transparent)]
    Bus(#[from] BusError),

    /// The hotplug reactor could not be set up
    #[error(transparent)]
    Hotplug(#[from] HotplugError),

    /// A submitted body exceeded the configured limit
    #[error("Request body larger than {max} bytes")]
    BodyTooLarge { max: u64 },

    /// The HTTP endpoint could not bind its address
    #[error("Failed to bind {addr}: {message}")]
    Bind { addr: SocketAddr, message: String },
}

impl GatewayError {
    /// HTTP status reported for this error.
    ///
    /// Malformed submissions are reported as internal errors on purpose;
    /// event ingestion treats every decode or publish failure alike.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Transport(TransportError::UpgradeFailed(_)) => StatusCode::BAD_REQUEST,
            Self::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenience type alias for Results using GatewayError.
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_display() {
        let error = GatewayError::Configuration("bad port".to_string());
        assert_eq!(error.to_string(), "Configuration error: bad port");

        let error: GatewayError = TransportError::HijackUnsupported.into();
        assert_eq!(
            error.to_string(),
            "Missing required duplex-takeover support"
        );

        let error: GatewayError = BusError::ShuttingDown.into();
        assert_eq!(error.to_string(), "Event bus is shutting down");

        let error = GatewayError::BodyTooLarge { max: 16 };
        assert_eq!(error.to_string(), "Request body larger than 16 bytes");
    }

    #[test]
    fn test_status_codes() {
        let decode = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(
            GatewayError::from(decode).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GatewayError::from(BusError::ShuttingDown).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GatewayError::from(TransportError::HijackUnsupported).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GatewayError::from(TransportError::UpgradeFailed("no key".to_string())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::BodyTooLarge { max: 1 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }
}
