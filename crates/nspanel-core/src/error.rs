// ── Core error types ──
//
// Errors surfaced by nspanel-core. Configuration problems are fatal and
// abort panel construction; everything that can go wrong at runtime
// (lookup misses, malformed panel messages) is logged and absorbed by the
// session instead of being returned. The `From<nspanel_api::Error>` impl
// translates transport failures from the Home Assistant bridge.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration errors ─────────────────────────────────────────
    #[error("Card '{card}': unknown card type '{card_type}'")]
    UnknownCardType { card: String, card_type: String },

    #[error("Card '{card}': duplicate navigation key '{key}'")]
    DuplicateNavigationKey { card: String, key: String },

    #[error("Card '{card}': duplicate short id '{iid}'")]
    DuplicateShortId { card: String, iid: String },

    #[error("Panel '{panel}' has no cards configured")]
    NoCards { panel: String },

    #[error("Card '{card}': {message}")]
    InvalidCard { card: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to Home Assistant at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Publish to '{topic}' failed: {message}")]
    Publish { topic: String, message: String },

    #[error("Service call {service} failed: {message}")]
    ServiceCall { service: String, message: String },

    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Configuration errors abort startup; everything else is runtime.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownCardType { .. }
                | Self::DuplicateNavigationKey { .. }
                | Self::DuplicateShortId { .. }
                | Self::NoCards { .. }
                | Self::InvalidCard { .. }
                | Self::Config { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<nspanel_api::Error> for CoreError {
    fn from(err: nspanel_api::Error) -> Self {
        match err {
            nspanel_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            nspanel_api::Error::Transport(ref e) if e.is_connect() || e.is_timeout() => {
                CoreError::ConnectionFailed {
                    url: e
                        .url()
                        .map_or_else(|| "<unknown>".into(), ToString::to_string),
                    reason: e.to_string(),
                }
            }
            nspanel_api::Error::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            nspanel_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: "websocket".into(),
                reason,
            },
            other => CoreError::Api {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_name_the_card() {
        let err = CoreError::UnknownCardType {
            card: "Living room".into(),
            card_type: "cardBogus".into(),
        };
        assert!(err.is_configuration());
        assert_eq!(
            err.to_string(),
            "Card 'Living room': unknown card type 'cardBogus'"
        );
    }

    #[test]
    fn api_auth_maps_to_authentication_failed() {
        let err: CoreError = nspanel_api::Error::Authentication {
            message: "bad token".into(),
        }
        .into();
        assert!(matches!(err, CoreError::AuthenticationFailed { .. }));
        assert!(!err.is_configuration());
    }

    #[test]
    fn api_status_is_preserved() {
        let err: CoreError = nspanel_api::Error::Api {
            status: 500,
            message: "boom".into(),
        }
        .into();
        assert!(matches!(err, CoreError::Api { status: Some(500), .. }));
    }
}
