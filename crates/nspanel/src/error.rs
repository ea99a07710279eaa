//! CLI error types with miette diagnostics.
//!
//! Maps `ConfigError` and `CoreError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use nspanel_config::ConfigError;
use nspanel_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const CONFIG: i32 = 3;
    pub const AUTH: i32 = 4;
    pub const CONNECTION: i32 = 5;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration file not found: {path}")]
    #[diagnostic(
        code(nspanel::no_config),
        help("Pass --config <file> or create the file at the default location.")
    )]
    NoConfig { path: String },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(nspanel::config))]
    Config { message: String },

    #[error("Invalid panel layout: {message}")]
    #[diagnostic(
        code(nspanel::cards),
        help("Run `nspanel check` after editing the cards to validate the layout.")
    )]
    Layout { message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("No access token configured for {url}")]
    #[diagnostic(
        code(nspanel::no_credentials),
        help(
            "Create a long-lived access token in your Home Assistant profile, then either\n\
             set home_assistant.token_env to the variable holding it, or store it in the\n\
             system keyring under service 'nspanel'."
        )
    )]
    NoCredentials { url: String },

    #[error("Home Assistant rejected the access token")]
    #[diagnostic(code(nspanel::auth_failed), help("{message}"))]
    AuthFailed { message: String },

    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to Home Assistant at {url}")]
    #[diagnostic(
        code(nspanel::connection_failed),
        help(
            "Check that Home Assistant is reachable and the URL is correct.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    // ── Runtime ──────────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(nspanel::runtime))]
    Core(CoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoConfig { .. } | Self::Config { .. } | Self::Layout { .. } => exit_code::CONFIG,
            Self::NoCredentials { .. } | Self::AuthFailed { .. } => exit_code::AUTH,
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Core(_) | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound { path } => CliError::NoConfig {
                path: path.display().to_string(),
            },
            ConfigError::NoCredentials { url } => CliError::NoCredentials { url },
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        if err.is_configuration() {
            return CliError::Layout {
                message: err.to_string(),
            };
        }
        match err {
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },
            other => CliError::Core(other),
        }
    }
}

impl From<nspanel_api::Error> for CliError {
    fn from(err: nspanel_api::Error) -> Self {
        CoreError::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn card_errors_are_configuration_exits() {
        let err: CliError = CoreError::UnknownCardType {
            card: "Hall".into(),
            card_type: "cardBogus".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::CONFIG);
        assert!(err.to_string().contains("unknown card type 'cardBogus'"));
    }

    #[test]
    fn missing_file_and_token_map_to_their_own_variants() {
        let err: CliError = ConfigError::NotFound {
            path: PathBuf::from("/etc/nspanel.toml"),
        }
        .into();
        assert!(matches!(err, CliError::NoConfig { .. }));

        let err: CliError = ConfigError::NoCredentials {
            url: "http://ha.lan:8123".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }

    #[test]
    fn transport_auth_failure_keeps_its_message() {
        let err: CliError = nspanel_api::Error::Authentication {
            message: "auth_invalid".into(),
        }
        .into();
        assert!(matches!(err, CliError::AuthFailed { ref message } if message == "auth_invalid"));
    }
}
