//! Configuration for the NSPanel controller.
//!
//! One file (TOML or YAML) describes the Home Assistant connection and every
//! panel. Environment variables prefixed `NSPANEL_` override file values,
//! with `__` separating nested keys (`NSPANEL_HOME_ASSISTANT__URL`).
//! The access token comes from an environment variable, the system keyring,
//! or the file itself, in that order.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml, Yaml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use nspanel_api::{TlsMode, TransportConfig};
use nspanel_core::PanelConfig;

pub const ENV_PREFIX: &str = "NSPANEL_";
const KEYRING_SERVICE: &str = "nspanel";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("unsupported config format '{extension}' (expected toml, yaml or yml)")]
    UnsupportedFormat { extension: String },

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no access token configured for {url}")]
    NoCredentials { url: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Config structs ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub home_assistant: HomeAssistant,

    #[serde(default)]
    pub panels: Vec<PanelConfig>,
}

/// Connection settings for the Home Assistant instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeAssistant {
    /// Base URL, e.g. `http://homeassistant.local:8123`.
    #[serde(default = "default_url")]
    pub url: String,

    /// Long-lived access token (plaintext; prefer `token_env` or the keyring).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Name of an environment variable holding the token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Skip certificate verification.
    #[serde(default)]
    pub insecure: bool,

    /// PEM file with a custom CA.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,
}

impl Default for HomeAssistant {
    fn default() -> Self {
        Self {
            url: default_url(),
            token: None,
            token_env: None,
            timeout_secs: default_timeout(),
            insecure: false,
            ca_cert: None,
        }
    }
}

fn default_url() -> String {
    "http://homeassistant.local:8123".into()
}
fn default_timeout() -> u64 {
    10
}

// ── Config file path ────────────────────────────────────────────────

/// Platform config location, e.g. `~/.config/nspanel/config.toml`.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "nspanel", "nspanel").map_or_else(
        || PathBuf::from("nspanel.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Loading ─────────────────────────────────────────────────────────

/// Layered providers: defaults, then the file, then `NSPANEL_*` variables.
pub fn figment(path: &Path) -> Result<Figment, ConfigError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("toml")
        .to_ascii_lowercase();

    let base = Figment::new().merge(Serialized::defaults(AppConfig::default()));
    let with_file = match extension.as_str() {
        "toml" => base.merge(Toml::file(path)),
        "yaml" | "yml" => base.merge(Yaml::file(path)),
        _ => return Err(ConfigError::UnsupportedFormat { extension }),
    };
    Ok(with_file.merge(Env::prefixed(ENV_PREFIX).split("__")))
}

/// Load and validate the configuration.
///
/// An explicit `path` must exist; the default location may be absent when
/// everything comes from the environment.
pub fn load(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let path = match path {
        Some(p) if !p.exists() => {
            return Err(ConfigError::NotFound { path: p.into() });
        }
        Some(p) => p.to_path_buf(),
        None => config_path(),
    };

    let config: AppConfig = figment(&path)?.extract()?;
    config.validate()?;
    Ok(config)
}

// ── Validation ──────────────────────────────────────────────────────

impl AppConfig {
    /// Checks that do not need Home Assistant. Card-level problems are
    /// caught later when the panel sessions are built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.home_assistant.base_url()?;

        if self.home_assistant.timeout_secs == 0 {
            return Err(ConfigError::Validation {
                field: "home_assistant.timeout_secs".into(),
                reason: "must be at least 1".into(),
            });
        }

        if self.panels.is_empty() {
            return Err(ConfigError::Validation {
                field: "panels".into(),
                reason: "at least one panel is required".into(),
            });
        }

        let mut names = HashSet::new();
        for panel in &self.panels {
            if !names.insert(panel.name.as_str()) {
                return Err(ConfigError::Validation {
                    field: "panels".into(),
                    reason: format!("duplicate panel name '{}'", panel.name),
                });
            }
            if panel.panel_recv_topic.is_empty() || panel.panel_send_topic.is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("panels.{}", panel.name),
                    reason: "panelRecvTopic and panelSendTopic are required".into(),
                });
            }
        }
        Ok(())
    }
}

impl HomeAssistant {
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let url: Url = self.url.parse().map_err(|_| ConfigError::Validation {
            field: "home_assistant.url".into(),
            reason: format!("invalid URL: {}", self.url),
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::Validation {
                field: "home_assistant.url".into(),
                reason: format!("expected http or https, got '{other}'"),
            }),
        }
    }

    pub fn transport(&self) -> TransportConfig {
        let tls = if self.insecure {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref ca) = self.ca_cert {
            TlsMode::CustomCa(ca.clone())
        } else {
            TlsMode::System
        };
        TransportConfig {
            tls,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    /// Keyring account the token is stored under.
    pub fn keyring_account(&self) -> String {
        format!("{}/token", self.url.trim_end_matches('/'))
    }

    /// Find the access token: `token_env`, then the keyring, then `token`.
    pub fn resolve_token(&self) -> Result<SecretString, ConfigError> {
        if let Some(ref env_name) = self.token_env {
            if let Ok(value) = std::env::var(env_name) {
                return Ok(SecretString::from(value));
            }
        }

        if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &self.keyring_account()) {
            if let Ok(secret) = entry.get_password() {
                return Ok(SecretString::from(secret));
            }
        }

        if let Some(ref token) = self.token {
            return Ok(SecretString::from(token.clone()));
        }

        Err(ConfigError::NoCredentials {
            url: self.url.clone(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn transport_prefers_insecure_over_custom_ca() {
        let mut ha = HomeAssistant {
            ca_cert: Some(PathBuf::from("/etc/ha.pem")),
            timeout_secs: 3,
            ..HomeAssistant::default()
        };
        let transport = ha.transport();
        assert!(matches!(transport.tls, TlsMode::CustomCa(ref p) if p == Path::new("/etc/ha.pem")));
        assert_eq!(transport.timeout, Duration::from_secs(3));

        ha.insecure = true;
        assert!(matches!(ha.transport().tls, TlsMode::DangerAcceptInvalid));
    }

    #[test]
    fn base_url_rejects_other_schemes() {
        let ha = HomeAssistant {
            url: "mqtt://broker:1883".into(),
            ..HomeAssistant::default()
        };
        assert!(matches!(ha.base_url(), Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn keyring_account_ignores_trailing_slash() {
        let ha = HomeAssistant {
            url: "http://ha.lan:8123/".into(),
            ..HomeAssistant::default()
        };
        assert_eq!(ha.keyring_account(), "http://ha.lan:8123/token");
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = figment(Path::new("panels.json")).err().unwrap();
        assert!(matches!(err, ConfigError::UnsupportedFormat { ref extension } if extension == "json"));
    }
}
