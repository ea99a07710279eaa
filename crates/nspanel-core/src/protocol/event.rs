// Inbound panel events.
//
// Every message the panel originates starts with the `event` token.
// Tasmota wraps the line in a JSON envelope (`{"CustomRecv":"event,..."}`)
// which is stripped before decoding. Decoding never panics; anything
// unexpected becomes a `DecodeError` that the session logs and drops.

use std::fmt;

use thiserror::Error;

/// A decoded panel-to-controller event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEvent {
    /// Panel booted.
    Startup {
        firmware_version: String,
        model: Option<String>,
    },
    /// Idle timeout reached on the panel.
    SleepReached,
    /// Panel asks for the current card to be redrawn.
    RenderCurrentPage,
    /// User interaction.
    ButtonPress {
        target: String,
        button: String,
        value: Option<String>,
    },
    /// User opened a detail popup for an entity.
    PageOpenDetail { kind: String, target: String },
}

/// Why an inbound message (or an outbound command string) was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("empty message")]
    Empty,

    #[error("not an event message: {0:?}")]
    NotAnEvent(String),

    #[error("unknown event kind '{0}'")]
    UnknownEvent(String),

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("'{kind}' is missing field '{field}'")]
    MissingField { kind: String, field: &'static str },

    #[error("'{kind}' expects {expected} fields, got {got}")]
    FieldCount {
        kind: String,
        expected: usize,
        got: usize,
    },

    #[error("invalid value {value:?} for field '{field}'")]
    InvalidField { field: &'static str, value: String },

    #[error("unsupported JSON envelope: {0}")]
    Envelope(String),
}

impl PanelEvent {
    /// Decode a raw bus payload, unwrapping a Tasmota JSON envelope if present.
    pub fn from_payload(payload: &str) -> Result<Self, DecodeError> {
        let trimmed = payload.trim();
        if trimmed.starts_with('{') {
            let value: serde_json::Value = serde_json::from_str(trimmed)
                .map_err(|e| DecodeError::Envelope(e.to_string()))?;
            let line = value
                .get("CustomRecv")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| DecodeError::Envelope("no CustomRecv field".into()))?;
            return Self::decode(line);
        }
        Self::decode(trimmed)
    }

    /// Decode one comma-separated `event,...` line.
    pub fn decode(line: &str) -> Result<Self, DecodeError> {
        if line.is_empty() {
            return Err(DecodeError::Empty);
        }
        let tokens: Vec<&str> = line.split(',').collect();
        if tokens.first() != Some(&"event") {
            return Err(DecodeError::NotAnEvent(line.to_owned()));
        }
        let kind = *tokens.get(1).ok_or(DecodeError::MissingField {
            kind: "event".into(),
            field: "kind",
        })?;
        let field = |idx: usize, name: &'static str| -> Result<String, DecodeError> {
            tokens
                .get(idx)
                .map(|s| (*s).to_owned())
                .ok_or_else(|| DecodeError::MissingField {
                    kind: kind.to_owned(),
                    field: name,
                })
        };
        let optional = |idx: usize| tokens.get(idx).map(|s| (*s).to_owned());

        match kind {
            "startup" => Ok(Self::Startup {
                firmware_version: optional(2).unwrap_or_default(),
                model: optional(3).filter(|m| !m.is_empty()),
            }),
            "sleepReached" => Ok(Self::SleepReached),
            "renderCurrentPage" => Ok(Self::RenderCurrentPage),
            "buttonPress2" => Ok(Self::ButtonPress {
                target: field(2, "target")?,
                button: field(3, "button")?,
                value: optional(4),
            }),
            "pageOpenDetail" => Ok(Self::PageOpenDetail {
                kind: field(2, "detailKind")?,
                target: field(3, "target")?,
            }),
            other => Err(DecodeError::UnknownEvent(other.to_owned())),
        }
    }
}

impl fmt::Display for PanelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Startup {
                firmware_version,
                model: Some(model),
            } => write!(f, "event,startup,{firmware_version},{model}"),
            Self::Startup {
                firmware_version,
                model: None,
            } => write!(f, "event,startup,{firmware_version}"),
            Self::SleepReached => f.write_str("event,sleepReached"),
            Self::RenderCurrentPage => f.write_str("event,renderCurrentPage"),
            Self::ButtonPress {
                target,
                button,
                value: Some(value),
            } => write!(f, "event,buttonPress2,{target},{button},{value}"),
            Self::ButtonPress {
                target,
                button,
                value: None,
            } => write!(f, "event,buttonPress2,{target},{button}"),
            Self::PageOpenDetail { kind, target } => {
                write!(f, "event,pageOpenDetail,{kind},{target}")
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn decodes_button_press_with_value() {
        let event = PanelEvent::decode("event,buttonPress2,iid.42,brightnessSlider,80").unwrap();
        assert_eq!(
            event,
            PanelEvent::ButtonPress {
                target: "iid.42".into(),
                button: "brightnessSlider".into(),
                value: Some("80".into()),
            }
        );
    }

    #[test]
    fn decodes_button_press_without_value() {
        let event = PanelEvent::decode("event,buttonPress2,cover.garage,up").unwrap();
        assert!(matches!(event, PanelEvent::ButtonPress { value: None, .. }));
    }

    #[test]
    fn unwraps_tasmota_envelope() {
        let event =
            PanelEvent::from_payload(r#"{"CustomRecv":"event,pageOpenDetail,popupLight,iid.7"}"#)
                .unwrap();
        assert_eq!(
            event,
            PanelEvent::PageOpenDetail {
                kind: "popupLight".into(),
                target: "iid.7".into(),
            }
        );
    }

    #[test]
    fn startup_keeps_firmware_and_model() {
        let event = PanelEvent::decode("event,startup,53,eu").unwrap();
        assert_eq!(
            event,
            PanelEvent::Startup {
                firmware_version: "53".into(),
                model: Some("eu".into()),
            }
        );
        assert_eq!(event.to_string(), "event,startup,53,eu");
    }

    #[test]
    fn rejects_malformed_messages() {
        assert_eq!(PanelEvent::decode(""), Err(DecodeError::Empty));
        assert!(matches!(
            PanelEvent::decode("pageType,cardGrid"),
            Err(DecodeError::NotAnEvent(_))
        ));
        assert!(matches!(
            PanelEvent::decode("event,somethingNew,1"),
            Err(DecodeError::UnknownEvent(kind)) if kind == "somethingNew"
        ));
        assert!(matches!(
            PanelEvent::decode("event,buttonPress2,light.kitchen"),
            Err(DecodeError::MissingField { field: "button", .. })
        ));
        assert!(matches!(
            PanelEvent::from_payload(r#"{"StatusSNS":{}}"#),
            Err(DecodeError::Envelope(_))
        ));
    }

    #[test]
    fn events_round_trip_through_display() {
        for line in [
            "event,sleepReached",
            "event,renderCurrentPage",
            "event,buttonPress2,screensaver,bExit,1",
            "event,pageOpenDetail,popupInSel,iid.9",
        ] {
            assert_eq!(PanelEvent::decode(line).unwrap().to_string(), line);
        }
    }
}
