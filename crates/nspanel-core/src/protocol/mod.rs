// ── Panel wire protocol ──
//
// Outbound display commands are comma separated with the command name
// first; the firmware parses fields positionally, so every encoder here
// must reproduce the exact byte layout. Inbound events live in
// `event.rs`, numeric conversions in `convert.rs`.

pub mod convert;
pub mod event;

use std::fmt;
use std::str::FromStr;

use strum::{AsRefStr, EnumString};

pub use event::{DecodeError, PanelEvent};

/// Name token of an outbound command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString, strum::Display)]
pub enum CommandKind {
    #[strum(serialize = "pageType")]
    PageType,
    #[strum(serialize = "time")]
    Time,
    #[strum(serialize = "date")]
    Date,
    #[strum(serialize = "entityUpd")]
    EntityUpd,
    #[strum(serialize = "entityUpdHeading")]
    EntityUpdHeading,
    #[strum(serialize = "entityUpdateDetail")]
    EntityUpdateDetail,
    #[strum(serialize = "entityUpdateDetail2")]
    EntityUpdateDetail2,
    #[strum(serialize = "dimmode")]
    DimMode,
    #[strum(serialize = "timeout")]
    Timeout,
    #[strum(serialize = "weatherUpdate")]
    WeatherUpdate,
}

/// A display command sent to the panel.
///
/// Free-form payloads hold everything after `<name>,` verbatim.
/// `EntityUpd` is the exception: it keeps the raw tail *including* the
/// leading separator, because list bodies are concatenated `,`-prefixed
/// fragments and an empty list encodes as a bare `entityUpd`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelCommand {
    PageType(String),
    Time(String),
    Date(String),
    EntityUpd(String),
    EntityUpdHeading(String),
    EntityUpdateDetail(String),
    EntityUpdateDetail2(String),
    DimMode(DimMode),
    Timeout(u32),
    WeatherUpdate(String),
}

/// Fields of the `dimmode` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimMode {
    pub dim: u8,
    pub dim_normal: u8,
    pub background: String,
    pub font_color: String,
    pub feature_flags: u8,
}

impl PanelCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::PageType(_) => CommandKind::PageType,
            Self::Time(_) => CommandKind::Time,
            Self::Date(_) => CommandKind::Date,
            Self::EntityUpd(_) => CommandKind::EntityUpd,
            Self::EntityUpdHeading(_) => CommandKind::EntityUpdHeading,
            Self::EntityUpdateDetail(_) => CommandKind::EntityUpdateDetail,
            Self::EntityUpdateDetail2(_) => CommandKind::EntityUpdateDetail2,
            Self::DimMode(_) => CommandKind::DimMode,
            Self::Timeout(_) => CommandKind::Timeout,
            Self::WeatherUpdate(_) => CommandKind::WeatherUpdate,
        }
    }

    pub fn page_type(page: impl Into<String>) -> Self {
        Self::PageType(page.into())
    }
}

impl fmt::Display for PanelCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.kind();
        match self {
            Self::EntityUpd(tail) => write!(f, "{name}{tail}"),
            Self::PageType(s)
            | Self::Time(s)
            | Self::Date(s)
            | Self::EntityUpdHeading(s)
            | Self::EntityUpdateDetail(s)
            | Self::EntityUpdateDetail2(s)
            | Self::WeatherUpdate(s) => write!(f, "{name},{s}"),
            Self::DimMode(d) => write!(
                f,
                "{name},{},{},{},{},{}",
                d.dim, d.dim_normal, d.background, d.font_color, d.feature_flags
            ),
            Self::Timeout(secs) => write!(f, "{name},{secs}"),
        }
    }
}

impl FromStr for PanelCommand {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (head, rest) = match s.split_once(',') {
            Some((head, rest)) => (head, Some(rest)),
            None => (s, None),
        };
        let kind = CommandKind::from_str(head)
            .map_err(|_| DecodeError::UnknownCommand(head.to_owned()))?;

        if kind == CommandKind::EntityUpd {
            return Ok(Self::EntityUpd(s[head.len()..].to_owned()));
        }

        let rest = rest.ok_or(DecodeError::MissingField {
            kind: head.to_owned(),
            field: "payload",
        })?;
        let text = || rest.to_owned();

        Ok(match kind {
            CommandKind::PageType => Self::PageType(text()),
            CommandKind::Time => Self::Time(text()),
            CommandKind::Date => Self::Date(text()),
            CommandKind::EntityUpdHeading => Self::EntityUpdHeading(text()),
            CommandKind::EntityUpdateDetail => Self::EntityUpdateDetail(text()),
            CommandKind::EntityUpdateDetail2 => Self::EntityUpdateDetail2(text()),
            CommandKind::WeatherUpdate => Self::WeatherUpdate(text()),
            CommandKind::Timeout => Self::Timeout(parse_field(rest, "seconds")?),
            CommandKind::DimMode => {
                let fields: Vec<&str> = rest.split(',').collect();
                let [dim, dim_normal, background, font_color, flags] = fields.as_slice() else {
                    return Err(DecodeError::FieldCount {
                        kind: head.to_owned(),
                        expected: 5,
                        got: fields.len(),
                    });
                };
                Self::DimMode(DimMode {
                    dim: parse_field(dim, "dimValue")?,
                    dim_normal: parse_field(dim_normal, "dimValueNormal")?,
                    background: (*background).to_owned(),
                    font_color: (*font_color).to_owned(),
                    feature_flags: parse_field(flags, "featureFlags")?,
                })
            }
            CommandKind::EntityUpd => Self::EntityUpd(format!(",{rest}")),
        })
    }
}

fn parse_field<T: FromStr>(raw: &str, field: &'static str) -> Result<T, DecodeError> {
    raw.parse().map_err(|_| DecodeError::InvalidField {
        field,
        value: raw.to_owned(),
    })
}
