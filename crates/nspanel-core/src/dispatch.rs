// ── Button dispatcher ──
//
// Turns a `buttonPress2` into either an internal navigation request or a
// single Home Assistant service call. Button names form a closed enum;
// each external button parses its raw value into a typed `EntityAction`
// before any service data is built, so malformed input is rejected in one
// place and never reaches the store.

use std::str::FromStr;

use serde_json::{Value, json};
use strum::{AsRefStr, EnumString};
use thiserror::Error;

use crate::protocol::convert::{pos_to_color, scale, scale_int};
use crate::store::{EntityState, ServiceCall, domain_of};

/// Colour wheel edge length on the stock firmware.
pub const DEFAULT_WHEEL_SIZE: f64 = 160.0;
const DEFAULT_MIN_MIREDS: f64 = 153.0;
const DEFAULT_MAX_MIREDS: f64 = 500.0;

/// Every button kind the panel firmware sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString, strum::Display)]
pub enum ButtonType {
    // ── Internal ──
    #[strum(serialize = "bExit")]
    Exit,
    #[strum(serialize = "bNext")]
    Next,
    #[strum(serialize = "bPrev")]
    Prev,
    #[strum(serialize = "cardUnlock-unlock")]
    Unlock,
    /// Generic press; internal for `navigate.*` targets.
    #[strum(serialize = "button")]
    Button,

    // ── Entity actions ──
    #[strum(serialize = "OnOff")]
    OnOff,
    #[strum(serialize = "up")]
    CoverUp,
    #[strum(serialize = "stop")]
    CoverStop,
    #[strum(serialize = "down")]
    CoverDown,
    #[strum(serialize = "positionSlider")]
    PositionSlider,
    #[strum(serialize = "tiltOpen")]
    TiltOpen,
    #[strum(serialize = "tiltStop")]
    TiltStop,
    #[strum(serialize = "tiltClose")]
    TiltClose,
    #[strum(serialize = "media-next")]
    MediaNext,
    #[strum(serialize = "media-back")]
    MediaBack,
    #[strum(serialize = "media-pause")]
    MediaPause,
    #[strum(serialize = "media-OnOff")]
    MediaOnOff,
    #[strum(serialize = "volumeSlider")]
    VolumeSlider,
    #[strum(serialize = "volumeMute")]
    VolumeMute,
    #[strum(serialize = "hvac_action")]
    HvacAction,
    #[strum(serialize = "tempUpd")]
    TempUpd,
    #[strum(serialize = "brightnessSlider")]
    BrightnessSlider,
    #[strum(serialize = "colorTempSlider")]
    ColorTempSlider,
    #[strum(serialize = "colorWheel")]
    ColorWheel,
    #[strum(serialize = "mode-light")]
    ModeLight,
    #[strum(serialize = "mode-input_select")]
    ModeInputSelect,
    #[strum(serialize = "mode-select")]
    ModeSelect,
    #[strum(serialize = "number-set")]
    NumberSet,
    #[strum(serialize = "timer-start")]
    TimerStart,
    #[strum(serialize = "timer-pause")]
    TimerPause,
    #[strum(serialize = "timer-cancel")]
    TimerCancel,
    #[strum(serialize = "timer-finish")]
    TimerFinish,
}

/// Why a button press was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("unknown button type '{0}'")]
    UnknownButton(String),

    #[error("button '{button}' needs a value")]
    MissingValue { button: ButtonType },

    #[error("button '{button}': invalid value {value:?}")]
    InvalidValue { button: ButtonType, value: String },

    #[error("button '{button}' is handled by the navigator")]
    Navigation { button: ButtonType },

    #[error("button '{button}' has no action for '{entity_id}'")]
    Unsupported { button: ButtonType, entity_id: String },
}

/// Timer service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum TimerOp {
    Start,
    Pause,
    Cancel,
    Finish,
}

/// A parsed entity action with its typed payload.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityAction {
    Power(bool),
    Press,
    CoverOpen,
    CoverStop,
    CoverClose,
    CoverPosition(u8),
    TiltOpen,
    TiltStop,
    TiltClose,
    MediaNext,
    MediaPrevious,
    MediaPlayPause,
    /// `None` toggles on the current state.
    MediaPower(Option<bool>),
    /// Percent.
    Volume(u8),
    /// `None` toggles on the current state.
    VolumeMute(Option<bool>),
    HvacMode(String),
    /// Degrees (the panel sends tenths).
    Temperature(f64),
    /// Slider percent.
    Brightness(f64),
    /// Slider percent.
    ColorTemp(f64),
    ColorWheel { x: f64, y: f64, size: f64 },
    /// Index into the effect list.
    LightEffect(usize),
    /// Index into the `options` attribute.
    SelectOption(usize),
    NumberSet(f64),
    Timer(TimerOp),
}

impl EntityAction {
    /// Parse the payload of an external button.
    pub fn parse(button: ButtonType, value: Option<&str>) -> Result<Self, DispatchError> {
        let required = || value.ok_or(DispatchError::MissingValue { button });
        let invalid = |raw: &str| DispatchError::InvalidValue {
            button,
            value: raw.to_owned(),
        };
        let number = || -> Result<f64, DispatchError> {
            let raw = required()?;
            raw.trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| invalid(raw))
        };
        let percent = || number().map(clamp_percent);
        let index = || {
            let raw = required()?;
            raw.trim().parse::<usize>().map_err(|_| invalid(raw))
        };

        Ok(match button {
            ButtonType::OnOff => Self::Power(value == Some("1")),
            ButtonType::Button => Self::Press,
            ButtonType::CoverUp => Self::CoverOpen,
            ButtonType::CoverStop => Self::CoverStop,
            ButtonType::CoverDown => Self::CoverClose,
            ButtonType::PositionSlider => Self::CoverPosition(percent()?),
            ButtonType::TiltOpen => Self::TiltOpen,
            ButtonType::TiltStop => Self::TiltStop,
            ButtonType::TiltClose => Self::TiltClose,
            ButtonType::MediaNext => Self::MediaNext,
            ButtonType::MediaBack => Self::MediaPrevious,
            ButtonType::MediaPause => Self::MediaPlayPause,
            ButtonType::MediaOnOff => Self::MediaPower(value.and_then(parse_flag)),
            ButtonType::VolumeSlider => Self::Volume(percent()?),
            ButtonType::VolumeMute => Self::VolumeMute(value.and_then(parse_flag)),
            ButtonType::HvacAction => {
                let mode = required()?.trim();
                if mode.is_empty() {
                    return Err(invalid(mode));
                }
                Self::HvacMode(mode.to_owned())
            }
            ButtonType::TempUpd => Self::Temperature(number()? / 10.0),
            ButtonType::BrightnessSlider => Self::Brightness(number()?),
            ButtonType::ColorTempSlider => Self::ColorTemp(number()?),
            ButtonType::ColorWheel => {
                let raw = required()?;
                let parts: Vec<f64> = raw
                    .split('|')
                    .map(|p| p.trim().parse::<f64>().map_err(|_| invalid(raw)))
                    .collect::<Result<_, _>>()?;
                match parts.as_slice() {
                    [x, y] => Self::ColorWheel { x: *x, y: *y, size: DEFAULT_WHEEL_SIZE },
                    [x, y, size] => Self::ColorWheel { x: *x, y: *y, size: *size },
                    _ => return Err(invalid(raw)),
                }
            }
            ButtonType::ModeLight => Self::LightEffect(index()?),
            ButtonType::ModeInputSelect | ButtonType::ModeSelect => Self::SelectOption(index()?),
            ButtonType::NumberSet => Self::NumberSet(number()?),
            ButtonType::TimerStart => Self::Timer(TimerOp::Start),
            ButtonType::TimerPause => Self::Timer(TimerOp::Pause),
            ButtonType::TimerCancel => Self::Timer(TimerOp::Cancel),
            ButtonType::TimerFinish => Self::Timer(TimerOp::Finish),
            ButtonType::Exit | ButtonType::Next | ButtonType::Prev | ButtonType::Unlock => {
                return Err(DispatchError::Navigation { button });
            }
        })
    }

    /// Build the service call for `entity_id`.
    ///
    /// `state` is the entity's current state, needed by actions that read
    /// attributes (mired range, select options, lock state). `effects`
    /// overrides the light's own `effect_list`. `None` means the action
    /// has no meaning for this entity.
    pub fn service_call(
        &self,
        entity_id: &str,
        state: Option<&EntityState>,
        effects: Option<&[String]>,
    ) -> Option<ServiceCall> {
        let domain = domain_of(entity_id);
        let call = |service: &str| ServiceCall::on_entity(entity_id, service);

        Some(match self {
            Self::Power(on) => call(if *on { "turn_on" } else { "turn_off" }),
            Self::Press => return press(entity_id, domain, state),
            Self::CoverOpen => call("open_cover"),
            Self::CoverStop => call("stop_cover"),
            Self::CoverClose => call("close_cover"),
            Self::CoverPosition(pos) => call("set_cover_position").with("position", *pos),
            Self::TiltOpen => call("open_cover_tilt"),
            Self::TiltStop => call("stop_cover_tilt"),
            Self::TiltClose => call("close_cover_tilt"),
            Self::MediaNext => call("media_next_track"),
            Self::MediaPrevious => call("media_previous_track"),
            Self::MediaPlayPause => call("media_play_pause"),
            Self::MediaPower(flag) => {
                let on = flag.unwrap_or_else(|| state.is_none_or(|s| s.state == "off"));
                call(if on { "turn_on" } else { "turn_off" })
            }
            Self::Volume(pct) => {
                call("volume_set").with("volume_level", f64::from(*pct) / 100.0)
            }
            Self::VolumeMute(flag) => {
                let muted = flag.unwrap_or_else(|| {
                    !state
                        .and_then(|s| s.attr("is_volume_muted"))
                        .and_then(Value::as_bool)
                        .unwrap_or(false)
                });
                call("volume_mute").with("is_volume_muted", muted)
            }
            Self::HvacMode(mode) => call("set_hvac_mode").with("hvac_mode", mode.as_str()),
            Self::Temperature(t) => call("set_temperature").with("temperature", *t),
            Self::Brightness(pct) => {
                call("turn_on").with("brightness", scale_int(*pct, (0.0, 100.0), (0.0, 255.0)))
            }
            Self::ColorTemp(pct) => {
                let min = state.and_then(|s| s.attr_f64("min_mireds")).unwrap_or(DEFAULT_MIN_MIREDS);
                let max = state.and_then(|s| s.attr_f64("max_mireds")).unwrap_or(DEFAULT_MAX_MIREDS);
                call("turn_on").with("color_temp", scale_int(*pct, (0.0, 100.0), (min, max)))
            }
            Self::ColorWheel { x, y, size } => {
                call("turn_on").with("rgb_color", json!(pos_to_color(*x, *y, *size)))
            }
            Self::LightEffect(idx) => {
                let list = effects
                    .map(<[String]>::to_vec)
                    .or_else(|| state.map(|s| s.attr_list("effect_list")))?;
                let effect = list.get(*idx)?;
                call("turn_on").with("effect", effect.as_str())
            }
            Self::SelectOption(idx) => {
                let options = state?.attr_list("options");
                let option = options.get(*idx)?;
                call("select_option").with("option", option.as_str())
            }
            Self::NumberSet(v) => call("set_value").with("value", *v),
            Self::Timer(op) => ServiceCall::new(entity_id, "timer", op.as_ref()),
        })
    }
}

/// Generic `button` press, by domain.
fn press(entity_id: &str, domain: &str, state: Option<&EntityState>) -> Option<ServiceCall> {
    let service = match domain {
        "scene" | "script" => "turn_on",
        "light" | "switch" | "input_boolean" | "automation" | "fan" | "media_player" | "cover" => {
            "toggle"
        }
        "button" | "input_button" => "press",
        "lock" => {
            if state.is_some_and(|s| s.state == "locked") {
                "unlock"
            } else {
                "lock"
            }
        }
        _ => return None,
    };
    Some(ServiceCall::on_entity(entity_id, service))
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim() {
        "1" | "true" | "on" => Some(true),
        "0" | "false" | "off" => Some(false),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
fn clamp_percent(v: f64) -> u8 {
    scale(v, (0.0, 100.0), (0.0, 100.0)).round() as u8
}

/// Parse a press on `entity_id` and build its service call.
pub fn dispatch(
    button: ButtonType,
    value: Option<&str>,
    entity_id: &str,
    state: Option<&EntityState>,
    effects: Option<&[String]>,
) -> Result<ServiceCall, DispatchError> {
    EntityAction::parse(button, value)?
        .service_call(entity_id, state, effects)
        .ok_or_else(|| DispatchError::Unsupported {
            button,
            entity_id: entity_id.to_owned(),
        })
}

/// Parse the button name, rejecting unknown kinds.
pub fn parse_button(raw: &str) -> Result<ButtonType, DispatchError> {
    ButtonType::from_str(raw).map_err(|_| DispatchError::UnknownButton(raw.to_owned()))
}
