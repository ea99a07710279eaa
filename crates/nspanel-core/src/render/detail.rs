// Detail popups. Every popup payload starts with the entity token so the
// panel can match it to the overlay it has open.

use strum::{AsRefStr, EnumString};

use super::Renderer;
use crate::icons::{COLOR_OFF, entity_color};
use crate::model::Entity;
use crate::protocol::PanelCommand;
use crate::protocol::convert::scale_int;
use crate::store::EntityState;

const DISABLE: &str = "disable";
const ENABLE: &str = "enable";
const COLOR_MODES: &[&str] = &["xy", "rgb", "rgbw", "rgbww", "hs"];

/// Popup kinds the panel can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString, strum::Display)]
pub enum DetailKind {
    #[strum(serialize = "popupLight")]
    Light,
    #[strum(serialize = "popupShutter")]
    Shutter,
    #[strum(serialize = "popupFan")]
    Fan,
    #[strum(serialize = "popupTimer")]
    Timer,
    #[strum(serialize = "popupInSel")]
    InSel,
}

impl DetailKind {
    /// Popups that show `domain`, refreshed when its state changes.
    pub fn for_domain(domain: &str) -> &'static [DetailKind] {
        match domain {
            "light" => &[Self::InSel, Self::Light],
            "cover" => &[Self::Shutter],
            "fan" => &[Self::Fan],
            "timer" => &[Self::Timer],
            "input_select" | "select" => &[Self::InSel],
            _ => &[],
        }
    }
}

pub(super) fn render(
    r: &Renderer<'_>,
    kind: DetailKind,
    entity: &Entity,
    state: &EntityState,
) -> PanelCommand {
    let token = entity.token();
    match kind {
        DetailKind::Light => PanelCommand::EntityUpdateDetail(light(r, &token, entity, state)),
        DetailKind::Shutter => {
            let pos = state
                .attr_f64("current_position")
                .map_or(50, |p| scale_int(p, (0.0, 100.0), (0.0, 100.0)));
            PanelCommand::EntityUpdateDetail(format!("{token},{}", 100 - pos))
        }
        DetailKind::Fan => PanelCommand::EntityUpdateDetail(fan(r, &token, entity, state)),
        DetailKind::Timer => {
            let remaining = state
                .attr_str("remaining")
                .or_else(|| state.attr_str("duration"))
                .unwrap_or_default();
            PanelCommand::EntityUpdateDetail(format!(
                "{token},{},{COLOR_OFF},{remaining},{}",
                r.icon(entity, state),
                state.state
            ))
        }
        DetailKind::InSel => PanelCommand::EntityUpdateDetail2(in_sel(&token, entity, state)),
    }
}

/// `<token>,<icon>,<color>,<on>,<brightness>,<color temp>,<color wheel>`.
fn light(r: &Renderer<'_>, token: &str, entity: &Entity, state: &EntityState) -> String {
    let on = state.is_on();
    let modes = state.attr_list("supported_color_modes");

    let (brightness, color_temp, color) = if on {
        let brightness = state
            .attr_f64("brightness")
            .map_or_else(|| DISABLE.to_owned(), |b| scale_int(b, (0.0, 255.0), (0.0, 100.0)).to_string());
        let color_temp = if modes.iter().any(|m| m == "color_temp") {
            match state.attr_f64("color_temp") {
                Some(ct) => {
                    let min = state.attr_f64("min_mireds").unwrap_or(153.0);
                    let max = state.attr_f64("max_mireds").unwrap_or(500.0);
                    scale_int(ct, (min, max), (0.0, 100.0)).to_string()
                }
                None => "unknown".to_owned(),
            }
        } else {
            DISABLE.to_owned()
        };
        let color = if modes.iter().any(|m| COLOR_MODES.contains(&m.as_str())) {
            ENABLE
        } else {
            DISABLE
        };
        (brightness, color_temp, color)
    } else {
        (DISABLE.to_owned(), DISABLE.to_owned(), DISABLE)
    };

    format!(
        "{token},{},{},{},{brightness},{color_temp},{color}",
        r.icon(entity, state),
        entity_color(state),
        u8::from(on)
    )
}

/// `<token>,<icon>,<color>,<on>,<speed %|disable>,<preset>,<presets>`.
fn fan(r: &Renderer<'_>, token: &str, entity: &Entity, state: &EntityState) -> String {
    let speed = state
        .attr_f64("percentage")
        .map_or_else(|| DISABLE.to_owned(), |p| scale_int(p, (0.0, 100.0), (0.0, 100.0)).to_string());
    let preset = state.attr_str("preset_mode").unwrap_or_default();
    let presets = state.attr_list("preset_modes").join("?");
    format!(
        "{token},{},{},{},{speed},{preset},{presets}",
        r.icon(entity, state),
        entity_color(state),
        u8::from(state.is_on())
    )
}

/// `<token>,,<color>,<mode>,<current>,<options ?-joined>`.
fn in_sel(token: &str, entity: &Entity, state: &EntityState) -> String {
    let (mode, current, options) = if state.domain() == "light" {
        let options = entity
            .effect_list
            .clone()
            .unwrap_or_else(|| state.attr_list("effect_list"));
        let current = state.attr_str("effect").unwrap_or_default().to_owned();
        ("light", current, options)
    } else {
        (state.domain(), state.state.clone(), state.attr_list("options"))
    };
    format!(
        "{token},,{},{mode},{current},{}",
        entity_color(state),
        options.join("?")
    )
}
