// Thermostat card. Temperatures go out in tenths. The HVAC mode buttons
// occupy a fixed grid of 4-field slots: an even number of modes is
// centred in the last four slots, an odd number in the first five.

use super::list::text;
use super::{NOT_FOUND, Renderer};
use crate::icons::hvac_mode_style;
use crate::model::Card;
use crate::protocol::PanelCommand;
use crate::store::EntityState;

const SLOT: &str = ",,,,";

pub(super) fn render(r: &Renderer<'_>, card: &Card) -> PanelCommand {
    let Some(entity) = card.entities.first() else {
        return PanelCommand::EntityUpd(String::new());
    };
    let token = entity.token();
    let Some(state) = r.state(entity) else {
        tracing::debug!(entity = %entity.entity_id, "thermostat entity not found");
        return PanelCommand::EntityUpd(format!(",{token},{NOT_FOUND},220,220,{NOT_FOUND},150,300,5"));
    };

    let heading = text(&if card.heading.is_empty() {
        Renderer::name(entity, &state)
    } else {
        card.heading.clone()
    });
    let current = tenths(&state, "current_temperature", 0.0);
    let target = tenths(&state, "temperature", 0.0);
    let action = text(state.attr_str("hvac_action").unwrap_or_default());
    let min = tenths(&state, "min_temp", 0.0);
    let max = tenths(&state, "max_temp", 0.0);
    let step = tenths(&state, "target_temp_step", 0.5);

    PanelCommand::EntityUpd(format!(
        ",{token},{heading},{current},{target},{action},{min},{max},{step}{}",
        hvac_buttons(r, &state)
    ))
}

fn hvac_buttons(r: &Renderer<'_>, state: &EntityState) -> String {
    let modes = state.attr_list("hvac_modes");
    let mut buttons = String::new();
    for mode in &modes {
        let (icon, color) = hvac_mode_style(mode);
        let active = u8::from(*mode == state.state);
        buttons.push_str(&format!(",{},{color},{active},{mode}", r.icons.get(icon)));
    }

    let n = modes.len();
    if n % 2 == 0 {
        let pad = SLOT.repeat(4usize.saturating_sub(n) / 2);
        format!("{}{pad}{buttons}{pad}", SLOT.repeat(5))
    } else {
        let pad = SLOT.repeat(5usize.saturating_sub(n) / 2);
        format!("{pad}{buttons}{pad}{}", SLOT.repeat(4))
    }
}

/// Attribute in tenths, truncated toward zero.
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn tenths(state: &EntityState, key: &str, default: f64) -> i64 {
    (state.attr_f64(key).unwrap_or(default) * 10.0).trunc() as i64
}
