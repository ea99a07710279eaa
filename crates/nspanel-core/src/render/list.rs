// List cards (`cardEntities`, `cardGrid`): a heading plus one `entityUpd`
// whose body is every slot's fragment in card order. The panel counts
// slots positionally, so every entity yields exactly one fragment.

use super::{NOT_FOUND, Renderer};
use crate::icons::{COLOR_OFF, entity_color};
use crate::model::{Card, Entity, EntityKind};
use crate::protocol::PanelCommand;
use crate::store::EntityState;

pub(super) fn render(r: &Renderer<'_>, card: &Card) -> Vec<PanelCommand> {
    let body: String = card.entities.iter().map(|e| fragment(r, e)).collect();
    vec![
        PanelCommand::EntityUpdHeading(text(&card.heading)),
        PanelCommand::EntityUpd(body),
    ]
}

/// Free text for one positional field. The panel splits on `,` and `~`.
pub(super) fn text(raw: &str) -> String {
    raw.replace([',', '~'], " ")
}

/// `,<type>,<token>,<icon>,<color>,<name>,<value>` for one slot.
pub(super) fn fragment(r: &Renderer<'_>, entity: &Entity) -> String {
    let token = entity.token();
    match entity.kind {
        EntityKind::Delete => return ",delete,,,,,".to_owned(),
        EntityKind::Navigate => {
            let icon = r.icons.get(entity.icon.as_deref().unwrap_or("arrow-right-bold"));
            let name = text(
                entity
                    .name
                    .as_deref()
                    .or(entity.navigate_target())
                    .unwrap_or_default(),
            );
            return format!(",button,{token},{icon},{COLOR_OFF},{name},PRESS");
        }
        _ => {}
    }

    let Some(state) = r.state(entity) else {
        tracing::debug!(entity = %entity.entity_id, "entity not found, rendering placeholder");
        return format!(
            ",text,{token},{},{COLOR_OFF},{NOT_FOUND},{}",
            r.icons.alert(),
            entity.entity_id
        );
    };

    let icon = r.icon(entity, &state);
    let name = text(&Renderer::name(entity, &state));
    let value = text(&state.state);
    let switch = u8::from(state.is_on());

    match entity.kind {
        EntityKind::Light => {
            format!(",light,{token},{icon},{},{name},{switch}", entity_color(&state))
        }
        EntityKind::Toggle => {
            format!(",switch,{token},{icon},{},{name},{switch}", entity_color(&state))
        }
        EntityKind::Fan => {
            format!(",fan,{token},{icon},{},{name},{switch}", entity_color(&state))
        }
        EntityKind::Cover => format!(",shutter,{token},{icon},{COLOR_OFF},{name},"),
        EntityKind::Button => {
            format!(",button,{token},{icon},{COLOR_OFF},{name},{}", button_label(&state))
        }
        EntityKind::Slider => {
            let min = state.attr_f64("min").unwrap_or(0.0);
            let max = state.attr_f64("max").unwrap_or(100.0);
            format!(",number,{token},{icon},{COLOR_OFF},{name},{value}|{min}|{max}")
        }
        EntityKind::Select => {
            format!(",input_sel,{token},{icon},{COLOR_OFF},{name},{value}")
        }
        EntityKind::Timer => {
            format!(",timer,{token},{icon},{COLOR_OFF},{name},{value}")
        }
        EntityKind::Sensor | EntityKind::Climate | EntityKind::Media => {
            format!(",text,{token},{icon},{COLOR_OFF},{name},{}", text(&value_with_unit(&state)))
        }
        EntityKind::Delete | EntityKind::Navigate => String::new(),
    }
}

fn button_label(state: &EntityState) -> &'static str {
    match state.domain() {
        "scene" => "ACTIVATE",
        "script" => "RUN",
        "lock" if state.state == "locked" => "UNLOCK",
        "lock" => "LOCK",
        _ => "PRESS",
    }
}

/// State followed by its unit, if any.
pub(super) fn value_with_unit(state: &EntityState) -> String {
    match state.attr_str("unit_of_measurement").filter(|u| !u.is_empty()) {
        Some(unit) => format!("{} {unit}", state.state),
        None => state.state.clone(),
    }
}
