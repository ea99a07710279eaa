// Media card. Fields are `|`-separated inside a single `entityUpd`
// field because titles routinely contain commas.

use super::{NOT_FOUND, Renderer};
use crate::model::Card;
use crate::protocol::PanelCommand;

pub(super) fn render(r: &Renderer<'_>, card: &Card) -> PanelCommand {
    let Some(entity) = card.entities.first() else {
        return PanelCommand::EntityUpd(String::new());
    };
    let token = entity.token();
    let play = r.icons.get("play");

    let Some(state) = r.state(entity) else {
        tracing::debug!(entity = %entity.entity_id, "media entity not found");
        return PanelCommand::EntityUpd(format!(
            ",|{token}|{NOT_FOUND}|{}|Please check your|configuration|50|{play}",
            r.icons.alert()
        ));
    };

    let heading = if card.heading.is_empty() {
        Renderer::name(entity, &state)
    } else {
        card.heading.clone()
    };
    let icon = if state.attr_str("media_content_type") == Some("music") {
        r.icons.get("music")
    } else {
        r.icon(entity, &state)
    };
    let title = state.attr_str("media_title").unwrap_or_default();
    let artist = state.attr_str("media_artist").unwrap_or_default();
    let volume = volume_percent(state.attr_f64("volume_level").unwrap_or(0.0));
    let play_pause = if state.state == "playing" {
        r.icons.get("pause")
    } else {
        play
    };

    PanelCommand::EntityUpd(format!(
        ",|{token}|{heading}|{icon}|{title}|{artist}|{volume}|{play_pause}"
    ))
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn volume_percent(level: f64) -> i64 {
    (level.clamp(0.0, 1.0) * 100.0).trunc() as i64
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::super::testing::MemoryStore;
    use super::*;
    use crate::config::{CardConfig, EntityConfig};
    use crate::icons::IconTable;
    use crate::model::IidAllocator;
    use crate::store::EntityState;

    fn media_card(heading: Option<&str>) -> Card {
        let cfg = CardConfig {
            card_type: "cardMedia".into(),
            heading: heading.map(str::to_owned),
            entities: vec![EntityConfig::new("media_player.kitchen")],
            key: None,
            sleep_timeout: None,
            pin: None,
            destination: None,
        };
        Card::from_config(&cfg, false, &IidAllocator::new()).unwrap()
    }

    #[test]
    fn playing_music() {
        let state = EntityState::new("media_player.kitchen", "playing")
            .with_attr("friendly_name", "Kitchen")
            .with_attr("media_content_type", "music")
            .with_attr("media_title", "So What")
            .with_attr("media_artist", "Miles Davis")
            .with_attr("volume_level", 0.5);
        let store = MemoryStore::default().with(state);
        let icons = IconTable::builtin();
        let out = render(&Renderer::new(&store, &icons), &media_card(None));
        assert_eq!(
            out.to_string(),
            format!(
                "entityUpd,|iid.2|Kitchen|{}|So What|Miles Davis|50|{}",
                icons.get("music"),
                icons.get("pause")
            )
        );
    }

    #[test]
    fn missing_player_placeholder() {
        let store = MemoryStore::default();
        let icons = IconTable::builtin();
        let out = render(&Renderer::new(&store, &icons), &media_card(Some("Radio")));
        assert_eq!(
            out.to_string(),
            format!(
                "entityUpd,|iid.2|Not found|{}|Please check your|configuration|50|{}",
                icons.alert(),
                icons.get("play")
            )
        );
    }
}
