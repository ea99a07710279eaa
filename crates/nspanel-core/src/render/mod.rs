// ── Card renderer ──
//
// `Renderer` turns a card (or a detail popup) into the display commands
// for its current entity states. It only reads: state comes from the
// `EntityStore`, glyphs from the shared `IconTable`. A failed lookup
// degrades that one slot to a placeholder and never aborts the card.

mod detail;
mod list;
mod media;
mod screensaver;
mod thermo;

use crate::icons::IconTable;
use crate::model::{Card, CardKind, Entity};
use crate::protocol::PanelCommand;
use crate::store::{EntityState, EntityStore};

pub use detail::DetailKind;

/// Placeholder name for a slot whose entity is missing.
pub const NOT_FOUND: &str = "Not found";

pub struct Renderer<'a> {
    store: &'a dyn EntityStore,
    icons: &'a IconTable,
}

impl<'a> Renderer<'a> {
    pub fn new(store: &'a dyn EntityStore, icons: &'a IconTable) -> Self {
        Self { store, icons }
    }

    /// Content commands for `card`, without the `pageType` switch.
    pub fn card(&self, card: &Card) -> Vec<PanelCommand> {
        match card.kind {
            CardKind::Entities | CardKind::Grid => list::render(self, card),
            CardKind::Thermo => vec![thermo::render(self, card)],
            CardKind::Media => vec![media::render(self, card)],
            CardKind::Unlock => vec![PanelCommand::EntityUpd(format!(
                ",{},navigate.{}",
                card.heading,
                card.destination.as_deref().unwrap_or_default()
            ))],
            CardKind::Screensaver => screensaver::render(self, card).into_iter().collect(),
        }
    }

    /// Content of a detail popup for `entity`. `None` when the entity has
    /// no state to show.
    pub fn detail(&self, kind: DetailKind, entity: &Entity) -> Option<PanelCommand> {
        let Some(state) = self.state(entity) else {
            tracing::debug!(entity = %entity.entity_id, %kind, "detail popup for missing entity");
            return None;
        };
        Some(detail::render(self, kind, entity, &state))
    }

    fn state(&self, entity: &Entity) -> Option<EntityState> {
        self.store.state(&entity.entity_id)
    }

    /// Glyph for an entity, honouring its configured icon.
    fn icon(&self, entity: &Entity, state: &EntityState) -> char {
        self.icons.for_state(state, entity.icon.as_deref())
    }

    /// Configured name, else `friendly_name`.
    fn name(entity: &Entity, state: &EntityState) -> String {
        entity
            .name
            .clone()
            .unwrap_or_else(|| state.friendly_name().to_owned())
    }
}
