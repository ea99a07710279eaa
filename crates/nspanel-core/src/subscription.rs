// ── Entity subscription index ──
//
// Reverse index from external entity id to the cards that show it. Built
// once per panel so a state-change notice costs one hash lookup instead
// of a scan over every card.

use std::collections::{HashMap, HashSet};

use crate::model::{CardRegistry, ShortId};

#[derive(Debug, Clone, Default)]
pub struct SubscriptionIndex {
    by_entity: HashMap<String, Vec<ShortId>>,
}

impl SubscriptionIndex {
    /// Index every card in the registry, screensaver included. Pseudo
    /// entities (`navigate.*`, `delete`) are skipped.
    pub fn build(registry: &CardRegistry) -> Self {
        let mut by_entity: HashMap<String, Vec<ShortId>> = HashMap::new();
        for card in registry.all_cards() {
            for entity in card.entities.iter().filter(|e| !e.kind.is_internal()) {
                let owners = by_entity.entry(entity.entity_id.clone()).or_default();
                if !owners.contains(&card.iid) {
                    owners.push(card.iid);
                }
            }
        }
        Self { by_entity }
    }

    /// Cards showing `entity_id`.
    pub fn cards_for(&self, entity_id: &str) -> &[ShortId] {
        self.by_entity.get(entity_id).map_or(&[], Vec::as_slice)
    }

    /// Whether `entity_id` is shown on `card`.
    pub fn affects(&self, entity_id: &str, card: ShortId) -> bool {
        self.cards_for(entity_id).contains(&card)
    }

    /// All indexed entity ids.
    pub fn entities(&self) -> HashSet<&str> {
        self.by_entity.keys().map(String::as_str).collect()
    }
}
