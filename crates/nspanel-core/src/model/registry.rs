// ── Card registry ──
//
// Every card lives in one arena keyed by its short id. Visible cards keep
// their config order in `visible`, which is only used to link the swipe
// chain (prev/next) once at construction. Hidden cards share the arena
// and differ only by their flag. The screensaver is held separately so
// it is always present.

use std::collections::HashMap;

use indexmap::IndexMap;

use super::card::Card;
use super::entity::{IidAllocator, ShortId};
use crate::config::PanelConfig;
use crate::error::CoreError;

#[derive(Debug, Clone)]
pub struct CardRegistry {
    cards: IndexMap<ShortId, Card>,
    visible: Vec<ShortId>,
    navigate_keys: HashMap<String, ShortId>,
    /// Entity short id -> owning card.
    entity_iids: HashMap<ShortId, ShortId>,
    screensaver: Card,
}

impl CardRegistry {
    /// Build every card of a panel.
    pub fn from_panel(config: &PanelConfig, alloc: &IidAllocator) -> Result<Self, CoreError> {
        if config.cards.is_empty() {
            return Err(CoreError::NoCards {
                panel: config.name.clone(),
            });
        }

        let screensaver = Card::screensaver(&config.screensaver, alloc);
        let mut registry = Self {
            cards: IndexMap::new(),
            visible: Vec::new(),
            navigate_keys: HashMap::new(),
            entity_iids: HashMap::new(),
            screensaver,
        };
        let screensaver_entities: Vec<ShortId> =
            registry.screensaver.entities.iter().map(|e| e.iid).collect();
        for iid in screensaver_entities {
            registry.entity_iids.insert(iid, registry.screensaver.iid);
        }

        for cfg in &config.cards {
            let card = Card::from_config(cfg, false, alloc)?;
            registry.visible.push(card.iid);
            registry.insert(card)?;
        }
        registry.link_siblings();

        for cfg in &config.hidden_cards {
            registry.insert(Card::from_config(cfg, true, alloc)?)?;
        }

        tracing::debug!(
            panel = %config.name,
            visible = registry.visible.len(),
            total = registry.cards.len(),
            entities = registry.entity_iids.len(),
            "card registry built"
        );
        Ok(registry)
    }

    fn insert(&mut self, card: Card) -> Result<(), CoreError> {
        if let Some(key) = &card.navigate_key {
            if self.navigate_keys.contains_key(key) {
                return Err(CoreError::DuplicateNavigationKey {
                    card: card.label().to_owned(),
                    key: key.clone(),
                });
            }
            self.navigate_keys.insert(key.clone(), card.iid);
        }
        if self.cards.contains_key(&card.iid) || card.iid == self.screensaver.iid {
            return Err(CoreError::DuplicateShortId {
                card: card.label().to_owned(),
                iid: card.iid.to_string(),
            });
        }
        for entity in &card.entities {
            if self.entity_iids.insert(entity.iid, card.iid).is_some() {
                return Err(CoreError::DuplicateShortId {
                    card: card.label().to_owned(),
                    iid: entity.iid.to_string(),
                });
            }
        }
        self.cards.insert(card.iid, card);
        Ok(())
    }

    /// Cyclic prev/next over visible cards; left unset for a single card.
    fn link_siblings(&mut self) {
        let n = self.visible.len();
        if n < 2 {
            return;
        }
        for (idx, iid) in self.visible.iter().enumerate() {
            let prev = self.visible[(idx + n - 1) % n];
            let next = self.visible[(idx + 1) % n];
            if let Some(card) = self.cards.get_mut(iid) {
                card.prev = Some(prev);
                card.next = Some(next);
            }
        }
    }

    // ── Lookup ───────────────────────────────────────────────────────

    pub fn get(&self, iid: ShortId) -> Option<&Card> {
        if iid == self.screensaver.iid {
            return Some(&self.screensaver);
        }
        self.cards.get(&iid)
    }

    /// Resolve a card by navigation key, or by short id (`7` / `iid.7`).
    pub fn search(&self, key: &str) -> Option<&Card> {
        if let Some(iid) = self.navigate_keys.get(key) {
            return self.cards.get(iid);
        }
        let raw = key.strip_prefix("iid.").unwrap_or(key);
        let iid = ShortId::new(raw.parse().ok()?);
        self.cards.get(&iid)
    }

    pub fn screensaver(&self) -> &Card {
        &self.screensaver
    }

    pub fn is_screensaver(&self, iid: ShortId) -> bool {
        iid == self.screensaver.iid
    }

    /// Visible cards in config order.
    pub fn visible(&self) -> &[ShortId] {
        &self.visible
    }

    /// All configured cards (visible, then hidden), excluding the screensaver.
    pub fn cards(&self) -> impl Iterator<Item = &Card> {
        self.cards.values()
    }

    /// Every card including the screensaver.
    pub fn all_cards(&self) -> impl Iterator<Item = &Card> {
        self.cards.values().chain(std::iter::once(&self.screensaver))
    }

    /// Total number of entity slots across all cards.
    pub fn entity_count(&self) -> usize {
        self.entity_iids.len()
    }

    /// Resolve `defaultCard` (`navigate.<key>`), else the first visible card.
    pub fn default_card(&self, default_card: Option<&str>) -> ShortId {
        default_card
            .and_then(|d| d.split_once('.'))
            .and_then(|(_, key)| self.search(key))
            .map(|c| c.iid)
            .or_else(|| self.visible.first().copied())
            .unwrap_or(self.screensaver.iid)
    }
}
