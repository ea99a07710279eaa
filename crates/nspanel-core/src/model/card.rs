use std::str::FromStr;

use strum::{AsRefStr, EnumString, IntoStaticStr};

use super::entity::{Entity, EntityKind, IidAllocator, ShortId};
use crate::config::{CardConfig, EntityConfig, ScreensaverConfig};
use crate::error::CoreError;

/// Page layout of a card. The string form is the panel's page type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString, IntoStaticStr, strum::Display)]
pub enum CardKind {
    #[strum(serialize = "cardEntities")]
    Entities,
    #[strum(serialize = "cardGrid")]
    Grid,
    #[strum(serialize = "cardThermo")]
    Thermo,
    #[strum(serialize = "cardMedia")]
    Media,
    #[strum(serialize = "cardUnlock")]
    Unlock,
    #[strum(serialize = "screensaver")]
    Screensaver,
}

impl CardKind {
    /// The entity kind a single-entity card is built around.
    pub fn single_entity_kind(self) -> Option<EntityKind> {
        match self {
            Self::Thermo => Some(EntityKind::Climate),
            Self::Media => Some(EntityKind::Media),
            _ => None,
        }
    }
}

/// A full-screen page.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub iid: ShortId,
    pub kind: CardKind,
    pub heading: String,
    /// Wire order equals config order.
    pub entities: Vec<Entity>,
    pub navigate_key: Option<String>,
    pub prev: Option<ShortId>,
    pub next: Option<ShortId>,
    /// Reachable only through explicit navigation.
    pub hidden: bool,
    pub sleep_timeout: Option<u32>,
    pub pin: Option<String>,
    pub destination: Option<String>,
    /// Screensaver only: first `bExit` tap is swallowed.
    pub double_tap_to_unlock: bool,
}

impl Card {
    /// Build a card from its config.
    ///
    /// Unknown card types and structurally invalid cards are fatal;
    /// entities in unsupported domains are logged and skipped.
    pub fn from_config(
        config: &CardConfig,
        hidden: bool,
        alloc: &IidAllocator,
    ) -> Result<Self, CoreError> {
        let label = config.label().to_owned();
        let kind = CardKind::from_str(&config.card_type)
            .ok()
            .filter(|k| *k != CardKind::Screensaver)
            .ok_or_else(|| CoreError::UnknownCardType {
                card: label.clone(),
                card_type: config.card_type.clone(),
            })?;

        if kind == CardKind::Unlock && (config.pin.is_none() || config.destination.is_none()) {
            return Err(CoreError::InvalidCard {
                card: label,
                message: "cardUnlock needs both `pin` and `destination`".into(),
            });
        }

        let iid = alloc.allocate();
        let entities = build_entities(&label, &config.entities, alloc);

        // Counted after unsupported domains are dropped.
        if let Some(expected) = kind.single_entity_kind() {
            match entities.as_slice() {
                [only] if only.kind == expected => {}
                [only] => {
                    return Err(CoreError::InvalidCard {
                        card: label,
                        message: format!("{kind} cannot show '{}'", only.entity_id),
                    });
                }
                _ => {
                    return Err(CoreError::InvalidCard {
                        card: label,
                        message: format!(
                            "{kind} needs exactly one {} entity, found {}",
                            expected.as_ref(),
                            entities.len()
                        ),
                    });
                }
            }
        }

        Ok(Self {
            iid,
            kind,
            heading: config.heading.clone().unwrap_or_default(),
            entities,
            navigate_key: config.key.clone(),
            prev: None,
            next: None,
            hidden,
            sleep_timeout: config.sleep_timeout,
            pin: config.pin.clone(),
            destination: config.destination.clone(),
            double_tap_to_unlock: false,
        })
    }

    /// The always-present screensaver card.
    pub fn screensaver(config: &ScreensaverConfig, alloc: &IidAllocator) -> Self {
        let iid = alloc.allocate();
        Self {
            iid,
            kind: CardKind::Screensaver,
            heading: String::new(),
            entities: build_entities("screensaver", &config.entities, alloc),
            navigate_key: None,
            prev: None,
            next: None,
            hidden: true,
            sleep_timeout: config.sleep_timeout,
            pin: None,
            destination: None,
            double_tap_to_unlock: config.double_tap_to_unlock,
        }
    }

    pub fn page_type(&self) -> &'static str {
        self.kind.into()
    }

    /// Resolve an `iid.<n>` token against this card's entities.
    pub fn entity_by_token(&self, token: &str) -> Option<&Entity> {
        let iid = ShortId::from_token(token)?;
        self.entities.iter().find(|e| e.iid == iid)
    }

    pub fn entity_by_id(&self, entity_id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.entity_id == entity_id)
    }

    /// A human label for logs.
    pub fn label(&self) -> &str {
        if !self.heading.is_empty() {
            &self.heading
        } else if let Some(key) = &self.navigate_key {
            key
        } else {
            self.kind.as_ref()
        }
    }
}

fn build_entities(card: &str, configs: &[EntityConfig], alloc: &IidAllocator) -> Vec<Entity> {
    configs
        .iter()
        .filter_map(|cfg| {
            let entity = Entity::from_config(cfg, alloc);
            if entity.is_none() {
                tracing::warn!(card, entity = %cfg.entity, "unsupported entity domain, skipping");
            }
            entity
        })
        .collect()
}
