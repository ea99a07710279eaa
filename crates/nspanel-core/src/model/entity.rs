use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::EntityConfig;
use crate::store::domain_of;

// ── ShortId ──────────────────────────────────────────────────────────

/// Compact identifier used on the wire (`iid.<n>`) instead of full
/// entity ids. Cards draw from the same sequence as entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShortId(u32);

impl ShortId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    /// Wire token, `iid.<n>`.
    pub fn token(self) -> String {
        format!("iid.{}", self.0)
    }

    /// Parse the numeric part of an `iid.<n>` token.
    pub fn from_token(token: &str) -> Option<Self> {
        token.strip_prefix("iid.")?.parse().ok().map(Self)
    }
}

impl fmt::Display for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out process-unique short ids. Clones share the same counter.
#[derive(Debug, Clone)]
pub struct IidAllocator {
    next: Arc<AtomicU32>,
}

impl IidAllocator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u32) -> Self {
        Self {
            next: Arc::new(AtomicU32::new(first)),
        }
    }

    pub fn allocate(&self) -> ShortId {
        ShortId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IidAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ── EntityKind ───────────────────────────────────────────────────────

/// How an entity is drawn and which controls it exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
    Toggle,
    Light,
    Slider,
    Sensor,
    Button,
    Cover,
    Climate,
    Media,
    Fan,
    Timer,
    Select,
    Navigate,
    Delete,
}

impl EntityKind {
    /// Capability for an entity id, by domain. `None` for unsupported domains.
    pub fn for_entity_id(entity_id: &str) -> Option<Self> {
        Some(match domain_of(entity_id) {
            "switch" | "input_boolean" | "automation" => Self::Toggle,
            "light" => Self::Light,
            "number" | "input_number" => Self::Slider,
            "sensor" | "binary_sensor" | "weather" | "person" | "device_tracker" | "sun"
            | "zone" => Self::Sensor,
            "button" | "input_button" | "scene" | "script" | "lock" => Self::Button,
            "cover" => Self::Cover,
            "climate" => Self::Climate,
            "media_player" => Self::Media,
            "fan" => Self::Fan,
            "timer" => Self::Timer,
            "input_select" | "select" => Self::Select,
            "navigate" => Self::Navigate,
            "delete" => Self::Delete,
            _ => return None,
        })
    }

    /// Pseudo entities never exist in the entity store.
    pub fn is_internal(self) -> bool {
        matches!(self, Self::Navigate | Self::Delete)
    }
}

// ── Entity ───────────────────────────────────────────────────────────

/// One slot on a card.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub iid: ShortId,
    pub entity_id: String,
    pub kind: EntityKind,
    pub name: Option<String>,
    pub icon: Option<String>,
    pub effect_list: Option<Vec<String>>,
}

impl Entity {
    /// Build from config. `None` when the domain has no capability.
    pub fn from_config(config: &EntityConfig, alloc: &IidAllocator) -> Option<Self> {
        let kind = EntityKind::for_entity_id(&config.entity)?;
        Some(Self {
            iid: alloc.allocate(),
            entity_id: config.entity.clone(),
            kind,
            name: config.name.clone(),
            icon: config.icon.clone(),
            effect_list: config.effect_list.clone(),
        })
    }

    pub fn domain(&self) -> &str {
        domain_of(&self.entity_id)
    }

    pub fn token(&self) -> String {
        self.iid.token()
    }

    /// Target key of a `navigate.<key>` pseudo entity.
    pub fn navigate_target(&self) -> Option<&str> {
        self.entity_id.strip_prefix("navigate.")
    }
}
