// ── Panel configuration ──
//
// Serde types for one panel's settings. Keys keep the camelCase names
// panel owners already use in their YAML files. Loading and layering
// (files, environment) lives in `nspanel-config`; this module only
// describes the shape and its defaults.

use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_SLEEP_TIMEOUT: u32 = 20;
pub const DEFAULT_SLEEP_BRIGHTNESS: u8 = 20;
pub const DEFAULT_SCREEN_BRIGHTNESS: u8 = 100;

/// Settings for one physical panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelConfig {
    pub name: String,
    /// Topic the panel publishes its events on.
    pub panel_recv_topic: String,
    /// Topic the panel listens on for display commands.
    pub panel_send_topic: String,
    #[serde(default = "default_locale")]
    pub locale: String,
    /// strftime pattern for the clock.
    #[serde(default = "default_time_format")]
    pub time_format: String,
    /// strftime pattern for the date line.
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default = "default_sleep_timeout")]
    pub sleep_timeout: u32,
    /// Entities whose state decides whether the panel dims to sleep brightness.
    #[serde(default, deserialize_with = "one_or_many")]
    pub sleep_tracking: Vec<String>,
    #[serde(default = "default_tracking_zones")]
    pub sleep_tracking_zones: Vec<String>,
    #[serde(default = "default_sleep_brightness")]
    pub sleep_brightness: Brightness,
    #[serde(default = "default_screen_brightness")]
    pub screen_brightness: Brightness,
    #[serde(default)]
    pub sleep_override: Option<SleepOverride>,
    /// `navigate.<key>` of the card shown when leaving the screensaver.
    #[serde(default)]
    pub default_card: Option<String>,
    #[serde(default = "default_background")]
    pub default_background_color: String,
    #[serde(default)]
    pub feat_experimental_sliders: u8,
    #[serde(default)]
    pub cards: Vec<CardConfig>,
    #[serde(default)]
    pub hidden_cards: Vec<CardConfig>,
    #[serde(default)]
    pub screensaver: ScreensaverConfig,
}

/// A brightness level, either fixed or read from a numeric entity state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Brightness {
    Fixed(u8),
    Entity(String),
}

/// Forces a brightness regardless of sleep tracking.
///
/// Active when `entity` is unset, or when that entity's state is `on`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepOverride {
    #[serde(default)]
    pub entity: Option<String>,
    pub brightness: u8,
}

/// One card definition. `type` is validated when the card is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardConfig {
    #[serde(rename = "type")]
    pub card_type: String,
    #[serde(default, alias = "title")]
    pub heading: Option<String>,
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
    /// Navigation key, addressed as `navigate.<key>`.
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub sleep_timeout: Option<u32>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub pin: Option<String>,
    /// Unlock cards: key of the card opened after a correct PIN.
    #[serde(default)]
    pub destination: Option<String>,
}

impl CardConfig {
    /// Human-readable label for diagnostics.
    pub fn label(&self) -> &str {
        self.heading
            .as_deref()
            .or(self.key.as_deref())
            .unwrap_or(&self.card_type)
    }
}

/// An entity slot. Accepts either a bare entity id or a mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawEntityConfig")]
#[serde(rename_all = "camelCase")]
pub struct EntityConfig {
    pub entity: String,
    pub name: Option<String>,
    pub icon: Option<String>,
    pub effect_list: Option<Vec<String>>,
}

impl EntityConfig {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            name: None,
            icon: None,
            effect_list: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntityConfig {
    Id(String),
    #[serde(rename_all = "camelCase")]
    Full {
        entity: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        icon: Option<String>,
        #[serde(default)]
        effect_list: Option<Vec<String>>,
    },
}

impl From<RawEntityConfig> for EntityConfig {
    fn from(raw: RawEntityConfig) -> Self {
        match raw {
            RawEntityConfig::Id(entity) => Self::new(entity),
            RawEntityConfig::Full {
                entity,
                name,
                icon,
                effect_list,
            } => Self {
                entity,
                name,
                icon,
                effect_list,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreensaverConfig {
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
    /// Ignore the first `bExit` tap so a double tap is needed to wake.
    #[serde(default)]
    pub double_tap_to_unlock: bool,
    #[serde(default)]
    pub sleep_timeout: Option<u32>,
}

// ── Defaults ─────────────────────────────────────────────────────────

fn default_locale() -> String {
    "en_US".into()
}

fn default_time_format() -> String {
    "%H:%M".into()
}

fn default_date_format() -> String {
    "%A, %d. %B %Y".into()
}

fn default_sleep_timeout() -> u32 {
    DEFAULT_SLEEP_TIMEOUT
}

fn default_tracking_zones() -> Vec<String> {
    vec!["not_home".into(), "off".into()]
}

fn default_sleep_brightness() -> Brightness {
    Brightness::Fixed(DEFAULT_SLEEP_BRIGHTNESS)
}

fn default_screen_brightness() -> Brightness {
    Brightness::Fixed(DEFAULT_SCREEN_BRIGHTNESS)
}

fn default_background() -> String {
    "ha-dark".into()
}

// ── Lenient field parsers ────────────────────────────────────────────

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    })
}

/// PINs are often written unquoted in YAML.
fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        S(String),
        N(u64),
    }

    Ok(
        Option::<StringOrNumber>::deserialize(deserializer)?.map(|v| match v {
            StringOrNumber::S(s) => s,
            StringOrNumber::N(n) => n.to_string(),
        }),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PANEL: &str = r"
name: hallway
panelRecvTopic: tele/hallway/RESULT
panelSendTopic: cmnd/hallway/CustomSend
sleepTracking: person.alice
sleepBrightness: input_number.panel_sleep
defaultCard: navigate.home
cards:
  - type: cardEntities
    heading: Home
    key: home
    entities:
      - light.kitchen
      - entity: switch.fan
        name: Ceiling fan
        icon: mdi:fan
  - type: cardUnlock
    title: Alarm
    pin: 1234
    destination: alarm
";

    #[test]
    fn parses_panel_with_defaults() {
        let cfg: PanelConfig = serde_yaml::from_str(PANEL).unwrap();
        assert_eq!(cfg.time_format, "%H:%M");
        assert_eq!(cfg.sleep_timeout, 20);
        assert_eq!(cfg.sleep_tracking, vec!["person.alice".to_string()]);
        assert_eq!(cfg.sleep_tracking_zones, vec!["not_home", "off"]);
        assert_eq!(
            cfg.sleep_brightness,
            Brightness::Entity("input_number.panel_sleep".into())
        );
        assert_eq!(cfg.screen_brightness, Brightness::Fixed(100));
        assert_eq!(cfg.default_background_color, "ha-dark");
        assert!(cfg.hidden_cards.is_empty());
        assert!(!cfg.screensaver.double_tap_to_unlock);
    }

    #[test]
    fn entity_slots_accept_both_forms() {
        let cfg: PanelConfig = serde_yaml::from_str(PANEL).unwrap();
        let entities = &cfg.cards[0].entities;
        assert_eq!(entities[0], EntityConfig::new("light.kitchen"));
        assert_eq!(entities[1].name.as_deref(), Some("Ceiling fan"));
        assert_eq!(entities[1].icon.as_deref(), Some("mdi:fan"));
    }

    #[test]
    fn numeric_pin_and_title_alias() {
        let cfg: PanelConfig = serde_yaml::from_str(PANEL).unwrap();
        let unlock = &cfg.cards[1];
        assert_eq!(unlock.pin.as_deref(), Some("1234"));
        assert_eq!(unlock.label(), "Alarm");
    }
}
