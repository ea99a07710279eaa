// ── Icons and colours ──
//
// The panel font renders Material Design Icons by code point, so an icon
// on the wire is a single glyph. `IconTable` is built once at startup
// and shared read-only; the selection helpers are pure functions of
// (domain, state, device class, override).

use std::collections::HashMap;

use crate::protocol::convert::{rgb_brightness, rgb_to_565};
use crate::store::EntityState;

pub const ALERT_ICON: &str = "alert-circle-outline";

/// 565 colour of an entity that is on (`rgb(253, 216, 53)`).
pub const COLOR_ON: u16 = 65222;
/// 565 colour of an entity that is off or stateless (`rgb(68, 115, 158)`).
pub const COLOR_OFF: u16 = 17299;
pub const COLOR_WHITE: u16 = 65535;

const ON_RGB: [u8; 3] = [253, 216, 53];

/// Built-in subset of the Material Design Icons font.
const GLYPHS: &[(&str, u32)] = &[
    ("account", 0xF0004),
    ("account-off", 0xF0013),
    ("alert-circle-outline", 0xF05D6),
    ("arrow-right-bold", 0xF0734),
    ("battery", 0xF0079),
    ("brightness-5", 0xF00DF),
    ("calendar-sync", 0xF0E8E),
    ("check-circle-outline", 0xF05E1),
    ("checkbox-marked-circle", 0xF0133),
    ("close-circle-outline", 0xF015A),
    ("door-closed", 0xF081B),
    ("door-open", 0xF081C),
    ("eye", 0xF0208),
    ("fan", 0xF0210),
    ("fan-off", 0xF081D),
    ("fire", 0xF0238),
    ("flash", 0xF0241),
    ("format-list-bulleted", 0xF0279),
    ("gauge", 0xF029A),
    ("gesture-tap-button", 0xF12A8),
    ("home", 0xF02DC),
    ("lightbulb", 0xF0335),
    ("lightbulb-outline", 0xF0336),
    ("lock", 0xF033E),
    ("lock-open", 0xF033F),
    ("map-marker", 0xF034E),
    ("motion-sensor", 0xF0D91),
    ("motion-sensor-off", 0xF1435),
    ("music", 0xF075A),
    ("palette", 0xF03D8),
    ("pause", 0xF03E4),
    ("play", 0xF040A),
    ("power", 0xF0425),
    ("radiobox-blank", 0xF043D),
    ("ray-vertex", 0xF044B),
    ("robot", 0xF06A9),
    ("script-text", 0xF0BC1),
    ("snowflake", 0xF0717),
    ("speaker", 0xF04C3),
    ("speaker-off", 0xF04C4),
    ("thermometer", 0xF050F),
    ("thermostat", 0xF0393),
    ("timer-outline", 0xF051B),
    ("toggle-switch", 0xF0521),
    ("toggle-switch-off", 0xF0522),
    ("water-percent", 0xF058E),
    ("weather-cloudy", 0xF0590),
    ("weather-fog", 0xF0591),
    ("weather-hail", 0xF0592),
    ("weather-lightning", 0xF0593),
    ("weather-lightning-rainy", 0xF067E),
    ("weather-night", 0xF0594),
    ("weather-partly-cloudy", 0xF0595),
    ("weather-pouring", 0xF0596),
    ("weather-rainy", 0xF0597),
    ("weather-snowy", 0xF0598),
    ("weather-snowy-rainy", 0xF067F),
    ("weather-sunny", 0xF0599),
    ("weather-windy", 0xF059D),
    ("weather-windy-variant", 0xF059E),
    ("white-balance-sunny", 0xF05A8),
    ("window-closed", 0xF05AE),
    ("window-open", 0xF05B1),
    ("window-shutter", 0xF111C),
    ("window-shutter-open", 0xF111E),
];

/// Immutable icon name to glyph lookup.
#[derive(Debug, Clone)]
pub struct IconTable {
    glyphs: HashMap<&'static str, char>,
    fallback: char,
}

impl IconTable {
    /// Table with the built-in glyph set.
    pub fn builtin() -> Self {
        let glyphs: HashMap<&'static str, char> = GLYPHS
            .iter()
            .filter_map(|(name, cp)| char::from_u32(*cp).map(|c| (*name, c)))
            .collect();
        let fallback = glyphs
            .get(ALERT_ICON)
            .copied()
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        Self { glyphs, fallback }
    }

    /// Glyph for an icon name. Accepts an optional `mdi:` prefix.
    pub fn glyph(&self, name: &str) -> Option<char> {
        let name = name.strip_prefix("mdi:").unwrap_or(name);
        self.glyphs.get(name).copied()
    }

    /// Glyph for an icon name, or the alert glyph when unknown.
    pub fn get(&self, name: &str) -> char {
        self.glyph(name).unwrap_or(self.fallback)
    }

    pub fn alert(&self) -> char {
        self.fallback
    }

    /// Icon for an entity. A configured override wins when it names a
    /// known glyph; otherwise the domain/state/device-class default.
    pub fn entity_icon(
        &self,
        domain: &str,
        state: Option<&str>,
        device_class: Option<&str>,
        overwrite: Option<&str>,
    ) -> char {
        if let Some(glyph) = overwrite.and_then(|name| self.glyph(name)) {
            return glyph;
        }
        self.get(icon_name(domain, state, device_class))
    }

    /// Icon for a live entity state, honouring an override.
    pub fn for_state(&self, state: &EntityState, overwrite: Option<&str>) -> char {
        self.entity_icon(
            state.domain(),
            Some(state.state.as_str()),
            state.attr_str("device_class"),
            overwrite,
        )
    }
}

impl Default for IconTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Default icon name for a (domain, state, device class) triple.
pub fn icon_name(domain: &str, state: Option<&str>, device_class: Option<&str>) -> &'static str {
    let on = matches!(state, Some("on" | "open" | "opening" | "unlocked" | "playing"));
    match domain {
        "light" => "lightbulb",
        "switch" => {
            if on {
                "toggle-switch"
            } else {
                "toggle-switch-off"
            }
        }
        "input_boolean" => {
            if on {
                "check-circle-outline"
            } else {
                "close-circle-outline"
            }
        }
        "automation" => "robot",
        "cover" => match state {
            Some("closed" | "closing") => "window-shutter",
            _ => "window-shutter-open",
        },
        "sensor" => sensor_icon(device_class),
        "binary_sensor" => binary_sensor_icon(device_class, on),
        "button" | "input_button" => "gesture-tap-button",
        "scene" => "palette",
        "script" => "script-text",
        "lock" => {
            if on {
                "lock-open"
            } else {
                "lock"
            }
        }
        "fan" => {
            if on {
                "fan"
            } else {
                "fan-off"
            }
        }
        "timer" => "timer-outline",
        "input_select" | "select" => "format-list-bulleted",
        "number" | "input_number" => "ray-vertex",
        "media_player" => {
            if on {
                "speaker"
            } else {
                "speaker-off"
            }
        }
        "climate" => "thermostat",
        "weather" => weather_icon(state.unwrap_or_default()),
        "person" | "device_tracker" => match state {
            Some("home") => "account",
            Some("not_home") => "account-off",
            _ => "map-marker",
        },
        "sun" => "white-balance-sunny",
        "zone" => "home",
        "navigate" => "arrow-right-bold",
        _ => ALERT_ICON,
    }
}

fn sensor_icon(device_class: Option<&str>) -> &'static str {
    match device_class {
        Some("temperature") => "thermometer",
        Some("humidity" | "moisture") => "water-percent",
        Some("battery") => "battery",
        Some("power" | "energy" | "current" | "voltage") => "flash",
        Some("illuminance") => "brightness-5",
        Some("pressure") => "gauge",
        _ => "eye",
    }
}

fn binary_sensor_icon(device_class: Option<&str>, on: bool) -> &'static str {
    match (device_class, on) {
        (Some("door" | "garage_door"), true) => "door-open",
        (Some("door" | "garage_door"), false) => "door-closed",
        (Some("window"), true) => "window-open",
        (Some("window"), false) => "window-closed",
        (Some("motion" | "occupancy" | "presence"), true) => "motion-sensor",
        (Some("motion" | "occupancy" | "presence"), false) => "motion-sensor-off",
        (_, true) => "checkbox-marked-circle",
        (_, false) => "radiobox-blank",
    }
}

/// Icon name for a Home Assistant weather condition.
pub fn weather_icon(condition: &str) -> &'static str {
    match condition {
        "sunny" => "weather-sunny",
        "clear-night" => "weather-night",
        "cloudy" => "weather-cloudy",
        "partlycloudy" => "weather-partly-cloudy",
        "fog" => "weather-fog",
        "hail" => "weather-hail",
        "lightning" => "weather-lightning",
        "lightning-rainy" => "weather-lightning-rainy",
        "pouring" => "weather-pouring",
        "rainy" => "weather-rainy",
        "snowy" => "weather-snowy",
        "snowy-rainy" => "weather-snowy-rainy",
        "windy" => "weather-windy",
        "windy-variant" => "weather-windy-variant",
        _ => ALERT_ICON,
    }
}

/// Icon name and "active" colour of an HVAC mode button.
pub fn hvac_mode_style(mode: &str) -> (&'static str, u16) {
    match mode {
        "auto" | "heat_cool" => ("calendar-sync", 1024),
        "heat" => ("fire", 64512),
        "off" => ("power", 35921),
        "cool" => ("snowflake", 11487),
        "dry" => ("water-percent", 60897),
        "fan_only" => ("fan", 35921),
        _ => (ALERT_ICON, 64512),
    }
}

/// Icon colour of an entity, tinted by `rgb_color` and `brightness`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
pub fn entity_color(state: &EntityState) -> u16 {
    let brightness = state.attr_f64("brightness");
    let rgb = state.attr("rgb_color").and_then(|v| {
        let parts = v.as_array()?;
        let mut out = [0u8; 3];
        for (slot, part) in out.iter_mut().zip(parts) {
            *slot = part.as_f64()?.clamp(0.0, 255.0) as u8;
        }
        (parts.len() == 3).then_some(out)
    });

    match (rgb, brightness) {
        (Some(rgb), Some(b)) => rgb_to_565(rgb_brightness(rgb, b)),
        (Some(rgb), None) => rgb_to_565(rgb),
        (None, Some(b)) => rgb_to_565(rgb_brightness(ON_RGB, b)),
        (None, None) if state.is_on() => COLOR_ON,
        (None, None) => COLOR_OFF,
    }
}
