// ── Dim engine ──
//
// Display brightness from occupancy tracking. The panel takes two values
// (dimmed and normal); both are computed by the same rule and always
// equal, but the pair is kept so the wire command stays complete.

use crate::config::{Brightness, PanelConfig, SleepOverride};
use crate::protocol::DimMode;
use crate::store::EntityStore;

/// Background colour code of the `ha-dark` theme.
const HA_DARK_BACKGROUND: &str = "6371";

/// Inputs of the brightness decision, borrowed from a panel's config.
#[derive(Debug, Clone, Copy)]
pub struct DimRules<'a> {
    pub tracking: &'a [String],
    pub away_states: &'a [String],
    pub sleep: &'a Brightness,
    pub screen: &'a Brightness,
    pub sleep_override: Option<&'a SleepOverride>,
}

impl<'a> DimRules<'a> {
    pub fn from_panel(config: &'a PanelConfig) -> Self {
        Self {
            tracking: &config.sleep_tracking,
            away_states: &config.sleep_tracking_zones,
            sleep: &config.sleep_brightness,
            screen: &config.screen_brightness,
            sleep_override: config.sleep_override.as_ref(),
        }
    }

    /// `(dim, normal)` brightness in percent.
    ///
    /// An active override wins. Otherwise any tracked entity in an away
    /// state selects the sleep brightness, else the screen brightness.
    pub fn calculate(&self, store: &dyn EntityStore) -> (u8, u8) {
        if let Some(level) = self.active_override(store) {
            return (level, level);
        }

        let away = self.tracking.iter().any(|entity_id| {
            store
                .state(entity_id)
                .is_some_and(|s| self.away_states.iter().any(|a| *a == s.state))
        });
        let level = if away {
            resolve(self.sleep, store, crate::config::DEFAULT_SLEEP_BRIGHTNESS)
        } else {
            resolve(self.screen, store, crate::config::DEFAULT_SCREEN_BRIGHTNESS)
        };
        (level, level)
    }

    fn active_override(&self, store: &dyn EntityStore) -> Option<u8> {
        let ov = self.sleep_override?;
        match &ov.entity {
            None => Some(ov.brightness),
            Some(entity_id) => store
                .state(entity_id)
                .filter(|s| s.is_on())
                .map(|_| ov.brightness),
        }
    }

    /// Every entity whose state can change the result.
    pub fn involved_entities(&self) -> Vec<String> {
        let mut out: Vec<String> = self.tracking.to_vec();
        for brightness in [self.sleep, self.screen] {
            if let Brightness::Entity(id) = brightness {
                out.push(id.clone());
            }
        }
        if let Some(entity) = self.sleep_override.and_then(|o| o.entity.as_ref()) {
            out.push(entity.clone());
        }
        out.sort();
        out.dedup();
        out
    }
}

/// Numeric brightness from a fixed value or an entity state, clamped to 0..=100.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
fn resolve(brightness: &Brightness, store: &dyn EntityStore, fallback: u8) -> u8 {
    match brightness {
        Brightness::Fixed(level) => (*level).min(100),
        Brightness::Entity(entity_id) => {
            let Some(value) = store
                .state(entity_id)
                .and_then(|s| s.state.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
            else {
                tracing::debug!(entity = %entity_id, "brightness entity unavailable, using default");
                return fallback;
            };
            value.clamp(0.0, 100.0).round() as u8
        }
    }
}

/// Background colour field of `dimmode`: theme names map to colour codes.
pub fn background_code(name: &str) -> &str {
    match name {
        "ha-dark" => HA_DARK_BACKGROUND,
        "black" => "0",
        other => other,
    }
}

/// The complete `dimmode` command for a panel.
pub fn dim_mode(config: &PanelConfig, store: &dyn EntityStore) -> DimMode {
    let (dim, dim_normal) = DimRules::from_panel(config).calculate(store);
    DimMode {
        dim,
        dim_normal,
        background: background_code(&config.default_background_color).to_owned(),
        font_color: String::new(),
        feature_flags: config.feat_experimental_sliders,
    }
}
