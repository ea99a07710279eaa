// Screensaver card: one `weatherUpdate` built from the configured
// entities, each field prefixed with `?`. A weather entity contributes
// its current condition, temperature and humidity followed by one
// (weekday, icon, temperature) triple per forecast day.

use chrono::DateTime;
use serde_json::Value;

use super::{NOT_FOUND, Renderer};
use crate::icons::weather_icon;
use crate::model::{Card, Entity};
use crate::protocol::PanelCommand;
use crate::store::EntityState;

/// Forecast days shown on the screensaver.
const FORECAST_DAYS: usize = 4;
const DEFAULT_TEMP_UNIT: &str = "°C";

pub(super) fn render(r: &Renderer<'_>, card: &Card) -> Option<PanelCommand> {
    if card.entities.is_empty() {
        return None;
    }
    let mut body = String::new();
    for entity in &card.entities {
        match r.state(entity) {
            Some(state) if state.domain() == "weather" => weather(r, entity, &state, &mut body),
            Some(state) => {
                let value = super::list::value_with_unit(&state);
                push(&mut body, [r.icon(entity, &state).to_string(), value]);
            }
            None => {
                tracing::debug!(entity = %entity.entity_id, "screensaver entity not found");
                push(&mut body, [r.icons.alert().to_string(), NOT_FOUND.to_owned()]);
            }
        }
    }
    Some(PanelCommand::WeatherUpdate(body))
}

fn weather(r: &Renderer<'_>, entity: &Entity, state: &EntityState, body: &mut String) {
    let unit = state
        .attr_str("temperature_unit")
        .unwrap_or(DEFAULT_TEMP_UNIT);
    let temperature = state.attr("temperature").map(display).unwrap_or_default();
    let humidity = state.attr("humidity").map(display).unwrap_or_default();

    push(
        body,
        [
            r.icon(entity, state).to_string(),
            format!("{temperature}{unit}"),
            r.icons.get("water-percent").to_string(),
            format!("{humidity} %"),
        ],
    );

    let forecast = state
        .attr("forecast")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for day in forecast.iter().take(FORECAST_DAYS) {
        let weekday = day
            .get("datetime")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.format("%a").to_string())
            .unwrap_or_default();
        let condition = day.get("condition").and_then(Value::as_str).unwrap_or_default();
        let temp = day.get("temperature").map(display).unwrap_or_default();
        push(
            body,
            [weekday, r.icons.get(weather_icon(condition)).to_string(), temp],
        );
    }
}

/// Numbers and strings without JSON quoting.
fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn push<const N: usize>(body: &mut String, fields: [String; N]) {
    for field in fields {
        body.push('?');
        body.push_str(&field);
    }
}
