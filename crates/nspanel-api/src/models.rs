// Home Assistant wire types.
//
// Only the fields the panel controller reads are typed. Entity-specific
// data stays as raw JSON in `attributes`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entity state as returned by `GET /api/states` and carried in
/// `state_changed` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HassState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub last_changed: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

/// Payload of a `state_changed` event.
#[derive(Debug, Clone, Deserialize)]
pub struct StateChangedData {
    pub entity_id: String,
    #[serde(default)]
    pub new_state: Option<HassState>,
    #[serde(default)]
    pub old_state: Option<HassState>,
}

/// An MQTT message delivered through the `mqtt/subscribe` WebSocket command.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: String,
    #[serde(default)]
    pub qos: u8,
    #[serde(default)]
    pub retain: bool,
}

/// Events surfaced by the WebSocket stream.
#[derive(Debug, Clone)]
pub enum HassEvent {
    /// An entity changed state. `new_state` is `None` when it was removed.
    StateChanged {
        entity_id: String,
        new_state: Option<HassState>,
    },
    /// A message arrived on a subscribed MQTT topic.
    Mqtt(MqttMessage),
    /// The socket (re)authenticated. Consumers should resync state.
    Connected,
}
