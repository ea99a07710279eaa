// Shared fixtures for the session and actor tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use nspanel_core::{
    EntityState, EntityStore, IconTable, IidAllocator, MessageBus, PanelConfig, PanelSession,
    ServiceCall,
};

pub const SEND_TOPIC: &str = "cmnd/hall/CustomSend";

pub const PANEL: &str = r"
name: hall
panelRecvTopic: tele/hall/RESULT
panelSendTopic: cmnd/hall/CustomSend
cards:
  - type: cardEntities
    heading: Home
    key: home
    entities:
      - light.kitchen
      - sensor.temp
      - navigate.rooms
  - type: cardGrid
    heading: Rooms
    key: rooms
    entities:
      - switch.fan
      - navigate.secret
hiddenCards:
  - type: cardEntities
    heading: Secret
    key: secret
    entities:
      - light.vault
  - type: cardUnlock
    heading: Vault
    key: vault
    pin: 1234
    destination: secret
";

// ── In-memory collaborators ─────────────────────────────────────────

#[derive(Default)]
pub struct MemoryStore {
    states: Mutex<HashMap<String, EntityState>>,
    calls: Mutex<Vec<ServiceCall>>,
}

impl MemoryStore {
    pub fn set(&self, state: EntityState) {
        self.states
            .lock()
            .unwrap()
            .insert(state.entity_id.clone(), state);
    }

    pub fn take_calls(&self) -> Vec<ServiceCall> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }
}

impl EntityStore for MemoryStore {
    fn state(&self, entity_id: &str) -> Option<EntityState> {
        self.states.lock().unwrap().get(entity_id).cloned()
    }

    fn call_service(&self, call: ServiceCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[derive(Default)]
pub struct RecordingBus {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingBus {
    /// Payloads published since the last call.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.sent.lock().unwrap())
            .into_iter()
            .map(|(topic, payload)| {
                assert_eq!(topic, SEND_TOPIC);
                payload
            })
            .collect()
    }
}

impl MessageBus for RecordingBus {
    fn publish(&self, topic: &str, payload: String) {
        self.sent.lock().unwrap().push((topic.to_owned(), payload));
    }
}

// ── Builders ────────────────────────────────────────────────────────

pub fn panel_config() -> PanelConfig {
    serde_yaml::from_str(PANEL).unwrap()
}

pub fn populated_store() -> Arc<MemoryStore> {
    let store = MemoryStore::default();
    store.set(
        EntityState::new("light.kitchen", "off")
            .with_attr("friendly_name", "Kitchen")
            .with_attr("supported_color_modes", serde_json::json!(["brightness"])),
    );
    store.set(
        EntityState::new("sensor.temp", "21.5")
            .with_attr("friendly_name", "Temperature")
            .with_attr("unit_of_measurement", "°C"),
    );
    store.set(EntityState::new("switch.fan", "off").with_attr("friendly_name", "Fan"));
    store.set(EntityState::new("light.vault", "off"));
    Arc::new(store)
}

pub struct Harness {
    pub session: PanelSession,
    pub store: Arc<MemoryStore>,
    pub bus: Arc<RecordingBus>,
}

impl Harness {
    pub fn with_config(config: PanelConfig, first_iid: u32) -> Self {
        let store = populated_store();
        let bus = Arc::new(RecordingBus::default());
        let session = PanelSession::new(
            config,
            &IidAllocator::starting_at(first_iid),
            Arc::new(IconTable::builtin()),
            store.clone(),
            bus.clone(),
        )
        .unwrap();
        Self {
            session,
            store,
            bus,
        }
    }

    pub fn new() -> Self {
        Self::with_config(panel_config(), 40)
    }

    pub fn send(&mut self, payload: &str) {
        self.session.handle_payload(payload);
    }

    /// Boot the panel and leave the screensaver for the home card.
    pub fn on_home(mut self) -> Self {
        self.send("event,startup,53,eu");
        self.send("event,buttonPress2,screensaver,bExit");
        self.bus.take();
        self
    }

    pub fn card(&self, key: &str) -> nspanel_core::ShortId {
        self.session.registry().search(key).unwrap().iid
    }

    pub fn current(&self) -> nspanel_core::ShortId {
        self.session.snapshot().current.unwrap()
    }

    pub fn history(&self) -> Vec<nspanel_core::ShortId> {
        self.session.snapshot().history
    }
}
