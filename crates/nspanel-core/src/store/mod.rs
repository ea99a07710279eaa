// ── Entity store ──
//
// The controller reads entity state and issues service calls through the
// `EntityStore` trait. The concrete store is a lock-free `StateCache`
// kept current by the Home Assistant bridge, with service calls queued
// to the bridge's processor task so the panel actor never awaits I/O.

mod cache;

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::mpsc;

pub use cache::StateCache;

/// Snapshot of one external entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityState {
    pub entity_id: String,
    pub state: String,
    pub attributes: Map<String, Value>,
}

impl EntityState {
    pub fn new(entity_id: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            state: state.into(),
            attributes: Map::new(),
        }
    }

    /// Builder-style attribute setter, mostly for tests and fixtures.
    pub fn with_attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_owned(), value.into());
        self
    }

    pub fn domain(&self) -> &str {
        domain_of(&self.entity_id)
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    pub fn attr_f64(&self, key: &str) -> Option<f64> {
        self.attributes.get(key).and_then(Value::as_f64)
    }

    /// String-valued list attribute (`hvac_modes`, `options`, `effect_list`).
    pub fn attr_list(&self, key: &str) -> Vec<String> {
        self.attributes
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// `friendly_name`, falling back to the entity id.
    pub fn friendly_name(&self) -> &str {
        self.attr_str("friendly_name").unwrap_or(&self.entity_id)
    }

    pub fn is_on(&self) -> bool {
        self.state == "on"
    }
}

impl From<nspanel_api::HassState> for EntityState {
    fn from(s: nspanel_api::HassState) -> Self {
        Self {
            entity_id: s.entity_id,
            state: s.state,
            attributes: s.attributes,
        }
    }
}

/// Domain part of an entity id (`light` for `light.kitchen`).
pub fn domain_of(entity_id: &str) -> &str {
    entity_id.split_once('.').map_or(entity_id, |(d, _)| d)
}

/// A service invocation against one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceCall {
    pub entity_id: String,
    pub domain: String,
    pub service: String,
    pub data: Map<String, Value>,
}

impl ServiceCall {
    pub fn new(entity_id: &str, domain: &str, service: &str) -> Self {
        Self {
            entity_id: entity_id.to_owned(),
            domain: domain.to_owned(),
            service: service.to_owned(),
            data: Map::new(),
        }
    }

    /// Call a service in the entity's own domain.
    pub fn on_entity(entity_id: &str, service: &str) -> Self {
        Self::new(entity_id, domain_of(entity_id), service)
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_owned(), value.into());
        self
    }

    /// Request body: `entity_id` plus the call data.
    pub fn body(&self) -> Map<String, Value> {
        let mut body = self.data.clone();
        body.insert("entity_id".into(), Value::String(self.entity_id.clone()));
        body
    }

    /// `domain.service`, for logs.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.domain, self.service)
    }
}

/// Read access to entity state plus fire-and-forget service calls.
pub trait EntityStore: Send + Sync {
    fn state(&self, entity_id: &str) -> Option<EntityState>;

    fn exists(&self, entity_id: &str) -> bool {
        self.state(entity_id).is_some()
    }

    /// Queue a service call. Never blocks; delivery failures are logged.
    fn call_service(&self, call: ServiceCall);
}

/// `EntityStore` over a shared [`StateCache`] with service calls sent
/// down an unbounded channel.
#[derive(Clone)]
pub struct ChannelStore {
    cache: Arc<StateCache>,
    calls: mpsc::UnboundedSender<ServiceCall>,
}

impl ChannelStore {
    pub fn new(cache: Arc<StateCache>) -> (Self, mpsc::UnboundedReceiver<ServiceCall>) {
        let (calls, rx) = mpsc::unbounded_channel();
        (Self { cache, calls }, rx)
    }

    pub fn cache(&self) -> &Arc<StateCache> {
        &self.cache
    }
}

impl EntityStore for ChannelStore {
    fn state(&self, entity_id: &str) -> Option<EntityState> {
        self.cache.get(entity_id)
    }

    fn exists(&self, entity_id: &str) -> bool {
        self.cache.contains(entity_id)
    }

    fn call_service(&self, call: ServiceCall) {
        tracing::debug!(service = %call.qualified_name(), entity = %call.entity_id, "queueing service call");
        if self.calls.send(call).is_err() {
            tracing::warn!("service call processor has stopped, dropping call");
        }
    }
}
