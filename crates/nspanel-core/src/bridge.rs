// ── Home Assistant bridge ──
//
// Wires panels to one Home Assistant instance. The state cache is seeded
// from `GET /api/states` and kept current from the WebSocket stream; the
// same stream delivers panel messages from the subscribed MQTT topics.
// Outbound panel commands are published through the `mqtt.publish`
// service and service calls are executed in queue order.

use std::sync::Arc;

use secrecy::SecretString;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use nspanel_api::websocket::{ReconnectConfig, WebSocketHandle};
use nspanel_api::{HassClient, HassEvent};

use crate::bus::{ChannelBus, MessageBus, OutboundMessage};
use crate::config::PanelConfig;
use crate::error::CoreError;
use crate::icons::IconTable;
use crate::model::IidAllocator;
use crate::panel::Panel;
use crate::session::PanelSession;
use crate::store::{ChannelStore, EntityState, EntityStore, ServiceCall, StateCache};

// ── HassBridge ───────────────────────────────────────────────────

pub struct HassBridge {
    cache: Arc<StateCache>,
    panels: Vec<Panel>,
    websocket: WebSocketHandle,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl HassBridge {
    /// Build every panel session, load the initial state snapshot, then
    /// start the panels and the background tasks.
    ///
    /// Configuration errors surface before any network traffic.
    pub async fn start(
        client: HassClient,
        token: &SecretString,
        panels: Vec<PanelConfig>,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Result<Self, CoreError> {
        let client = Arc::new(client);
        let cache = Arc::new(StateCache::new());
        let (store, calls_rx) = ChannelStore::new(Arc::clone(&cache));
        let (bus, outbound_rx) = ChannelBus::new();
        let sessions = build_sessions(panels, Arc::new(store), Arc::new(bus))?;

        resync(&client, &cache).await?;

        let mut topics: Vec<String> = sessions
            .iter()
            .map(|s| s.config().panel_recv_topic.clone())
            .collect();
        topics.sort();
        topics.dedup();
        let websocket = WebSocketHandle::connect(
            client.websocket_url()?,
            token,
            topics,
            reconnect,
            cancel.child_token(),
        );
        let events = websocket.subscribe();

        let panels: Vec<Panel> = sessions
            .into_iter()
            .map(|s| Panel::spawn(s, cancel.child_token()))
            .collect();

        let handles = vec![
            tokio::spawn(event_task(
                events,
                Arc::clone(&client),
                Arc::clone(&cache),
                panels.clone(),
                cancel.clone(),
            )),
            tokio::spawn(service_call_task(Arc::clone(&client), calls_rx, cancel.clone())),
            tokio::spawn(publish_task(Arc::clone(&client), outbound_rx, cancel.clone())),
        ];
        info!(panels = panels.len(), "bridge running");

        Ok(Self {
            cache,
            panels,
            websocket,
            cancel,
            task_handles: Mutex::new(handles),
        })
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    pub fn cache(&self) -> &Arc<StateCache> {
        &self.cache
    }

    /// Stop panels, the WebSocket and every background task.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.websocket.shutdown();
        for panel in &self.panels {
            panel.shutdown().await;
        }
        let handles: Vec<_> = self.task_handles.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "bridge task ended abnormally");
            }
        }
        info!("bridge stopped");
    }
}

/// One session per panel config, sharing the store, bus, icons and the
/// short-id allocator.
pub fn build_sessions(
    panels: Vec<PanelConfig>,
    store: Arc<dyn EntityStore>,
    bus: Arc<dyn MessageBus>,
) -> Result<Vec<PanelSession>, CoreError> {
    if panels.is_empty() {
        return Err(CoreError::Config {
            message: "no panels configured".into(),
        });
    }
    let icons = Arc::new(IconTable::builtin());
    let alloc = IidAllocator::new();
    panels
        .into_iter()
        .map(|cfg| {
            PanelSession::new(
                cfg,
                &alloc,
                Arc::clone(&icons),
                Arc::clone(&store),
                Arc::clone(&bus),
            )
        })
        .collect()
}

// ── Event routing ────────────────────────────────────────────────

/// Apply one Home Assistant event to the cache and the panels.
/// `Connected` is handled by the caller since it needs the REST client.
pub async fn route_event(event: &HassEvent, cache: &StateCache, panels: &[Panel]) {
    match event {
        HassEvent::StateChanged {
            entity_id,
            new_state,
        } => {
            match new_state {
                Some(state) => {
                    cache.upsert(EntityState::from(state.clone()));
                }
                None => {
                    cache.remove(entity_id);
                }
            }
            for panel in panels {
                if let Err(e) = panel.state_changed(entity_id).await {
                    warn!(panel = panel.name(), error = %e, "state change not delivered");
                }
            }
        }
        HassEvent::Mqtt(message) => {
            let mut delivered = false;
            for panel in panels.iter().filter(|p| p.recv_topic() == message.topic) {
                delivered = true;
                if let Err(e) = panel.message(message.payload.clone()).await {
                    warn!(panel = panel.name(), error = %e, "panel message not delivered");
                }
            }
            if !delivered {
                debug!(topic = %message.topic, "MQTT message for no panel");
            }
        }
        HassEvent::Connected => {}
    }
}

async fn resync(client: &HassClient, cache: &StateCache) -> Result<(), CoreError> {
    let states = client.states().await?;
    cache.replace_all(states.into_iter().map(EntityState::from));
    info!(entities = cache.len(), "state cache loaded");
    Ok(())
}

/// Reload the cache, then make every panel redraw from it. Changes missed
/// while the stream was down would otherwise stay on screen.
async fn resync_panels(client: &HassClient, cache: &StateCache, panels: &[Panel]) {
    if let Err(e) = resync(client, cache).await {
        warn!(error = %e, "state resync failed");
        return;
    }
    refresh_panels(panels).await;
}

async fn refresh_panels(panels: &[Panel]) {
    for panel in panels {
        if let Err(e) = panel.refresh().await {
            warn!(panel = panel.name(), error = %e, "refresh not delivered");
        }
    }
}

// ── Background tasks ─────────────────────────────────────────────

async fn event_task(
    mut events: broadcast::Receiver<Arc<HassEvent>>,
    client: Arc<HassClient>,
    cache: Arc<StateCache>,
    panels: Vec<Panel>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => match event {
                Ok(event) if matches!(*event, HassEvent::Connected) => {
                    info!("event stream connected, reloading states");
                    resync_panels(&client, &cache, &panels).await;
                }
                Ok(event) => route_event(&event, &cache, &panels).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event stream lagged, reloading states");
                    resync_panels(&client, &cache, &panels).await;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
    debug!("event task stopped");
}

async fn service_call_task(
    client: Arc<HassClient>,
    mut rx: mpsc::UnboundedReceiver<ServiceCall>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            call = rx.recv() => {
                let Some(call) = call else { break };
                let service = call.qualified_name();
                match client.call_service(&call.domain, &call.service, &call.body()).await {
                    Ok(_) => debug!(%service, entity = %call.entity_id, "service call done"),
                    Err(e) => warn!(%service, entity = %call.entity_id, error = %e, "service call failed"),
                }
            }
        }
    }
}

async fn publish_task(
    client: Arc<HassClient>,
    mut rx: mpsc::UnboundedReceiver<OutboundMessage>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            message = rx.recv() => {
                let Some(message) = message else { break };
                if let Err(e) = client.publish_mqtt(&message.topic, &message.payload).await {
                    warn!(topic = %message.topic, error = %e, "publish failed");
                }
            }
        }
    }
}
