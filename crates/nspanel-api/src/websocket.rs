//! Home Assistant WebSocket event stream with auto-reconnect.
//!
//! Connects to `/api/websocket`, authenticates with the access token,
//! subscribes to `state_changed` events and to every requested MQTT topic
//! (through the `mqtt/subscribe` command), then streams parsed
//! [`HassEvent`]s through a [`tokio::sync::broadcast`] channel.
//! Reconnection uses exponential backoff with jitter.
//!
//! # Example
//!
//! ```rust,ignore
//! use nspanel_api::websocket::{WebSocketHandle, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let handle = WebSocketHandle::connect(
//!     ws_url,
//!     token,
//!     vec!["tele/nspanel/RESULT".into()],
//!     ReconnectConfig::default(),
//!     cancel.clone(),
//! );
//! let mut rx = handle.subscribe();
//! while let Ok(event) = rx.recv().await {
//!     println!("{event:?}");
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::models::{HassEvent, MqttMessage, StateChangedData};

// ── Broadcast channel capacity ───────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Upper bound on each step of the auth handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for WebSocket reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── WebSocketHandle ──────────────────────────────────────────────────

/// Handle to a running WebSocket event stream.
pub struct WebSocketHandle {
    event_rx: broadcast::Receiver<Arc<HassEvent>>,
    cancel: CancellationToken,
}

impl WebSocketHandle {
    /// Spawn the connection loop and return immediately.
    ///
    /// The first connection attempt happens asynchronously. A
    /// [`HassEvent::Connected`] is broadcast after every successful
    /// authentication so consumers can resynchronise their state.
    pub fn connect(
        ws_url: Url,
        token: &SecretString,
        mqtt_topics: Vec<String>,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let session = Session {
            url: ws_url,
            token: SecretString::from(token.expose_secret().to_owned()),
            mqtt_topics,
        };
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            ws_loop(session, event_tx, reconnect, task_cancel).await;
        });

        Self { event_rx, cancel }
    }

    /// Get a new broadcast receiver for the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<HassEvent>> {
        self.event_rx.resubscribe()
    }

    /// Signal the background task to shut down.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Everything needed to (re)establish one connection.
struct Session {
    url: Url,
    token: SecretString,
    mqtt_topics: Vec<String>,
}

// ── Background reconnection loop ─────────────────────────────────────

async fn ws_loop(
    session: Session,
    event_tx: broadcast::Sender<Arc<HassEvent>>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&session, &event_tx, &cancel) => {
                match result {
                    Ok(()) => {
                        tracing::info!("WebSocket disconnected cleanly, reconnecting");
                        attempt = 0;
                    }
                    Err(e) if e.is_auth_failure() => {
                        tracing::error!(error = %e, "Home Assistant rejected the access token, giving up");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempt, "WebSocket error");

                        if let Some(max) = reconnect.max_retries {
                            if attempt >= max {
                                tracing::error!(
                                    max_retries = max,
                                    "WebSocket reconnection limit reached, giving up"
                                );
                                break;
                            }
                        }

                        let delay = calculate_backoff(attempt, &reconnect);
                        tracing::info!(
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            attempt,
                            "Waiting before reconnect"
                        );

                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(delay) => {}
                        }

                        attempt = attempt.saturating_add(1);
                    }
                }
            }
        }
    }

    tracing::debug!("WebSocket loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// What a subscription id was opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subscription {
    StateChanged,
    Mqtt,
}

async fn connect_and_read(
    session: &Session,
    event_tx: &broadcast::Sender<Arc<HassEvent>>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(url = %session.url, "Connecting to Home Assistant WebSocket");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(session.url.as_str())
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    let (mut write, mut read) = ws_stream.split();

    // ── Auth handshake ──
    expect_message(&mut read, "auth_required", HANDSHAKE_TIMEOUT).await?;
    let auth = json!({ "type": "auth", "access_token": session.token.expose_secret() });
    write
        .send(tungstenite::Message::text(auth.to_string()))
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
    expect_message(&mut read, "auth_ok", HANDSHAKE_TIMEOUT).await?;

    tracing::info!("WebSocket authenticated");

    // ── Subscriptions ──
    let mut subscriptions: HashMap<u64, Subscription> = HashMap::new();
    let mut next_id: u64 = 1;
    let mut commands = vec![(
        Subscription::StateChanged,
        json!({ "type": "subscribe_events", "event_type": "state_changed" }),
    )];
    for topic in &session.mqtt_topics {
        commands.push((
            Subscription::Mqtt,
            json!({ "type": "mqtt/subscribe", "topic": topic }),
        ));
    }
    for (kind, mut command) in commands {
        command["id"] = json!(next_id);
        subscriptions.insert(next_id, kind);
        next_id += 1;
        write
            .send(tungstenite::Message::text(command.to_string()))
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
    }

    let _ = event_tx.send(Arc::new(HassEvent::Connected));

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        if let Some(event) = parse_frame(&text, &subscriptions) {
                            // No subscribers is not an error.
                            let _ = event_tx.send(Arc::new(event));
                        }
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(code = %cf.code, reason = %cf.reason, "WebSocket close frame received");
                        } else {
                            tracing::info!("WebSocket close frame received (no payload)");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
                    None => {
                        tracing::info!("WebSocket stream ended");
                        return Ok(());
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

/// Read frames until a text frame arrives and check its `type`. A server
/// that stays silent for `within` fails the attempt.
async fn expect_message<S>(read: &mut S, expected: &str, within: Duration) -> Result<(), Error>
where
    S: futures_util::Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    tokio::time::timeout(within, next_handshake_frame(read, expected))
        .await
        .map_err(|_| Error::Timeout {
            timeout_secs: within.as_secs(),
        })?
}

async fn next_handshake_frame<S>(read: &mut S, expected: &str) -> Result<(), Error>
where
    S: futures_util::Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    loop {
        match read.next().await {
            Some(Ok(tungstenite::Message::Text(text))) => {
                let frame: Frame = serde_json::from_str(&text).map_err(|e| {
                    Error::Deserialization {
                        message: e.to_string(),
                        body: text.to_string(),
                    }
                })?;
                return check_handshake(&frame, expected);
            }
            Some(Ok(tungstenite::Message::Close(_))) | None => {
                return Err(Error::WebSocketClosed {
                    code: 1000,
                    reason: format!("closed while waiting for {expected}"),
                });
            }
            Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
            Some(Ok(_)) => {}
        }
    }
}

fn check_handshake(frame: &Frame, expected: &str) -> Result<(), Error> {
    match frame.kind.as_str() {
        t if t == expected => Ok(()),
        "auth_invalid" => Err(Error::Authentication {
            message: frame
                .message
                .clone()
                .unwrap_or_else(|| "invalid access token".into()),
        }),
        other => Err(Error::WebSocketConnect(format!(
            "expected {expected}, got {other}"
        ))),
    }
}

// ── Message parsing ──────────────────────────────────────────────────

/// Envelope shared by every frame Home Assistant sends.
#[derive(Debug, Deserialize)]
struct Frame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<FrameError>,
    #[serde(default)]
    event: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct FrameError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct StateChangedEvent {
    data: StateChangedData,
}

/// Parse one text frame. Returns `None` for command results and
/// anything that isn't an event we subscribed to.
fn parse_frame(text: &str, subscriptions: &HashMap<u64, Subscription>) -> Option<HassEvent> {
    let frame: Frame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!(error = %e, "Failed to parse WebSocket frame");
            return None;
        }
    };

    match frame.kind.as_str() {
        "result" => {
            if frame.success == Some(false) {
                let (code, message) = frame
                    .error
                    .map(|e| (e.code, e.message))
                    .unwrap_or_default();
                tracing::warn!(id = ?frame.id, code, message, "WebSocket command failed");
            }
            None
        }
        "event" => {
            let kind = frame.id.and_then(|id| subscriptions.get(&id).copied())?;
            let payload = frame.event?;
            match kind {
                Subscription::StateChanged => {
                    match serde_json::from_value::<StateChangedEvent>(payload) {
                        Ok(evt) => Some(HassEvent::StateChanged {
                            entity_id: evt.data.entity_id,
                            new_state: evt.data.new_state,
                        }),
                        Err(e) => {
                            tracing::debug!(error = %e, "Malformed state_changed event");
                            None
                        }
                    }
                }
                Subscription::Mqtt => match serde_json::from_value::<MqttMessage>(payload) {
                    Ok(msg) => Some(HassEvent::Mqtt(msg)),
                    Err(e) => {
                        tracing::debug!(error = %e, "Malformed MQTT event");
                        None
                    }
                },
            }
        }
        other => {
            tracing::trace!(kind = other, "Ignoring WebSocket frame");
            None
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 +- 0.25)`
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    Duration::from_secs_f64((capped * jitter_factor).max(0.0))
}

// ── Tests ────────────────────────────────────────────────────────────
