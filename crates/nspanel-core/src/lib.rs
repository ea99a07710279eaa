//! Panel controller core for NSPanel Lovelace displays.
//!
//! This crate owns everything between the Home Assistant transport and the
//! panel's line-oriented text protocol:
//!
//! - **[`protocol`]**: outbound [`PanelCommand`]s and inbound
//!   [`PanelEvent`]s with exact wire encoding, plus the scale helpers.
//! - **[`model`]**: cards and entities in an index-based
//!   [`CardRegistry`], short ids from a shared [`IidAllocator`].
//! - **[`render`]**: card and detail-popup rendering against an
//!   [`EntityStore`], with placeholders for missing entities.
//! - **[`navigation`]**: the current-card/history state machine.
//! - **[`dispatch`]**: button presses to typed actions and service calls.
//! - **[`session`]** / **[`panel`]**: the single-writer session per panel
//!   and the actor task that feeds it from one ordered queue.
//! - **[`bridge`]**: the Home Assistant wiring (state cache, WebSocket
//!   events, MQTT over `mqtt.publish`).

pub mod bridge;
pub mod bus;
pub mod config;
pub mod dim;
pub mod dispatch;
pub mod error;
pub mod icons;
pub mod model;
pub mod navigation;
pub mod panel;
pub mod protocol;
pub mod render;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod subscription;

// ── Primary re-exports ──────────────────────────────────────────
pub use bridge::HassBridge;
pub use bus::{ChannelBus, MessageBus, OutboundMessage};
pub use config::{CardConfig, EntityConfig, PanelConfig, ScreensaverConfig};
pub use error::CoreError;
pub use icons::IconTable;
pub use model::{Card, CardKind, CardRegistry, Entity, IidAllocator, ShortId};
pub use navigation::{NavState, Navigator, Transition};
pub use panel::{Panel, PanelInput};
pub use protocol::{PanelCommand, PanelEvent};
pub use session::{JobKind, PanelSession, SessionSnapshot};
pub use store::{ChannelStore, EntityState, EntityStore, ServiceCall, StateCache};
