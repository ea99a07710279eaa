//! `nspanel check`: build every panel session offline and print a summary.

use std::sync::Arc;

use nspanel_config::AppConfig;
use nspanel_core::bridge::build_sessions;
use nspanel_core::{ChannelBus, ChannelStore, PanelSession, StateCache};

use crate::error::CliError;

pub fn handle(config: &AppConfig) -> Result<(), CliError> {
    // Sessions are built against an empty cache; nothing is sent anywhere.
    let (store, _calls) = ChannelStore::new(Arc::new(StateCache::new()));
    let (bus, _outbound) = ChannelBus::new();
    let sessions = build_sessions(config.panels.clone(), Arc::new(store), Arc::new(bus))?;

    println!("Home Assistant: {}", config.home_assistant.url);
    for session in &sessions {
        print!("{}", summary(session));
    }
    println!("ok: {} panel(s)", sessions.len());
    Ok(())
}

fn summary(session: &PanelSession) -> String {
    let cfg = session.config();
    let registry = session.registry();
    let mut out = format!(
        "panel {} ({} -> {})\n",
        session.name(),
        cfg.panel_recv_topic,
        cfg.panel_send_topic
    );
    for card in registry.cards() {
        let key = card
            .navigate_key
            .as_deref()
            .map_or_else(String::new, |k| format!(" navigate.{k}"));
        let hidden = if card.hidden { " hidden" } else { "" };
        out.push_str(&format!(
            "  {:<14} {:<20} {} entities{key}{hidden}\n",
            card.page_type(),
            card.label(),
            card.entities.len()
        ));
    }
    out.push_str(&format!(
        "  {} visible card(s), {} watched entities\n",
        registry.visible().len(),
        session.watched_entities().len()
    ));
    out
}
