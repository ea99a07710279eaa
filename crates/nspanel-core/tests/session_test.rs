#![allow(clippy::unwrap_used)]
// End-to-end session behaviour over an in-memory store and bus.

mod common;

use pretty_assertions::assert_eq;

use common::{Harness, panel_config};
use nspanel_core::{EntityState, NavState};

// ── Dispatch ────────────────────────────────────────────────────────

#[test]
fn test_on_off_turns_light_on_and_rerenders_current_card() {
    let mut h = Harness::new().on_home();

    h.send("event,buttonPress2,light.kitchen,OnOff,1");

    let calls = h.store.take_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].entity_id, "light.kitchen");
    assert_eq!(calls[0].qualified_name(), "light.turn_on");

    let sent = h.bus.take();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], "entityUpdHeading,Home");
    assert!(sent[1].starts_with("entityUpd,light,iid.42,"));
}

#[test]
fn test_action_on_entity_of_another_card_does_not_rerender() {
    let mut h = Harness::new().on_home();

    h.send("event,buttonPress2,switch.fan,OnOff,0");

    let calls = h.store.take_calls();
    assert_eq!(calls[0].qualified_name(), "switch.turn_off");
    assert!(h.bus.take().is_empty());
}

#[test]
fn test_brightness_slider_scales_to_255() {
    let mut h = Harness::new().on_home();

    h.send("event,buttonPress2,iid.42,brightnessSlider,80");

    let calls = h.store.take_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].entity_id, "light.kitchen");
    assert_eq!(calls[0].service, "turn_on");
    assert_eq!(calls[0].body()["brightness"], 204);
}

#[test]
fn test_short_ids_resolve_on_current_card_only() {
    let mut h = Harness::new().on_home();

    // iid.46 is switch.fan on the rooms card.
    h.send("event,buttonPress2,iid.46,OnOff,1");
    assert!(h.store.take_calls().is_empty());
    assert!(h.bus.take().is_empty());
}

#[test]
fn test_malformed_values_are_dropped() {
    let mut h = Harness::new().on_home();

    h.send("event,buttonPress2,iid.42,brightnessSlider,bright");
    h.send("event,buttonPress2,iid.42,brightnessSlider");
    h.send("event,buttonPress2,iid.42,teleport,1");

    assert!(h.store.take_calls().is_empty());
    assert!(h.bus.take().is_empty());
}

// ── Detail popups ───────────────────────────────────────────────────

#[test]
fn test_open_detail_miss_is_silent() {
    let mut h = Harness::new().on_home();

    h.send("event,pageOpenDetail,popupLight,iid.7");
    h.send("event,pageOpenDetail,popupLight,iid.49");
    h.send("event,pageOpenDetail,popupWarp,iid.42");

    assert!(h.bus.take().is_empty());
}

#[test]
fn test_open_detail_and_refresh_on_state_change() {
    let mut h = Harness::new().on_home();

    h.send("event,pageOpenDetail,popupLight,iid.42");
    let sent = h.bus.take();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with("entityUpdateDetail,iid.42,"));

    h.store.set(
        EntityState::new("light.kitchen", "on")
            .with_attr("brightness", 255)
            .with_attr("supported_color_modes", serde_json::json!(["brightness"])),
    );
    h.session.handle_state_change("light.kitchen");
    let sent = h.bus.take();
    // Card body, then the select and light popups.
    assert_eq!(sent.len(), 4);
    assert!(sent[1].starts_with("entityUpd,light,iid.42,"));
    assert!(sent[2].starts_with("entityUpdateDetail2,iid.42,"));
    assert!(sent[3].starts_with("entityUpdateDetail,iid.42,"));
    assert!(sent[3].contains(",1,100,"));
}

// ── Navigation ──────────────────────────────────────────────────────

#[test]
fn test_back_is_lifo_with_default_fallback() {
    let mut h = Harness::new().on_home();
    let (home, rooms, secret) = (h.card("home"), h.card("rooms"), h.card("secret"));

    h.send("event,buttonPress2,iid.44,button");
    h.send("event,buttonPress2,iid.47,button");
    assert_eq!(h.current(), secret);
    assert_eq!(h.history(), vec![home, rooms]);

    h.send("event,buttonPress2,secret,bExit");
    assert_eq!(h.current(), rooms);
    h.send("event,buttonPress2,rooms,bExit");
    assert_eq!(h.current(), home);
    h.send("event,buttonPress2,home,bExit");
    assert_eq!(h.current(), home, "empty history falls back to the first card");
    assert!(h.history().is_empty());
}

#[test]
fn test_page_switch_sends_page_type_only() {
    let mut h = Harness::new().on_home();

    h.send("event,buttonPress2,navigate.rooms,button");
    assert_eq!(h.bus.take(), vec!["pageType,cardGrid"]);

    h.send("event,renderCurrentPage");
    let sent = h.bus.take();
    assert_eq!(sent[0], "entityUpdHeading,Rooms");
    assert!(sent[1].starts_with("entityUpd,switch,iid.46,"));
}

#[test]
fn test_sleep_never_stacks_the_screensaver() {
    let mut h = Harness::new().on_home();
    let home = h.card("home");
    let screensaver = h.session.registry().screensaver().iid;

    h.send("event,sleepReached");
    h.send("event,sleepReached");
    assert_eq!(h.current(), screensaver);
    assert_eq!(h.history(), vec![home]);

    h.send("event,buttonPress2,screensaver,bExit");
    assert_eq!(h.current(), home);
    assert!(h.history().is_empty());
}

#[test]
fn test_exit_from_screensaver_goes_to_default_card() {
    let mut config = panel_config();
    config.default_card = Some("navigate.rooms".into());
    let mut h = Harness::with_config(config, 40).on_home();
    let rooms = h.card("rooms");
    assert_eq!(h.current(), rooms);

    h.send("event,buttonPress2,navigate.home,button");
    h.send("event,sleepReached");
    h.send("event,buttonPress2,screensaver,bExit");
    assert_eq!(h.current(), rooms);
    assert!(h.history().is_empty());
}

#[test]
fn test_swipe_follows_visible_cards_without_history() {
    let mut h = Harness::new().on_home();
    let (home, rooms) = (h.card("home"), h.card("rooms"));

    h.send("event,buttonPress2,home,bNext");
    assert_eq!(h.current(), rooms);
    h.send("event,buttonPress2,rooms,bNext");
    assert_eq!(h.current(), home);
    h.send("event,buttonPress2,home,bPrev");
    assert_eq!(h.current(), rooms);
    assert!(h.history().is_empty());

    // Hidden cards are not part of the chain.
    h.send("event,buttonPress2,navigate.secret,button");
    h.bus.take();
    h.send("event,buttonPress2,secret,bNext");
    assert!(h.bus.take().is_empty());
}

#[test]
fn test_unlock_requires_matching_pin() {
    let mut h = Harness::new().on_home();
    let (vault, secret) = (h.card("vault"), h.card("secret"));

    h.send("event,buttonPress2,navigate.vault,button");
    assert_eq!(
        h.session.snapshot().state,
        NavState::AwaitingUnlock {
            card: vault,
            target: secret
        }
    );
    h.send("event,renderCurrentPage");
    assert_eq!(
        h.bus.take(),
        vec!["pageType,cardUnlock", "entityUpd,Vault,navigate.secret"]
    );

    h.send("event,buttonPress2,navigate.secret,cardUnlock-unlock,0000");
    assert_eq!(h.current(), vault);
    assert!(h.bus.take().is_empty());

    h.send("event,buttonPress2,navigate.secret,cardUnlock-unlock,1234");
    assert_eq!(h.current(), secret);
    assert_eq!(h.history(), vec![h.card("home"), vault]);
}

#[test]
fn test_card_sleep_timeout_is_sent_on_change() {
    let mut config = panel_config();
    config.cards[1].sleep_timeout = Some(60);
    let mut h = Harness::with_config(config, 40).on_home();

    h.send("event,buttonPress2,navigate.rooms,button");
    assert_eq!(h.bus.take(), vec!["pageType,cardGrid", "timeout,60"]);
    h.send("event,buttonPress2,navigate.UP,button");
    assert_eq!(h.bus.take(), vec!["pageType,cardEntities", "timeout,20"]);
}

// ── Dim mode ────────────────────────────────────────────────────────

#[test]
fn test_tracked_entity_change_sends_dim_mode() {
    let mut config = panel_config();
    config.sleep_tracking = vec!["person.alice".into()];
    let mut h = Harness::with_config(config, 40).on_home();

    h.store.set(EntityState::new("person.alice", "not_home"));
    h.session.handle_state_change("person.alice");
    assert_eq!(h.bus.take(), vec!["dimmode,20,20,6371,,0"]);

    h.session.handle_state_change("sensor.unrelated");
    assert!(h.bus.take().is_empty());
}
