#![allow(clippy::unwrap_used)]
// The panel actor serialises panel messages, state changes and jobs.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use tokio_util::sync::CancellationToken;

use common::{RecordingBus, panel_config, populated_store};
use nspanel_core::scheduler::Clock;
use nspanel_core::{
    EntityConfig, EntityState, IconTable, IidAllocator, JobKind, Panel, PanelInput, PanelSession,
};

fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 17)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

// Frozen mid-minute so no scheduled job fires during a test.
struct FrozenClock;

impl Clock for FrozenClock {
    fn now(&self) -> NaiveDateTime {
        at(12, 30, 30)
    }
}

/// A clock the test moves by hand.
#[derive(Clone)]
struct ManualClock(Arc<Mutex<NaiveDateTime>>);

impl ManualClock {
    fn starting_at(now: NaiveDateTime) -> Self {
        Self(Arc::new(Mutex::new(now)))
    }

    fn set(&self, now: NaiveDateTime) {
        *self.0.lock().unwrap() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.0.lock().unwrap()
    }
}

fn spawn_panel() -> (Panel, Arc<common::MemoryStore>, Arc<RecordingBus>, PanelSession) {
    let store = populated_store();
    let bus = Arc::new(RecordingBus::default());
    let session = PanelSession::new(
        panel_config(),
        &IidAllocator::new(),
        Arc::new(IconTable::builtin()),
        store.clone(),
        bus.clone(),
    )
    .unwrap();
    // A twin session over the same config gives the card ids.
    let twin = PanelSession::new(
        panel_config(),
        &IidAllocator::new(),
        Arc::new(IconTable::builtin()),
        store.clone(),
        Arc::new(RecordingBus::default()),
    )
    .unwrap();
    let panel = Panel::spawn_with_clock(session, FrozenClock, CancellationToken::new());
    (panel, store, bus, twin)
}

#[tokio::test]
async fn test_announces_startup_page() {
    let (panel, _store, bus, _) = spawn_panel();
    panel.snapshot().await.unwrap();
    assert_eq!(bus.take().first().map(String::as_str), Some("pageType,pageStartup"));
    assert_eq!(panel.recv_topic(), "tele/hall/RESULT");
    assert!(panel.watches("light.kitchen"));
    assert!(!panel.watches("navigate.rooms"));
    panel.shutdown().await;
}

#[tokio::test]
async fn test_interleaved_state_changes_never_tear_navigation() {
    let (panel, store, _bus, twin) = spawn_panel();
    let rooms = twin.registry().search("rooms").unwrap().iid;

    panel.message("event,startup,53,eu").await.unwrap();
    panel
        .message("event,buttonPress2,screensaver,bExit")
        .await
        .unwrap();

    let mut notifiers = Vec::new();
    for entity in ["light.kitchen", "switch.fan"] {
        let panel = panel.clone();
        let store = Arc::clone(&store);
        notifiers.push(tokio::spawn(async move {
            for i in 0..50 {
                let state = if i % 2 == 0 { "on" } else { "off" };
                store.set(EntityState::new(entity, state));
                panel.state_changed(entity).await.unwrap();
                tokio::task::yield_now().await;
            }
        }));
    }

    panel
        .message("event,buttonPress2,navigate.rooms,button")
        .await
        .unwrap();
    panel.message("event,renderCurrentPage").await.unwrap();

    for notifier in notifiers {
        notifier.await.unwrap();
    }

    let snapshot = panel.snapshot().await.unwrap();
    assert_eq!(snapshot.current, Some(rooms));
    assert_eq!(snapshot.history.len(), 1);
    panel.shutdown().await;
}

#[tokio::test]
async fn test_jobs_and_unwatched_entities() {
    let (panel, _store, bus, _) = spawn_panel();
    panel.snapshot().await.unwrap();
    bus.take();

    panel.send(PanelInput::Job(JobKind::UpdateTime)).await.unwrap();
    panel.state_changed("sensor.not_on_any_card").await.unwrap();
    panel.snapshot().await.unwrap();

    let sent = bus.take();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with("time,"));
    panel.shutdown().await;
}

#[tokio::test]
async fn test_send_after_shutdown_fails() {
    let (panel, _store, _bus, _) = spawn_panel();
    panel.shutdown().await;
    assert!(panel.message("event,sleepReached").await.is_err());
}

#[tokio::test]
async fn test_refresh_redraws_from_reloaded_states() {
    let (panel, store, bus, _) = spawn_panel();

    // Before startup there is nothing on screen to redraw.
    panel.refresh().await.unwrap();
    panel.snapshot().await.unwrap();
    assert_eq!(bus.take(), vec!["pageType,pageStartup"]);

    panel.message("event,startup,53,eu").await.unwrap();
    panel.message("event,buttonPress2,screensaver,bExit").await.unwrap();
    panel.message("event,renderCurrentPage").await.unwrap();
    panel.snapshot().await.unwrap();
    let shown = bus.take();
    assert!(shown.iter().any(|p| p.contains(",Kitchen,0")));

    // The state moved while no change notice could arrive.
    store.set(EntityState::new("light.kitchen", "on").with_attr("friendly_name", "Kitchen"));
    panel.refresh().await.unwrap();
    panel.snapshot().await.unwrap();

    let sent = bus.take();
    assert_eq!(sent[0], "entityUpdHeading,Home");
    assert!(sent[1].starts_with("entityUpd,") && sent[1].contains(",Kitchen,1"));
    assert!(sent.iter().any(|p| p.starts_with("dimmode,")));
    panel.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_screensaver_weather_refreshes_on_the_quarter_hour() {
    let clock = ManualClock::starting_at(at(12, 44, 58));
    let store = populated_store();
    store.set(
        EntityState::new("weather.home", "sunny")
            .with_attr("temperature", 18)
            .with_attr("humidity", 60),
    );
    let mut config = panel_config();
    config.screensaver.entities = vec![EntityConfig::new("weather.home")];
    let bus = Arc::new(RecordingBus::default());
    let session = PanelSession::new(
        config,
        &IidAllocator::new(),
        Arc::new(IconTable::builtin()),
        store.clone(),
        bus.clone(),
    )
    .unwrap();
    let panel = Panel::spawn_with_clock(session, clock.clone(), CancellationToken::new());

    panel.message("event,startup,53,eu").await.unwrap();
    panel.snapshot().await.unwrap();
    bus.take();

    clock.set(at(12, 45, 0));
    tokio::time::sleep(Duration::from_secs(3)).await;
    panel.snapshot().await.unwrap();
    let sent = bus.take();
    assert_eq!(sent.iter().filter(|p| p.starts_with("weatherUpdate,")).count(), 1);
    assert!(sent.contains(&"time,12:45".to_owned()));

    // Off the screensaver the quarter-hour job sends nothing.
    panel.message("event,buttonPress2,screensaver,bExit").await.unwrap();
    panel.snapshot().await.unwrap();
    bus.take();
    clock.set(at(13, 0, 0));
    tokio::time::sleep(Duration::from_secs(3)).await;
    panel.snapshot().await.unwrap();
    let sent = bus.take();
    assert!(sent.iter().all(|p| !p.starts_with("weatherUpdate")));
    assert!(sent.contains(&"time,13:00".to_owned()));
    panel.shutdown().await;
}
