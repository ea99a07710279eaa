// ── Panel session ──
//
// All state of one physical panel: the card registry, the navigator and
// the render cache. The session is synchronous and single-writer; the
// panel actor feeds it one input at a time, so a navigation and a
// state-triggered re-render can never interleave.
//
// Lookup misses and malformed panel messages are logged and dropped here.
// Nothing a panel sends can fail the session.

use std::sync::Arc;

use chrono::NaiveDateTime;
use chrono::format::{Item, StrftimeItems};
use strum::{AsRefStr, EnumIter};
use tracing::{debug, info, warn};

use crate::bus::MessageBus;
use crate::config::PanelConfig;
use crate::dim::{DimRules, dim_mode};
use crate::dispatch::{ButtonType, dispatch, parse_button};
use crate::error::CoreError;
use crate::icons::IconTable;
use crate::model::{Card, CardRegistry, Entity, IidAllocator, ShortId};
use crate::navigation::{NavState, Navigator, Transition};
use crate::protocol::{PanelCommand, PanelEvent};
use crate::render::{DetailKind, Renderer};
use crate::scheduler::{Clock, Recurrence, SystemClock};
use crate::store::{EntityStore, domain_of};
use crate::subscription::SubscriptionIndex;

/// Page the panel shows until the first `startup` event.
const STARTUP_PAGE: &str = "pageStartup";
const NAVIGATE_PREFIX: &str = "navigate.";
/// `navigate.UP` goes back instead of opening a card.
const NAVIGATE_UP: &str = "UP";
const SCREENSAVER_TARGETS: [&str; 2] = ["screensaver", "screensaver2"];

// ── Jobs ─────────────────────────────────────────────────────────

/// Periodic panel jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum JobKind {
    UpdateTime,
    UpdateDate,
    /// Re-send the screensaver's weather while it is shown.
    UpdateWeather,
}

impl JobKind {
    pub fn recurrence(self) -> Recurrence {
        match self {
            Self::UpdateTime => Recurrence::minutely(0),
            Self::UpdateDate => Recurrence::hourly(0, 0),
            Self::UpdateWeather => Recurrence::every_minutes(15, 0),
        }
    }
}

// ── Snapshot ─────────────────────────────────────────────────────

/// Navigation state at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub current: Option<ShortId>,
    pub history: Vec<ShortId>,
    pub state: NavState,
}

/// A button target resolved to an entity id.
struct Target {
    entity_id: String,
    effect_list: Option<Vec<String>>,
}

impl From<&Entity> for Target {
    fn from(entity: &Entity) -> Self {
        Self {
            entity_id: entity.entity_id.clone(),
            effect_list: entity.effect_list.clone(),
        }
    }
}

// ── PanelSession ─────────────────────────────────────────────────

pub struct PanelSession {
    config: PanelConfig,
    registry: CardRegistry,
    navigator: Navigator,
    index: SubscriptionIndex,
    dim_entities: Vec<String>,
    icons: Arc<IconTable>,
    store: Arc<dyn EntityStore>,
    bus: Arc<dyn MessageBus>,
    clock: Box<dyn Clock>,
    /// Last content sent for the current card.
    rendered: Option<(ShortId, Vec<PanelCommand>)>,
    /// Last `timeout` sent to the panel.
    timeout: Option<u32>,
    /// Detail popup last opened on the current card, by entity short id.
    open_detail: Option<(DetailKind, ShortId)>,
}

impl PanelSession {
    /// Build the session for one panel. Fails on configuration errors
    /// only: bad card types, duplicate keys, unknown default card,
    /// unusable time/date formats.
    pub fn new(
        config: PanelConfig,
        alloc: &IidAllocator,
        icons: Arc<IconTable>,
        store: Arc<dyn EntityStore>,
        bus: Arc<dyn MessageBus>,
    ) -> Result<Self, CoreError> {
        validate_format("timeFormat", &config.time_format)?;
        validate_format("dateFormat", &config.date_format)?;

        let registry = CardRegistry::from_panel(&config, alloc)?;
        if let Some(default) = config.default_card.as_deref() {
            let found = default
                .strip_prefix(NAVIGATE_PREFIX)
                .and_then(|key| registry.search(key))
                .is_some();
            if !found {
                return Err(CoreError::Config {
                    message: format!(
                        "panel '{}': defaultCard '{default}' does not name a card",
                        config.name
                    ),
                });
            }
        }

        let index = SubscriptionIndex::build(&registry);
        let dim_entities = DimRules::from_panel(&config).involved_entities();
        info!(
            panel = %config.name,
            cards = registry.visible().len(),
            entities = registry.entity_count(),
            "panel session ready"
        );

        Ok(Self {
            config,
            registry,
            navigator: Navigator::new(),
            index,
            dim_entities,
            icons,
            store,
            bus,
            clock: Box::new(SystemClock),
            rendered: None,
            timeout: None,
            open_detail: None,
        })
    }

    /// Replace the wall clock used for time and date commands.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    // ── Accessors ────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    pub fn registry(&self) -> &CardRegistry {
        &self.registry
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            current: self.navigator.current(),
            history: self.navigator.history().to_vec(),
            state: self.navigator.state(&self.registry),
        }
    }

    /// Entity ids whose changes matter to this panel.
    pub fn watched_entities(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .index
            .entities()
            .into_iter()
            .map(str::to_owned)
            .chain(self.dim_entities.iter().cloned())
            .collect();
        out.sort();
        out.dedup();
        out
    }

    // ── Inputs ───────────────────────────────────────────────────

    /// Tell a freshly connected panel to show its boot page.
    pub fn announce(&self) {
        self.send(&PanelCommand::page_type(STARTUP_PAGE));
    }

    /// Decode and handle one raw message from the panel.
    pub fn handle_payload(&mut self, payload: &str) {
        debug!(panel = %self.config.name, payload, "message from panel");
        match PanelEvent::from_payload(payload) {
            Ok(event) => self.handle_event(event),
            Err(e) => debug!(panel = %self.config.name, error = %e, "dropping panel message"),
        }
    }

    pub fn handle_event(&mut self, event: PanelEvent) {
        match event {
            PanelEvent::Startup {
                firmware_version,
                model,
            } => self.on_startup(&firmware_version, model.as_deref()),
            PanelEvent::SleepReached => {
                self.navigator.sleep(&self.registry);
                let screensaver = self.registry.screensaver().iid;
                self.switch_page(Transition::Switched(screensaver));
            }
            PanelEvent::RenderCurrentPage => self.render_current(true),
            PanelEvent::ButtonPress {
                target,
                button,
                value,
            } => self.on_button(&target, &button, value.as_deref()),
            PanelEvent::PageOpenDetail { kind, target } => self.on_open_detail(&kind, &target),
        }
    }

    /// An entity changed state.
    pub fn handle_state_change(&mut self, entity_id: &str) {
        if self.shows(entity_id) {
            self.render_current(false);
            self.refresh_details(entity_id);
        }
        if self.dim_entities.iter().any(|e| e == entity_id) {
            self.send_dim_mode();
        }
    }

    /// Resend everything on screen after the state store was reloaded
    /// wholesale. A panel that has not started yet is left alone.
    pub fn refresh(&mut self) {
        if self.navigator.current().is_none() {
            return;
        }
        debug!(panel = %self.config.name, "refreshing after state reload");
        self.render_current(true);
        if let Some((kind, iid)) = self.open_detail {
            let entity = self
                .current_card()
                .and_then(|c| c.entities.iter().find(|e| e.iid == iid));
            if let Some(command) =
                entity.and_then(|e| Renderer::new(self.store.as_ref(), &self.icons).detail(kind, e))
            {
                self.send(&command);
            }
        }
        self.send_dim_mode();
    }

    pub fn run_job(&mut self, job: JobKind) {
        match job {
            JobKind::UpdateTime => self.send_time(),
            JobKind::UpdateDate => self.send_date(),
            JobKind::UpdateWeather => {
                let on_screensaver = self
                    .navigator
                    .current()
                    .is_some_and(|iid| self.registry.is_screensaver(iid));
                if on_screensaver {
                    self.render_current(true);
                }
            }
        }
    }

    // ── Event handlers ───────────────────────────────────────────

    fn on_startup(&mut self, firmware_version: &str, model: Option<&str>) {
        info!(
            panel = %self.config.name,
            firmware = firmware_version,
            model = model.unwrap_or("unknown"),
            "panel started"
        );
        self.send_date();
        self.send_time();

        // The panel lost its state; resend everything.
        self.timeout = None;
        self.rendered = None;
        let transition = self.navigator.show_screensaver(&self.registry);
        self.switch_page(transition);
        self.send_dim_mode();
    }

    fn on_button(&mut self, target: &str, button: &str, value: Option<&str>) {
        if target.is_empty() {
            return;
        }
        let button = match parse_button(button) {
            Ok(button) => button,
            Err(e) => {
                warn!(panel = %self.config.name, target, error = %e, "ignoring button press");
                return;
            }
        };

        match button {
            ButtonType::Exit => self.on_exit(target, value),
            ButtonType::Next => {
                let transition = self.navigator.next(&self.registry);
                self.switch_page(transition);
            }
            ButtonType::Prev => {
                let transition = self.navigator.prev(&self.registry);
                self.switch_page(transition);
            }
            ButtonType::Unlock => {
                let Some(key) = target.strip_prefix(NAVIGATE_PREFIX) else {
                    warn!(panel = %self.config.name, target, "unlock without a navigation target");
                    return;
                };
                let transition =
                    self.navigator
                        .unlock_attempt(&self.registry, key, value.unwrap_or_default());
                self.switch_page(transition);
            }
            _ => {
                let Some(resolved) = self.resolve_target(target) else {
                    return;
                };
                if button == ButtonType::Button {
                    if let Some(key) = resolved.entity_id.strip_prefix(NAVIGATE_PREFIX) {
                        self.navigate(key);
                        return;
                    }
                }
                self.on_entity_action(&resolved, button, value);
            }
        }
    }

    fn on_exit(&mut self, target: &str, value: Option<&str>) {
        let from_screensaver = SCREENSAVER_TARGETS.contains(&target);
        if from_screensaver
            && self.registry.screensaver().double_tap_to_unlock
            && value == Some("1")
        {
            debug!(panel = %self.config.name, "first tap on the screensaver ignored");
            return;
        }

        let default = self.default_card();
        let transition = if from_screensaver && self.config.default_card.is_some() {
            self.navigator.wake_to_default(default)
        } else {
            self.navigator.back(default)
        };
        self.switch_page(transition);
    }

    fn navigate(&mut self, key: &str) {
        let transition = if key == NAVIGATE_UP {
            self.navigator.back(self.default_card())
        } else {
            self.navigator.open_key(&self.registry, key)
        };
        self.switch_page(transition);
    }

    fn on_entity_action(&mut self, target: &Target, button: ButtonType, value: Option<&str>) {
        let entity_id = target.entity_id.as_str();
        let state = self.store.state(entity_id);
        let call = match dispatch(
            button,
            value,
            entity_id,
            state.as_ref(),
            target.effect_list.as_deref(),
        ) {
            Ok(call) => call,
            Err(e) => {
                warn!(panel = %self.config.name, entity = entity_id, error = %e, "ignoring button press");
                return;
            }
        };

        info!(panel = %self.config.name, service = %call.qualified_name(), entity = entity_id, "calling service");
        self.store.call_service(call);

        if self.shows(entity_id) {
            self.render_current(true);
        }
    }

    fn on_open_detail(&mut self, kind: &str, target: &str) {
        let kind: DetailKind = match kind.parse() {
            Ok(kind) => kind,
            Err(_) => {
                warn!(panel = %self.config.name, kind, "unknown detail popup");
                return;
            }
        };
        let Some(card) = self.current_card() else {
            debug!(panel = %self.config.name, target, "detail requested with no card shown");
            return;
        };
        let entity = if target.starts_with("iid.") {
            card.entity_by_token(target)
        } else {
            card.entity_by_id(target)
        };
        let Some(entity) = entity else {
            debug!(panel = %self.config.name, target, %kind, "detail target not on current card");
            return;
        };

        let iid = entity.iid;
        let command = Renderer::new(self.store.as_ref(), &self.icons).detail(kind, entity);
        self.open_detail = Some((kind, iid));
        if let Some(command) = command {
            self.send(&command);
        }
    }

    // ── Resolution ───────────────────────────────────────────────

    fn current_card(&self) -> Option<&Card> {
        self.navigator.current().and_then(|iid| self.registry.get(iid))
    }

    /// Whether `entity_id` is on the card the panel shows.
    fn shows(&self, entity_id: &str) -> bool {
        self.navigator
            .current()
            .is_some_and(|iid| self.index.affects(entity_id, iid))
    }

    fn default_card(&self) -> ShortId {
        self.registry.default_card(self.config.default_card.as_deref())
    }

    /// Resolve a button target. Short-id tokens resolve on the current
    /// card only; plain entity ids must exist in the store.
    fn resolve_target(&self, target: &str) -> Option<Target> {
        let card = self.current_card();
        if target.starts_with("iid.") {
            let entity = card.and_then(|c| c.entity_by_token(target));
            if entity.is_none() {
                debug!(panel = %self.config.name, target, "short id not on current card");
            }
            return entity.map(Target::from);
        }

        if let Some(entity) = card.and_then(|c| c.entity_by_id(target)) {
            return Some(Target::from(entity));
        }
        if target.starts_with(NAVIGATE_PREFIX) || self.store.exists(target) {
            return Some(Target {
                entity_id: target.to_owned(),
                effect_list: None,
            });
        }
        debug!(panel = %self.config.name, target, "button target not found");
        None
    }

    // ── Output ───────────────────────────────────────────────────

    fn send(&self, command: &PanelCommand) {
        self.bus
            .publish(&self.config.panel_send_topic, command.to_string());
    }

    /// Apply a transition: page switch plus sleep timeout when it changes.
    /// Card content follows on the panel's `renderCurrentPage`.
    fn switch_page(&mut self, transition: Transition) {
        let Some(iid) = transition.switched() else {
            return;
        };
        let Some(card) = self.registry.get(iid) else {
            warn!(panel = %self.config.name, %iid, "switched to an unknown card");
            return;
        };
        let page = card.page_type();
        let timeout = card.sleep_timeout.unwrap_or(self.config.sleep_timeout);
        info!(panel = %self.config.name, card = card.label(), page, "switching page");

        self.send(&PanelCommand::page_type(page));
        self.rendered = None;
        self.open_detail = None;
        if self.timeout != Some(timeout) {
            self.send(&PanelCommand::Timeout(timeout));
            self.timeout = Some(timeout);
        }
    }

    /// Send the current card's content. Unforced renders are skipped
    /// when the content matches what the panel already shows.
    fn render_current(&mut self, force: bool) {
        let Some(iid) = self.navigator.requested_rerender() else {
            debug!(panel = %self.config.name, "render requested with no card shown");
            return;
        };
        let Some(card) = self.registry.get(iid) else {
            return;
        };
        let commands = Renderer::new(self.store.as_ref(), &self.icons).card(card);

        let unchanged = self
            .rendered
            .as_ref()
            .is_some_and(|(last, sent)| *last == iid && *sent == commands);
        if unchanged && !force {
            debug!(panel = %self.config.name, %iid, "card unchanged, render skipped");
            return;
        }
        for command in &commands {
            self.send(command);
        }
        self.rendered = Some((iid, commands));
    }

    /// Refresh every popup that can show `entity_id`, in case one is open.
    fn refresh_details(&self, entity_id: &str) {
        let Some(entity) = self.current_card().and_then(|c| c.entity_by_id(entity_id)) else {
            return;
        };
        let renderer = Renderer::new(self.store.as_ref(), &self.icons);
        for kind in DetailKind::for_domain(domain_of(entity_id)) {
            if let Some(command) = renderer.detail(*kind, entity) {
                self.send(&command);
            }
        }
    }

    fn send_dim_mode(&self) {
        let mode = dim_mode(&self.config, self.store.as_ref());
        debug!(panel = %self.config.name, dim = mode.dim, normal = mode.dim_normal, "dim mode");
        self.send(&PanelCommand::DimMode(mode));
    }

    fn send_time(&self) {
        let now = self.clock.now();
        self.send(&PanelCommand::Time(format_at(now, &self.config.time_format)));
    }

    fn send_date(&self) {
        let now = self.clock.now();
        self.send(&PanelCommand::Date(format_at(now, &self.config.date_format)));
    }
}

fn format_at(now: NaiveDateTime, format: &str) -> String {
    now.format(format).to_string()
}

/// Reject strftime strings chrono cannot render.
fn validate_format(field: &str, format: &str) -> Result<(), CoreError> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(CoreError::Config {
            message: format!("{field}: invalid format string {format:?}"),
        });
    }
    Ok(())
}
