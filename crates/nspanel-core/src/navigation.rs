// ── Navigation state machine ──
//
// Tracks the card on screen and the back stack. Every transition returns
// the resulting `Transition` so the session knows whether a page switch
// must go out. The screensaver never enters the history: leaving it is
// always a pop or a reset, and entering it pushes the prior card once.

use crate::model::{Card, CardKind, CardRegistry, ShortId};

/// Where the navigator is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    /// No card shown yet (before the panel's first startup).
    Idle,
    Showing(ShortId),
    /// An unlock card is shown; a correct PIN opens `target`.
    AwaitingUnlock { card: ShortId, target: ShortId },
}

/// Outcome of a navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The current card changed; a page switch is required.
    Switched(ShortId),
    /// Nothing changed.
    Unchanged,
}

impl Transition {
    pub fn switched(self) -> Option<ShortId> {
        match self {
            Self::Switched(iid) => Some(iid),
            Self::Unchanged => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Navigator {
    current: Option<ShortId>,
    history: Vec<ShortId>,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<ShortId> {
        self.current
    }

    pub fn history(&self) -> &[ShortId] {
        &self.history
    }

    pub fn state(&self, registry: &CardRegistry) -> NavState {
        let Some(iid) = self.current else {
            return NavState::Idle;
        };
        let target = registry
            .get(iid)
            .filter(|c| c.kind == CardKind::Unlock)
            .and_then(|c| c.destination.as_deref())
            .and_then(|dest| registry.search(dest))
            .map(|c| c.iid);
        match target {
            Some(target) => NavState::AwaitingUnlock { card: iid, target },
            None => NavState::Showing(iid),
        }
    }

    /// Show `card`, pushing the current card unless it is the screensaver.
    pub fn open(&mut self, registry: &CardRegistry, card: ShortId) -> Transition {
        if let Some(current) = self.current {
            if !registry.is_screensaver(current) {
                self.history.push(current);
            }
        }
        self.current = Some(card);
        Transition::Switched(card)
    }

    /// Resolve `key` (navigation key or short id) and open it.
    pub fn open_key(&mut self, registry: &CardRegistry, key: &str) -> Transition {
        match registry.search(key) {
            Some(card) => self.open(registry, card.iid),
            None => {
                tracing::warn!(key, "navigation target not found");
                Transition::Unchanged
            }
        }
    }

    /// The panel asked for the shown card again. Never changes state.
    pub fn requested_rerender(&self) -> Option<ShortId> {
        self.current
    }

    /// Pop the history, falling back to `default` when it is empty.
    pub fn back(&mut self, default: ShortId) -> Transition {
        let target = self.history.pop().unwrap_or(default);
        self.current = Some(target);
        Transition::Switched(target)
    }

    /// Enter the screensaver. Repeated sleeps while asleep do nothing.
    pub fn sleep(&mut self, registry: &CardRegistry) -> Transition {
        let screensaver = registry.screensaver().iid;
        match self.current {
            Some(current) if current == screensaver => Transition::Unchanged,
            Some(current) => {
                self.history.push(current);
                self.current = Some(screensaver);
                Transition::Switched(screensaver)
            }
            None => {
                self.current = Some(screensaver);
                Transition::Switched(screensaver)
            }
        }
    }

    /// Show the screensaver after a panel boot, keeping the history.
    pub fn show_screensaver(&mut self, registry: &CardRegistry) -> Transition {
        let screensaver = registry.screensaver().iid;
        self.current = Some(screensaver);
        Transition::Switched(screensaver)
    }

    /// Leave the screensaver for the configured default card. The history
    /// is cleared, so `back` from there falls back to the same card.
    pub fn wake_to_default(&mut self, default: ShortId) -> Transition {
        self.history.clear();
        self.current = Some(default);
        Transition::Switched(default)
    }

    /// Swipe to the next visible sibling. Does not touch the history.
    pub fn next(&mut self, registry: &CardRegistry) -> Transition {
        self.swipe(registry, |c| c.next)
    }

    /// Swipe to the previous visible sibling. Does not touch the history.
    pub fn prev(&mut self, registry: &CardRegistry) -> Transition {
        self.swipe(registry, |c| c.prev)
    }

    fn swipe(&mut self, registry: &CardRegistry, pick: impl Fn(&Card) -> Option<ShortId>) -> Transition {
        let Some(sibling) = self.current.and_then(|iid| registry.get(iid)).and_then(pick) else {
            return Transition::Unchanged;
        };
        self.current = Some(sibling);
        Transition::Switched(sibling)
    }

    /// Check a PIN against the current unlock card. A match opens the
    /// target; anything else leaves the state untouched.
    pub fn unlock_attempt(&mut self, registry: &CardRegistry, target: &str, pin: &str) -> Transition {
        let Some(card) = self.current.and_then(|iid| registry.get(iid)) else {
            tracing::debug!("unlock attempt with no card shown");
            return Transition::Unchanged;
        };
        let Some(expected) = card.pin.as_deref() else {
            tracing::warn!(card = card.label(), "unlock attempt on a card without a PIN");
            return Transition::Unchanged;
        };
        if !pin_matches(expected, pin) {
            tracing::info!(card = card.label(), "wrong PIN entered");
            return Transition::Unchanged;
        }
        self.open_key(registry, target)
    }
}

/// Numeric PINs compare by value (`0042` == `42`), anything else verbatim.
fn pin_matches(expected: &str, entered: &str) -> bool {
    match (expected.trim().parse::<u64>(), entered.trim().parse::<u64>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => expected == entered,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{CardConfig, PanelConfig};
    use crate::model::IidAllocator;

    fn card(card_type: &str, key: &str) -> CardConfig {
        CardConfig {
            card_type: card_type.into(),
            heading: None,
            entities: Vec::new(),
            key: Some(key.into()),
            sleep_timeout: None,
            pin: None,
            destination: None,
        }
    }

    fn registry() -> CardRegistry {
        let yaml = "name: t\npanelRecvTopic: r\npanelSendTopic: s\n";
        let mut cfg: PanelConfig = serde_yaml::from_str(yaml).unwrap();
        let mut lock = card("cardUnlock", "lock");
        lock.pin = Some("1234".into());
        lock.destination = Some("vault".into());
        cfg.cards = vec![card("cardEntities", "a"), card("cardGrid", "b"), lock];
        cfg.hidden_cards = vec![card("cardEntities", "vault")];
        CardRegistry::from_panel(&cfg, &IidAllocator::new()).unwrap()
    }

    fn id(reg: &CardRegistry, key: &str) -> ShortId {
        reg.search(key).unwrap().iid
    }

    #[test]
    fn back_restores_lifo_order() {
        let reg = registry();
        let mut nav = Navigator::new();
        let (a, b, vault) = (id(&reg, "a"), id(&reg, "b"), id(&reg, "vault"));

        nav.open(&reg, a);
        nav.open(&reg, b);
        nav.open(&reg, vault);
        assert_eq!(nav.back(a), Transition::Switched(b));
        assert_eq!(nav.back(a), Transition::Switched(a));
        // Empty history falls back to the default.
        assert_eq!(nav.back(b), Transition::Switched(b));
        assert!(nav.history().is_empty());
    }

    #[test]
    fn screensaver_is_pushed_at_most_once() {
        let reg = registry();
        let mut nav = Navigator::new();
        let a = id(&reg, "a");
        nav.open(&reg, a);

        assert!(nav.sleep(&reg).switched().is_some());
        assert_eq!(nav.sleep(&reg), Transition::Unchanged);
        assert_eq!(nav.history(), [a]);

        // Navigating away from the screensaver does not push it.
        nav.open(&reg, id(&reg, "b"));
        assert_eq!(nav.history(), [a]);
        let screensaver = reg.screensaver().iid;
        assert!(!nav.history().contains(&screensaver));
    }

    #[test]
    fn wake_resets_history_to_default() {
        let reg = registry();
        let mut nav = Navigator::new();
        nav.open(&reg, id(&reg, "a"));
        nav.open(&reg, id(&reg, "b"));
        nav.sleep(&reg);

        let vault = id(&reg, "vault");
        nav.wake_to_default(vault);
        assert_eq!(nav.current(), Some(vault));
        assert!(nav.history().is_empty());
    }

    #[test]
    fn swipe_follows_siblings_without_history() {
        let reg = registry();
        let mut nav = Navigator::new();
        let a = id(&reg, "a");
        nav.open(&reg, a);
        assert_eq!(nav.next(&reg), Transition::Switched(id(&reg, "b")));
        assert_eq!(nav.prev(&reg), Transition::Switched(a));
        assert_eq!(nav.prev(&reg), Transition::Switched(id(&reg, "lock")));
        assert!(nav.history().is_empty());

        // Hidden cards have no siblings.
        nav.open(&reg, id(&reg, "vault"));
        assert_eq!(nav.next(&reg), Transition::Unchanged);
    }

    #[test]
    fn unlock_requires_matching_pin() {
        let reg = registry();
        let mut nav = Navigator::new();
        let lock = id(&reg, "lock");
        let vault = id(&reg, "vault");
        nav.open(&reg, lock);
        assert_eq!(
            nav.state(&reg),
            NavState::AwaitingUnlock { card: lock, target: vault }
        );

        assert_eq!(nav.unlock_attempt(&reg, "vault", "9999"), Transition::Unchanged);
        assert_eq!(nav.current(), Some(lock));

        assert_eq!(nav.unlock_attempt(&reg, "vault", "1234"), Transition::Switched(vault));
        assert_eq!(nav.history(), [lock]);
        assert_eq!(nav.state(&reg), NavState::Showing(vault));
    }

    #[test]
    fn pin_comparison() {
        assert!(pin_matches("0042", "42"));
        assert!(pin_matches("abc", "abc"));
        assert!(!pin_matches("1234", "abcd"));
    }

    #[test]
    fn idle_until_first_card() {
        let reg = registry();
        let mut nav = Navigator::new();
        assert_eq!(nav.state(&reg), NavState::Idle);
        assert_eq!(nav.requested_rerender(), None);
        nav.sleep(&reg);
        assert!(nav.history().is_empty());
        assert_eq!(nav.current(), Some(reg.screensaver().iid));
        assert_eq!(nav.requested_rerender(), nav.current());
    }
}
