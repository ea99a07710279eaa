// ── Panel actor ──
//
// One task per panel owns its `PanelSession`. Panel messages, entity
// state-change notices and scheduler jobs all arrive on a single ordered
// queue, so every transition happens inside the actor and nothing else
// ever touches the navigation state.

use std::collections::HashSet;
use std::sync::Arc;

use strum::IntoEnumIterator;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::scheduler::{Clock, Scheduler, SystemClock};
use crate::session::{JobKind, PanelSession, SessionSnapshot};

const INPUT_CHANNEL_SIZE: usize = 256;

/// Everything the actor reacts to.
#[derive(Debug)]
pub enum PanelInput {
    /// Raw payload from the panel's receive topic.
    Message(String),
    /// An entity this panel watches changed state.
    StateChanged(String),
    /// The state store was reloaded; resend what is on screen.
    Refresh,
    Job(JobKind),
    Snapshot(oneshot::Sender<SessionSnapshot>),
}

// ── Panel ────────────────────────────────────────────────────────

/// Handle to a running panel. Cheaply cloneable.
#[derive(Clone)]
pub struct Panel {
    inner: Arc<PanelInner>,
}

struct PanelInner {
    name: String,
    recv_topic: String,
    watched: HashSet<String>,
    input_tx: mpsc::Sender<PanelInput>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Panel {
    /// Start the actor and the time/date scheduler for `session`.
    ///
    /// Must be called inside a Tokio runtime. `cancel` stops both tasks.
    pub fn spawn(session: PanelSession, cancel: CancellationToken) -> Self {
        Self::spawn_with_clock(session, SystemClock, cancel)
    }

    pub fn spawn_with_clock(
        session: PanelSession,
        clock: impl Clock + 'static,
        cancel: CancellationToken,
    ) -> Self {
        let (input_tx, input_rx) = mpsc::channel(INPUT_CHANNEL_SIZE);
        let name = session.name().to_owned();
        let recv_topic = session.config().panel_recv_topic.clone();
        let watched: HashSet<String> = session.watched_entities().into_iter().collect();

        let mut scheduler = Scheduler::new();
        let now = clock.now();
        for job in JobKind::iter() {
            let tx = input_tx.clone();
            scheduler.add(job.as_ref(), job.recurrence(), now, move || {
                tx.try_send(PanelInput::Job(job))
                    .map_err(|e| CoreError::Internal(format!("panel queue rejected {job:?}: {e}")))
            });
        }

        session.announce();
        info!(panel = %name, topic = %recv_topic, watched = watched.len(), "panel started");

        let actor = tokio::spawn(actor_task(session, input_rx, cancel.clone()));
        let timer = tokio::spawn(scheduler.run(clock, cancel.clone()));

        Self {
            inner: Arc::new(PanelInner {
                name,
                recv_topic,
                watched,
                input_tx,
                cancel,
                task_handles: Mutex::new(vec![actor, timer]),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Topic the panel publishes its events on.
    pub fn recv_topic(&self) -> &str {
        &self.inner.recv_topic
    }

    /// Whether a change to `entity_id` can affect this panel.
    pub fn watches(&self, entity_id: &str) -> bool {
        self.inner.watched.contains(entity_id)
    }

    // ── Inputs ───────────────────────────────────────────────────

    pub async fn send(&self, input: PanelInput) -> Result<(), CoreError> {
        self.inner
            .input_tx
            .send(input)
            .await
            .map_err(|_| CoreError::Internal(format!("panel '{}' has stopped", self.inner.name)))
    }

    pub async fn message(&self, payload: impl Into<String>) -> Result<(), CoreError> {
        self.send(PanelInput::Message(payload.into())).await
    }

    /// Forward a state change. Entities the panel does not watch are
    /// dropped before they reach the queue.
    pub async fn state_changed(&self, entity_id: &str) -> Result<(), CoreError> {
        if !self.watches(entity_id) {
            return Ok(());
        }
        self.send(PanelInput::StateChanged(entity_id.to_owned())).await
    }

    pub async fn refresh(&self) -> Result<(), CoreError> {
        self.send(PanelInput::Refresh).await
    }

    /// Navigation state after every input queued so far.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, CoreError> {
        let (tx, rx) = oneshot::channel();
        self.send(PanelInput::Snapshot(tx)).await?;
        rx.await
            .map_err(|_| CoreError::Internal(format!("panel '{}' dropped the snapshot", self.inner.name)))
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Cancel the actor and scheduler and wait for both to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let handles: Vec<_> = self.inner.task_handles.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(panel = %self.inner.name, error = %e, "panel task ended abnormally");
            }
        }
        debug!(panel = %self.inner.name, "panel stopped");
    }
}

// ── Actor ────────────────────────────────────────────────────────

async fn actor_task(
    mut session: PanelSession,
    mut rx: mpsc::Receiver<PanelInput>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            input = rx.recv() => {
                let Some(input) = input else { break };
                apply(&mut session, input);
            }
        }
    }
}

fn apply(session: &mut PanelSession, input: PanelInput) {
    match input {
        PanelInput::Message(payload) => session.handle_payload(&payload),
        PanelInput::StateChanged(entity_id) => session.handle_state_change(&entity_id),
        PanelInput::Refresh => session.refresh(),
        PanelInput::Job(job) => session.run_job(job),
        PanelInput::Snapshot(reply) => {
            let _ = reply.send(session.snapshot());
        }
    }
}
