// ── Scheduler ──
//
// Wall-clock jobs on a one-second poll. Each job carries a recurrence
// and its next run time; a poll runs every due job in registration order
// and recomputes its next run from "now", so a late poll fires a job once
// instead of replaying missed slots. A job that fails or panics is logged
// and never stops the jobs after it.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use chrono::{Local, NaiveDateTime, TimeDelta, Timelike};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::CoreError;

/// Poll resolution.
pub const TICK: Duration = Duration::from_secs(1);

// ── Recurrence ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recurrence {
    /// Every minute at `second`.
    Minutely { second: u32 },
    /// Every hour at `minute:second`.
    Hourly { minute: u32, second: u32 },
    /// Every `minutes` minutes, on slots counted from the top of the hour.
    EveryMinutes { minutes: u32, second: u32 },
}

impl Recurrence {
    pub fn minutely(second: u32) -> Self {
        Self::Minutely {
            second: second.min(59),
        }
    }

    pub fn hourly(minute: u32, second: u32) -> Self {
        Self::Hourly {
            minute: minute.min(59),
            second: second.min(59),
        }
    }

    pub fn every_minutes(minutes: u32, second: u32) -> Self {
        Self::EveryMinutes {
            minutes: minutes.clamp(1, 60),
            second: second.min(59),
        }
    }

    /// First matching instant strictly after `now`.
    pub fn next_after(self, now: NaiveDateTime) -> NaiveDateTime {
        let base = now.with_nanosecond(0).unwrap_or(now);
        let (candidate, period) = match self {
            Self::Minutely { second } => (base.with_second(second), TimeDelta::minutes(1)),
            Self::Hourly { minute, second } => (
                base.with_minute(minute).and_then(|t| t.with_second(second)),
                TimeDelta::hours(1),
            ),
            Self::EveryMinutes { minutes, second } => (
                base.with_minute(base.minute() / minutes * minutes)
                    .and_then(|t| t.with_second(second)),
                TimeDelta::minutes(i64::from(minutes)),
            ),
        };
        let candidate = candidate.unwrap_or(base);
        if candidate > now {
            candidate
        } else {
            candidate + period
        }
    }
}

// ── Clock ────────────────────────────────────────────────────────

/// Source of local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

// ── Scheduler ────────────────────────────────────────────────────

type JobFn = Box<dyn FnMut() -> Result<(), CoreError> + Send>;

struct ScheduledJob {
    name: String,
    recurrence: Recurrence,
    next_run: NaiveDateTime,
    run: JobFn,
}

#[derive(Default)]
pub struct Scheduler {
    jobs: Vec<ScheduledJob>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job. Its first run is the next match after `now`.
    pub fn add<F>(&mut self, name: impl Into<String>, recurrence: Recurrence, now: NaiveDateTime, job: F)
    where
        F: FnMut() -> Result<(), CoreError> + Send + 'static,
    {
        let name = name.into();
        let next_run = recurrence.next_after(now);
        debug!(job = %name, ?recurrence, %next_run, "job scheduled");
        self.jobs.push(ScheduledJob {
            name,
            recurrence,
            next_run,
            run: Box::new(job),
        });
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn next_run(&self, name: &str) -> Option<NaiveDateTime> {
        self.jobs.iter().find(|j| j.name == name).map(|j| j.next_run)
    }

    /// Run every job due at `now`. Returns how many ran, failures included.
    pub fn tick(&mut self, now: NaiveDateTime) -> usize {
        let mut ran = 0;
        for job in self.jobs.iter_mut().filter(|j| j.next_run <= now) {
            ran += 1;
            match catch_unwind(AssertUnwindSafe(|| (job.run)())) {
                Ok(Ok(())) => debug!(job = %job.name, "job ran"),
                Ok(Err(e)) => warn!(job = %job.name, error = %e, "job failed"),
                Err(panic) => warn!(job = %job.name, reason = panic_reason(&*panic), "job panicked"),
            }
            job.next_run = job.recurrence.next_after(now);
        }
        ran
    }

    /// Poll until cancelled.
    pub async fn run(mut self, clock: impl Clock, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(TICK);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = interval.tick() => {
                    self.tick(clock.now());
                }
            }
        }
        debug!("scheduler stopped");
    }
}

fn panic_reason(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::NaiveDate;

    use super::*;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 17)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn minutely_next_run() {
        let r = Recurrence::minutely(0);
        assert_eq!(r.next_after(at(12, 30, 15)), at(12, 31, 0));
        assert_eq!(r.next_after(at(12, 30, 0)), at(12, 31, 0));
        assert_eq!(Recurrence::minutely(30).next_after(at(12, 30, 15)), at(12, 30, 30));
    }

    #[test]
    fn hourly_next_run_crosses_midnight() {
        let r = Recurrence::hourly(0, 0);
        assert_eq!(r.next_after(at(9, 59, 59)), at(10, 0, 0));
        let next = r.next_after(at(23, 10, 0));
        assert_eq!(next, at(0, 0, 0) + TimeDelta::days(1));
    }

    #[test]
    fn quarter_hour_slots() {
        let r = Recurrence::every_minutes(15, 0);
        assert_eq!(r.next_after(at(12, 30, 30)), at(12, 45, 0));
        assert_eq!(r.next_after(at(12, 45, 0)), at(13, 0, 0));
        assert_eq!(r.next_after(at(12, 59, 59)), at(13, 0, 0));
        assert_eq!(r.next_after(at(12, 0, 0)), at(12, 15, 0));
        assert_eq!(Recurrence::every_minutes(0, 0), Recurrence::every_minutes(1, 0));
    }

    #[test]
    fn quarter_hour_job_fires_once_per_slot() {
        let count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&count);
        let mut scheduler = Scheduler::new();
        scheduler.add("weather", Recurrence::every_minutes(15, 0), at(12, 40, 0), move || {
            *counter.lock().unwrap() += 1;
            Ok(())
        });

        assert_eq!(scheduler.tick(at(12, 44, 59)), 0);
        assert_eq!(scheduler.tick(at(12, 45, 0)), 1);
        assert_eq!(scheduler.tick(at(12, 45, 1)), 0);
        assert_eq!(scheduler.next_run("weather"), Some(at(13, 0, 0)));
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn due_jobs_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = Scheduler::new();
        for name in ["time", "date"] {
            let log = Arc::clone(&log);
            scheduler.add(name, Recurrence::minutely(0), at(12, 0, 30), move || {
                log.lock().unwrap().push(name);
                Ok(())
            });
        }

        assert_eq!(scheduler.tick(at(12, 0, 59)), 0);
        assert_eq!(scheduler.tick(at(12, 1, 0)), 2);
        assert_eq!(*log.lock().unwrap(), vec!["time", "date"]);
    }

    #[test]
    fn failing_and_panicking_jobs_do_not_stop_others() {
        let ran = Arc::new(Mutex::new(0));
        let mut scheduler = Scheduler::new();
        scheduler.add("fails", Recurrence::minutely(0), at(12, 0, 0), || {
            Err(CoreError::Internal("boom".into()))
        });
        scheduler.add("panics", Recurrence::minutely(0), at(12, 0, 0), || panic!("job exploded"));
        let counter = Arc::clone(&ran);
        scheduler.add("counts", Recurrence::minutely(0), at(12, 0, 0), move || {
            *counter.lock().unwrap() += 1;
            Ok(())
        });

        assert_eq!(scheduler.tick(at(12, 1, 0)), 3);
        assert_eq!(scheduler.tick(at(12, 2, 0)), 3);
        assert_eq!(*ran.lock().unwrap(), 2);
    }

    #[test]
    fn late_poll_fires_once_without_catch_up() {
        let count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&count);
        let mut scheduler = Scheduler::new();
        scheduler.add("time", Recurrence::minutely(0), at(12, 0, 0), move || {
            *counter.lock().unwrap() += 1;
            Ok(())
        });

        // Five minutes late: one run, next slot computed from now.
        assert_eq!(scheduler.tick(at(12, 5, 20)), 1);
        assert_eq!(scheduler.next_run("time"), Some(at(12, 6, 0)));
        assert_eq!(scheduler.tick(at(12, 5, 40)), 0);
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_cancel() {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(Scheduler::new().run(SystemClock, cancel.clone()));
        tokio::time::sleep(Duration::from_secs(3)).await;
        cancel.cancel();
        task.await.unwrap();
    }
}
