use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::{Result, SchedulerError};

static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Handle for a registered trigger. Allocated from a process-wide counter,
/// so a value is never handed out twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(u64);

impl EntryId {
    fn next() -> Self {
        EntryId(NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for EntryId {
    fn from(raw: u64) -> Self {
        EntryId(raw)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Work invoked by the engine each time its schedule matches.
///
/// The engine spawns `run` on its own task and does not wait for it.
#[async_trait]
pub trait Job: Send + Sync {
    async fn run(&self);
}

struct Entry {
    expr: String,
    schedule: cron::Schedule,
    next: DateTime<FixedOffset>,
    job: Arc<dyn Job>,
}

/// Recurring, match-based trigger primitive.
///
/// Expressions use the six-field `sec min hour dom month dow` form. All
/// matching happens in the fixed zone given at construction. Cloning yields
/// another handle onto the same engine.
#[derive(Clone)]
pub struct TriggerEngine {
    inner: Arc<Inner>,
}

struct Inner {
    entries: DashMap<EntryId, Entry>,
    tz: FixedOffset,
    tick: Duration,
    started: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl TriggerEngine {
    pub fn new(tz: FixedOffset, tick: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                entries: DashMap::new(),
                tz,
                // tokio::time::interval panics on a zero period.
                tick: tick.max(Duration::from_millis(1)),
                started: AtomicBool::new(false),
                shutdown,
            }),
        }
    }

    /// Arm `expr` and return its handle.
    ///
    /// `factory` receives the handle before the entry becomes visible to the
    /// timer loop, so the job can carry its own identity and the caller can
    /// book-keep it before the first possible firing.
    pub fn register<J, F>(&self, expr: &str, factory: F) -> Result<EntryId>
    where
        J: Job + 'static,
        F: FnOnce(EntryId) -> Arc<J>,
    {
        if self.is_stopped() {
            return Err(SchedulerError::Scheduling(
                "trigger engine is stopped".to_string(),
            ));
        }

        let schedule = cron::Schedule::from_str(expr)
            .map_err(|e| SchedulerError::Scheduling(format!("{expr:?}: {e}")))?;
        let next = schedule.upcoming(self.inner.tz).next().ok_or_else(|| {
            SchedulerError::Scheduling(format!("{expr:?} has no upcoming occurrence"))
        })?;

        let id = EntryId::next();
        let job: Arc<dyn Job> = factory(id);
        self.inner.entries.insert(
            id,
            Entry {
                expr: expr.to_string(),
                schedule,
                next,
                job,
            },
        );
        debug!(entry_id = %id, %expr, %next, "trigger armed");
        Ok(id)
    }

    /// Disarm `id`. Returns false when it was not armed.
    pub fn unregister(&self, id: EntryId) -> bool {
        let removed = self.inner.entries.remove(&id).is_some();
        if removed {
            debug!(entry_id = %id, "trigger disarmed");
        }
        removed
    }

    /// Next time `id` will fire, if it is armed.
    pub fn next_fire(&self, id: EntryId) -> Option<DateTime<FixedOffset>> {
        self.inner.entries.get(&id).map(|e| e.next)
    }

    /// Expression `id` was armed with.
    pub fn expression(&self, id: EntryId) -> Option<String> {
        self.inner.entries.get(&id).map(|e| e.expr.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.shutdown.borrow()
    }

    /// Spawn the timer loop onto the current tokio runtime.
    pub fn start(&self) {
        if self.is_stopped() {
            warn!("trigger engine was stopped; not starting");
            return;
        }
        if self.inner.started.swap(true, Ordering::SeqCst) {
            warn!("trigger engine already running");
            return;
        }

        let inner = Arc::clone(&self.inner);
        let mut shutdown = self.inner.shutdown.subscribe();
        tokio::spawn(async move {
            info!(tick_ms = inner.tick.as_millis() as u64, "trigger engine started");
            let mut interval = tokio::time::interval(inner.tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        inner.fire_due(Utc::now().with_timezone(&inner.tz));
                    }
                    res = shutdown.changed() => {
                        if res.is_err() || *shutdown.borrow() {
                            info!("trigger engine shutting down");
                            break;
                        }
                    }
                }
            }
        });
    }

    /// Stop the timer loop and disarm every entry. Permanent: later
    /// registrations fail and `start` becomes a no-op.
    pub fn stop_all(&self) {
        self.inner.shutdown.send_replace(true);
        let dropped = self.inner.entries.len();
        self.inner.entries.clear();
        info!(dropped, "trigger engine stopped");
    }
}

impl Inner {
    /// Spawn every entry due at `now` and advance it to its next match.
    fn fire_due(&self, now: DateTime<FixedOffset>) {
        // A tick racing with stop_all must not start new work.
        if *self.shutdown.borrow() {
            return;
        }

        let mut exhausted = Vec::new();
        for mut entry in self.entries.iter_mut() {
            if entry.next > now {
                continue;
            }
            let id = *entry.key();
            let job = Arc::clone(&entry.job);
            debug!(entry_id = %id, scheduled = %entry.next, "trigger fired");
            tokio::spawn(async move { job.run().await });

            let upcoming = entry.schedule.after(&now).next();
            match upcoming {
                Some(next) => entry.next = next,
                None => exhausted.push(id),
            }
        }

        // Removal must wait until the iterator's shard locks are released.
        for id in exhausted {
            self.entries.remove(&id);
        }
    }
}
