use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use dashmap::DashMap;
use timehook_core::SchedulerConfig;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, warn};

use crate::{
    engine::{EntryId, TriggerEngine},
    error::{Result, SchedulerError},
    job::{TaskJob, TaskView},
    schedule::{derive_expression, parse_timestamp},
};

/// Owns the live set of one-shot notification jobs.
///
/// Every job is either pending (armed in the engine and present in the
/// live map) or gone from both. Removal always disarms the trigger first,
/// then drops the bookkeeping, so a job never fires again after it was
/// reaped or removed.
pub struct TaskManager {
    engine: TriggerEngine,
    tasks: DashMap<EntryId, Arc<TaskJob>>,
    client: reqwest::Client,
    tz: FixedOffset,
    finished_tx: mpsc::UnboundedSender<EntryId>,
    /// Taken by the single control loop in [`TaskManager::start`].
    finished_rx: Mutex<Option<mpsc::UnboundedReceiver<EntryId>>>,
    stop_tx: watch::Sender<bool>,
    running: AtomicBool,
}

impl TaskManager {
    pub fn new(config: &SchedulerConfig) -> Result<Self> {
        let tz = config.timezone().ok_or_else(|| {
            SchedulerError::Setup(format!(
                "utc_offset_hours out of range: {}",
                config.utc_offset_hours
            ))
        })?;
        if config.notify_timeout_secs == 0 {
            return Err(SchedulerError::Setup(
                "notify_timeout_secs must be positive".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.notify_timeout_secs))
            .build()
            .map_err(|e| SchedulerError::Setup(format!("http client: {e}")))?;
        let engine = TriggerEngine::new(tz, Duration::from_millis(config.tick_interval_ms));
        let (finished_tx, finished_rx) = mpsc::unbounded_channel();
        let (stop_tx, _) = watch::channel(false);

        Ok(Self {
            engine,
            tasks: DashMap::new(),
            client,
            tz,
            finished_tx,
            finished_rx: Mutex::new(Some(finished_rx)),
            stop_tx,
            running: AtomicBool::new(false),
        })
    }

    /// Schedule a GET to `notify_url` at `time_str` (`YYYYMMDD HH:MM:SS`).
    ///
    /// A timestamp already past this year fires on the same date next year.
    pub fn add_task(&self, notify_url: &str, param: &str, time_str: &str) -> Result<EntryId> {
        let at = parse_timestamp(time_str, self.tz).inspect_err(|e| {
            warn!(url = %notify_url, error = %e, "rejected task");
        })?;
        let expr = derive_expression(&at);

        // Book-keep inside the factory: the job is in the live map before
        // the engine can fire it, so its completion always finds it.
        let id = self
            .engine
            .register(&expr, |id| {
                let job = Arc::new(TaskJob::new(
                    id,
                    notify_url,
                    param,
                    time_str,
                    self.client.clone(),
                    self.finished_tx.clone(),
                ));
                self.tasks.insert(id, Arc::clone(&job));
                job
            })
            .inspect_err(|e| {
                warn!(url = %notify_url, %expr, error = %e, "trigger registration failed");
            })?;

        // A stop() that ran while registering may have snapshotted the live
        // map before this job landed in it.
        if self.engine.is_stopped() {
            self.remove_task(id);
            warn!(url = %notify_url, "task manager stopped during registration");
            return Err(SchedulerError::Scheduling(
                "task manager is stopped".to_string(),
            ));
        }

        info!(
            task_id = %id,
            url = %notify_url,
            param = %param,
            time = %time_str,
            %expr,
            "task added"
        );
        if let Some(next) = self.engine.next_fire(id) {
            info!(task_id = %id, "task will run at {next}");
        }
        Ok(id)
    }

    /// Disarm and forget `id`. Absent handles are a no-op.
    pub fn remove_task(&self, id: EntryId) {
        let disarmed = self.engine.unregister(id);
        if self.tasks.remove(&id).is_some() {
            info!(task_id = %id, disarmed, "task removed");
        }
    }

    pub fn task_exists(&self, id: EntryId) -> bool {
        self.tasks.contains_key(&id)
    }

    /// Point-in-time copy of the live set. Later mutations are not reflected.
    pub fn get_tasks(&self) -> HashMap<EntryId, Arc<TaskJob>> {
        self.tasks
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect()
    }

    /// Listing views sorted by handle.
    pub fn views(&self) -> Vec<TaskView> {
        let mut views: Vec<TaskView> = self
            .get_tasks()
            .values()
            .map(|job| job.view(self.next_run(job.id()).map(|t| t.to_rfc3339())))
            .collect();
        views.sort_by_key(|v| v.id);
        views
    }

    /// When `id` is next due, if it is still armed.
    pub fn next_run(&self, id: EntryId) -> Option<DateTime<FixedOffset>> {
        self.engine.next_fire(id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the trigger engine, then reap completed jobs until [`stop`].
    ///
    /// Blocks for the manager's lifetime; spawn it on its own task. Only the
    /// first call does anything.
    ///
    /// [`stop`]: TaskManager::stop
    pub async fn start(&self) {
        let Some(mut finished) = self.finished_rx.lock().await.take() else {
            warn!("task manager already started");
            return;
        };
        let mut stop = self.stop_tx.subscribe();
        if *stop.borrow() {
            warn!("task manager was stopped before it started");
            return;
        }

        self.engine.start();
        self.running.store(true, Ordering::SeqCst);
        info!("task manager running");

        loop {
            tokio::select! {
                Some(id) = finished.recv() => self.reap(id),
                res = stop.changed() => {
                    if res.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("task manager stopped");
    }

    /// Halt the engine, drop every live job and end the control loop.
    ///
    /// Triggers that have not started by now are discarded. A notification
    /// already in flight still completes; its completion signal is ignored.
    pub fn stop(&self) {
        self.engine.stop_all();
        let ids: Vec<EntryId> = self.tasks.iter().map(|entry| *entry.key()).collect();
        let removed = ids.len();
        for id in ids {
            self.remove_task(id);
        }
        self.stop_tx.send_replace(true);
        info!(removed, "task manager stopping");
    }

    fn reap(&self, id: EntryId) {
        if self.task_exists(id) {
            debug!(task_id = %id, "reaping completed task");
        }
        self.remove_task(id);
    }
}
