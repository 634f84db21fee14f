//! `timehook-scheduler` — one-shot HTTP notifications fired at wall-clock times.
//!
//! # Overview
//!
//! A caller hands [`TaskManager::add_task`] a notify URL, an opaque parameter
//! string and a timestamp (`YYYYMMDD HH:MM:SS` in the configured zone). The
//! timestamp becomes a cron expression registered with the
//! [`engine::TriggerEngine`]; when it matches, the [`job::TaskJob`] issues a
//! single GET and reports back on the completion channel. The manager's
//! control loop then disarms the trigger and drops the job.
//!
//! # Threads of execution
//!
//! | Who              | Does what                                          |
//! |------------------|----------------------------------------------------|
//! | engine tick loop | fires due entries, each on its own tokio task      |
//! | control loop     | reaps completed jobs until `stop()`                |
//! | callers          | add / remove / list, concurrently with the above   |

pub mod engine;
pub mod error;
pub mod job;
pub mod manager;
pub mod schedule;

pub use engine::{EntryId, Job, TriggerEngine};
pub use error::{Result, SchedulerError};
pub use job::{TaskJob, TaskView};
pub use manager::TaskManager;
