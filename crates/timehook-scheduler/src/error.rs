use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The supplied date-time string does not match `YYYYMMDD HH:MM:SS`.
    #[error("Invalid timestamp {input:?}: {reason}")]
    InvalidTimestamp { input: String, reason: String },

    /// The trigger engine rejected the derived schedule expression.
    #[error("Scheduling error: {0}")]
    Scheduling(String),

    /// The outbound GET failed or returned a non-2xx status.
    /// Only ever logged; never returned to an `add_task` caller.
    #[error("Notification failed: {0}")]
    Notification(String),

    /// The manager could not be built from its configuration.
    #[error("Setup error: {0}")]
    Setup(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
