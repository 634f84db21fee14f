//! `timehook-core` — configuration and error types shared by the scheduler
//! and the HTTP gateway.

pub mod config;
pub mod error;

pub use config::{GatewayConfig, SchedulerConfig, TimehookConfig};
pub use error::{Result, TimehookError};
