//! Monitoring process control port.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Start/stop contract for the background monitoring process.
///
/// # Invariants
/// - `is_monitoring_running` reflects actual liveness, not last requested intent.
/// - `start_monitoring` on a live process and `stop_monitoring` on a dead one
///   are no-ops.
pub trait ProcessControl: Send + Sync {
    /// Returns `Ok(true)` when a new process was launched.
    fn start_monitoring(&self) -> Result<bool, MonitorError>;
    /// Returns `true` when a live process was asked to stop.
    fn stop_monitoring(&self) -> bool;
    fn is_monitoring_running(&self) -> bool;
}

/// Failures raised while launching the monitoring process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    /// No async runtime is available to host the background task.
    RuntimeUnavailable(String),
    /// Internal state lock was poisoned by a panicking holder.
    StatePoisoned,
}

impl Display for MonitorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RuntimeUnavailable(message) => {
                write!(f, "monitoring runtime unavailable: {message}")
            }
            Self::StatePoisoned => write!(f, "monitoring state lock poisoned"),
        }
    }
}

impl Error for MonitorError {}
