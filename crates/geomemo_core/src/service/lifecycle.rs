//! Monitoring lifecycle controller.
//!
//! # Responsibility
//! - Decide whether the monitoring process should run, from two inputs:
//!   "an open memo with a location exists" and "all permissions granted".
//! - Issue start/stop commands and permission prompts for those decisions.
//! - Surface a failed start once through the notifier's failure entry.
//! - React continuously to store changes and on demand at boot and resume.
//!
//! # Invariants
//! - The current state is reconciled with real process liveness before every
//!   decision, so a crashed process is restarted and a stray one is stopped.
//! - Start is only issued when the process is not live; stop only when it is.
//! - Permissions are queried on every recomputation, never cached.
//! - Revoking permissions while running does not stop the process.
//! - Recomputations are serialized; each one is applied fully or not at all.

use crate::port::notification::Notifier;
use crate::port::permission::{PermissionPrompt, PermissionProvider};
use crate::port::process::{MonitorError, ProcessControl};
use crate::store::{MemoStore, StoreError};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// No open memo with a location; nothing runs, nothing is prompted.
    Idle,
    /// Monitoring is needed but grants are missing.
    NeedsPermission,
    /// The monitoring process is live.
    Running,
}

/// Side effect attached to a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleCommand {
    Start,
    Stop,
    RequestPermissions,
}

/// Outcome of one pure evaluation of the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitoringDecision {
    pub next: MonitorState,
    pub command: Option<LifecycleCommand>,
}

/// What caused a recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputeTrigger {
    StoreChange,
    Boot,
    Resume,
}

impl RecomputeTrigger {
    fn as_str(self) -> &'static str {
        match self {
            Self::StoreChange => "store_change",
            Self::Boot => "boot",
            Self::Resume => "resume",
        }
    }
}

/// Transition table for the monitoring state machine.
pub fn decide(current: MonitorState, exists: bool, granted: bool) -> MonitoringDecision {
    use LifecycleCommand::{RequestPermissions, Start, Stop};
    use MonitorState::{Idle, NeedsPermission, Running};

    let (next, command) = match (current, exists, granted) {
        (Running, false, _) => (Idle, Some(Stop)),
        (_, false, _) => (Idle, None),
        (Running, true, _) => (Running, None),
        (_, true, true) => (Running, Some(Start)),
        (Idle, true, false) => (NeedsPermission, Some(RequestPermissions)),
        (NeedsPermission, true, false) => (NeedsPermission, None),
    };
    MonitoringDecision { next, command }
}

/// Lifecycle controller failures. None of them are fatal to the caller.
#[derive(Debug)]
pub enum LifecycleError {
    Store(StoreError),
    Start(MonitorError),
}

impl Display for LifecycleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "could not read monitoring signal: {err}"),
            Self::Start(err) => write!(f, "could not start monitoring: {err}"),
        }
    }
}

impl Error for LifecycleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Start(err) => Some(err),
        }
    }
}

impl From<StoreError> for LifecycleError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<MonitorError> for LifecycleError {
    fn from(value: MonitorError) -> Self {
        Self::Start(value)
    }
}

/// Drives the monitoring process from store and permission state.
pub struct LifecycleController {
    store: Arc<dyn MemoStore>,
    permissions: Arc<dyn PermissionProvider>,
    prompt: Arc<dyn PermissionPrompt>,
    process: Arc<dyn ProcessControl>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<MonitorState>,
}

impl LifecycleController {
    pub fn new(
        store: Arc<dyn MemoStore>,
        permissions: Arc<dyn PermissionProvider>,
        prompt: Arc<dyn PermissionPrompt>,
        process: Arc<dyn ProcessControl>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            permissions,
            prompt,
            process,
            notifier,
            state: Mutex::new(MonitorState::Idle),
        }
    }

    /// Last applied state.
    pub async fn state(&self) -> MonitorState {
        *self.state.lock().await
    }

    /// One-shot recomputation for device startup.
    pub async fn on_boot_completed(&self) -> Result<MonitorState, LifecycleError> {
        self.recompute(RecomputeTrigger::Boot).await
    }

    /// One-shot recomputation when the app returns to the foreground.
    ///
    /// Unlike store-driven recomputation, this re-surfaces the permission
    /// prompt while grants are still missing: the user is present.
    pub async fn on_app_resumed(&self) -> Result<MonitorState, LifecycleError> {
        self.recompute(RecomputeTrigger::Resume).await
    }

    /// Reads the monitoring signal from the store and applies it.
    pub async fn recompute(
        &self,
        trigger: RecomputeTrigger,
    ) -> Result<MonitorState, LifecycleError> {
        let mut state = self.state.lock().await;
        let exists = self.store.has_open_with_location().await?;
        self.apply_locked(&mut state, exists, trigger)
    }

    /// Applies an already known monitoring signal.
    pub async fn apply(
        &self,
        exists: bool,
        trigger: RecomputeTrigger,
    ) -> Result<MonitorState, LifecycleError> {
        let mut state = self.state.lock().await;
        self.apply_locked(&mut state, exists, trigger)
    }

    fn apply_locked(
        &self,
        state: &mut MonitorState,
        exists: bool,
        trigger: RecomputeTrigger,
    ) -> Result<MonitorState, LifecycleError> {
        let live = self.process.is_monitoring_running();
        let current = match (*state, live) {
            (_, true) => MonitorState::Running,
            (MonitorState::Running, false) => MonitorState::Idle,
            (other, false) => other,
        };
        let granted = self.permissions.is_all_granted();
        let decision = decide(current, exists, granted);

        debug!(
            "event=lifecycle_decide module=lifecycle status=ok trigger={} exists={exists} granted={granted} live={live} from={:?} to={:?}",
            trigger.as_str(),
            current,
            decision.next
        );

        match decision.command {
            Some(LifecycleCommand::Start) => {
                if let Err(err) = self.process.start_monitoring() {
                    *state = current;
                    warn!(
                        "event=lifecycle_start module=lifecycle status=error trigger={} error={err}",
                        trigger.as_str()
                    );
                    self.notifier.show_monitoring_failure(&err.to_string());
                    return Err(err.into());
                }
                info!(
                    "event=lifecycle_start module=lifecycle status=ok trigger={}",
                    trigger.as_str()
                );
            }
            Some(LifecycleCommand::Stop) => {
                if self.process.stop_monitoring() {
                    info!(
                        "event=lifecycle_stop module=lifecycle status=ok trigger={}",
                        trigger.as_str()
                    );
                }
            }
            Some(LifecycleCommand::RequestPermissions) => {
                if trigger != RecomputeTrigger::Boot {
                    self.prompt.request_permissions();
                }
            }
            None => {
                if trigger == RecomputeTrigger::Resume
                    && decision.next == MonitorState::NeedsPermission
                {
                    self.prompt.request_permissions();
                }
            }
        }

        *state = decision.next;
        Ok(decision.next)
    }

    /// Follows the store's monitoring signal until cancelled.
    ///
    /// Consecutive equal values are applied once. Failures are logged and the
    /// loop keeps running.
    pub async fn observe(&self, cancel: CancellationToken) {
        let mut signal = self.store.subscribe_open_with_location();
        let mut last_applied: Option<bool> = None;
        info!("event=lifecycle_observe module=lifecycle status=start");

        loop {
            let exists = *signal.borrow_and_update();
            if last_applied != Some(exists) {
                match self.apply(exists, RecomputeTrigger::StoreChange).await {
                    Ok(_) => last_applied = Some(exists),
                    Err(err) => {
                        warn!("event=lifecycle_observe module=lifecycle status=error error={err}");
                    }
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = signal.changed() => {
                    if changed.is_err() {
                        info!("event=lifecycle_observe module=lifecycle status=closed");
                        break;
                    }
                }
            }
        }

        info!("event=lifecycle_observe module=lifecycle status=ok");
    }

    /// Spawns `observe` on the current runtime.
    pub fn spawn_observer(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move { controller.observe(cancel).await })
    }
}
