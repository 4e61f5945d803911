//! Background monitoring process supervisor.
//!
//! # Responsibility
//! - Launch and cancel the long-lived monitoring task.
//! - Inside the task: re-check permissions, show the status indicator,
//!   subscribe to fixes and evaluate each fix as its own unit of work.
//! - Record start failures as a one-shot passive failure state.
//!
//! # Invariants
//! - Liveness is one process-wide `AtomicBool`; every start/stop decision
//!   flips it with a compare-exchange while holding the slot lock, so two
//!   starts cannot both win and a stop cannot race a start.
//! - The task clears liveness itself when it exits for any reason, but only
//!   if no newer run has been started since.
//! - After cancellation, no new fix is accepted and in-flight fix tasks are
//!   aborted.

use crate::port::location::{FixRequest, FixSource, FixSourceError};
use crate::port::notification::Notifier;
use crate::port::permission::PermissionProvider;
use crate::port::process::{MonitorError, ProcessControl};
use crate::service::proximity::ProximityEvaluator;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

/// Why a monitoring run ended without ever processing fixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorFailure {
    FixSource(FixSourceError),
}

impl Display for MonitorFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FixSource(err) => write!(f, "could not subscribe to position fixes: {err}"),
        }
    }
}

impl Error for MonitorFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::FixSource(err) => Some(err),
        }
    }
}

/// Collaborators the monitoring task runs against.
pub struct MonitorDeps {
    pub evaluator: Arc<ProximityEvaluator>,
    pub fix_source: Arc<dyn FixSource>,
    pub permissions: Arc<dyn PermissionProvider>,
    pub notifier: Arc<dyn Notifier>,
    pub request: FixRequest,
}

struct RunningMonitor {
    generation: u64,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Slot {
    /// Generation of the most recently started run.
    generation: u64,
    current: Option<RunningMonitor>,
}

struct Shared {
    running: AtomicBool,
    slot: Mutex<Slot>,
    liveness: watch::Sender<bool>,
    failure: Mutex<Option<MonitorFailure>>,
    deps: MonitorDeps,
}

/// `ProcessControl` implementation backed by a tokio task.
#[derive(Clone)]
pub struct MonitorSupervisor {
    shared: Arc<Shared>,
}

impl MonitorSupervisor {
    pub fn new(deps: MonitorDeps) -> Self {
        let (liveness, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                running: AtomicBool::new(false),
                slot: Mutex::new(Slot::default()),
                liveness,
                failure: Mutex::new(None),
                deps,
            }),
        }
    }

    /// Returns the last start failure once; later calls return `None`.
    pub fn take_failure(&self) -> Option<MonitorFailure> {
        self.shared
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Cancels the current run and waits for its task to finish teardown.
    ///
    /// Returns `false` when nothing was running.
    pub async fn stop_and_wait(&self) -> bool {
        let task = {
            let mut slot = self.shared.lock_slot();
            if !self.shared.try_mark_stopped() {
                return false;
            }
            slot.current.take().and_then(|mut current| {
                current.cancel.cancel();
                current.task.take()
            })
        };

        if let Some(task) = task {
            if let Err(err) = task.await {
                if err.is_panic() {
                    error!("event=monitor_stop module=monitor status=error error_code=task_panicked");
                }
            }
        }
        true
    }

    /// Resolves once the monitoring process is no longer live.
    pub async fn wait_until_stopped(&self) {
        let mut liveness = self.shared.liveness.subscribe();
        // Sender lives in `self.shared`, so the channel cannot close here.
        let _ = liveness.wait_for(|running| !*running).await;
    }
}

impl ProcessControl for MonitorSupervisor {
    fn start_monitoring(&self) -> Result<bool, MonitorError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|err| MonitorError::RuntimeUnavailable(err.to_string()))?;

        let mut slot = self
            .shared
            .slot
            .lock()
            .map_err(|_| MonitorError::StatePoisoned)?;
        if self
            .shared
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(false);
        }
        self.shared.liveness.send_replace(true);

        slot.generation += 1;
        let generation = slot.generation;
        let cancel = CancellationToken::new();
        let task = runtime.spawn(run_monitor(
            Arc::clone(&self.shared),
            generation,
            cancel.clone(),
        ));
        slot.current = Some(RunningMonitor {
            generation,
            cancel,
            task: Some(task),
        });

        info!("event=monitor_start module=monitor status=ok generation={generation}");
        Ok(true)
    }

    fn stop_monitoring(&self) -> bool {
        let mut slot = self.shared.lock_slot();
        if !self.shared.try_mark_stopped() {
            return false;
        }
        if let Some(current) = slot.current.take() {
            current.cancel.cancel();
            info!(
                "event=monitor_stop module=monitor status=ok generation={}",
                current.generation
            );
        }
        true
    }

    fn is_monitoring_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }
}

impl Shared {
    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Flips liveness from running to stopped. Caller holds the slot lock.
    fn try_mark_stopped(&self) -> bool {
        let flipped = self
            .running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if flipped {
            self.liveness.send_replace(false);
        }
        flipped
    }

    /// Teardown after a run exits. Skipped when a newer run already started.
    /// Liveness flips last, after the source and status entry are released.
    fn finish(&self, generation: u64) {
        let mut slot = self.lock_slot();
        if slot.generation != generation {
            return;
        }
        self.deps.fix_source.stop();
        self.deps.notifier.clear_monitoring_status();
        if slot
            .current
            .as_ref()
            .is_some_and(|current| current.generation == generation)
        {
            slot.current = None;
            self.try_mark_stopped();
        }
    }

    fn record_failure(&self, failure: MonitorFailure) {
        self.deps
            .notifier
            .show_monitoring_failure(&failure.to_string());
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(failure);
    }
}

async fn run_monitor(shared: Arc<Shared>, generation: u64, cancel: CancellationToken) {
    match drive(&shared.deps, &cancel).await {
        Ok(()) => {
            info!("event=monitor_run module=monitor status=ok generation={generation}");
        }
        Err(failure) => {
            error!(
                "event=monitor_run module=monitor status=error generation={generation} error={failure}"
            );
            shared.record_failure(failure);
        }
    }
    shared.finish(generation);
}

async fn drive(deps: &MonitorDeps, cancel: &CancellationToken) -> Result<(), MonitorFailure> {
    if !deps.permissions.is_all_granted() {
        warn!("event=monitor_run module=monitor status=skip reason=permissions_missing");
        return Ok(());
    }

    deps.notifier.show_monitoring_status();

    let mut fixes = tokio::select! {
        _ = cancel.cancelled() => return Ok(()),
        started = deps.fix_source.start(deps.request) => {
            started.map_err(MonitorFailure::FixSource)?
        }
    };

    let mut tasks = JoinSet::new();
    let mut source_open = true;
    loop {
        if !source_open && tasks.is_empty() {
            break;
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tasks.abort_all();
                break;
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(err) = joined {
                    if err.is_panic() {
                        error!("event=fix_task module=monitor status=error error_code=task_panicked");
                    }
                }
            }
            fix = fixes.recv(), if source_open => match fix {
                Some(fix) => {
                    let evaluator = Arc::clone(&deps.evaluator);
                    let token = cancel.clone();
                    tasks.spawn(async move {
                        evaluator.on_fix(fix, &token).await;
                    });
                }
                None => {
                    info!("event=fix_source module=monitor status=closed");
                    source_open = false;
                }
            },
        }
    }

    Ok(())
}
