use async_trait::async_trait;
use geomemo_core::{
    GeoPoint, LifecycleController, LifecycleError, Memo, MemoId, MemoStore, MonitorError,
    MonitorState, NotificationBoard, NotificationEvent, PermissionPrompt, PermissionProvider,
    ProcessControl, RecomputeTrigger, StoreResult,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Store double whose monitoring signal is driven by the test.
struct SignalStore {
    signal: watch::Sender<bool>,
}

impl SignalStore {
    fn new(exists: bool) -> Self {
        Self {
            signal: watch::channel(exists).0,
        }
    }

    fn set(&self, exists: bool) {
        self.signal.send_replace(exists);
    }
}

#[async_trait]
impl MemoStore for SignalStore {
    async fn find_near(&self, _center: GeoPoint, _radius_meters: f64) -> StoreResult<Vec<Memo>> {
        Ok(Vec::new())
    }

    async fn has_open_with_location(&self) -> StoreResult<bool> {
        Ok(*self.signal.borrow())
    }

    async fn get_by_id(&self, _id: MemoId) -> StoreResult<Option<Memo>> {
        Ok(None)
    }

    fn subscribe_open_with_location(&self) -> watch::Receiver<bool> {
        self.signal.subscribe()
    }
}

struct SwitchablePermissions {
    granted: AtomicBool,
}

impl SwitchablePermissions {
    fn new(granted: bool) -> Self {
        Self {
            granted: AtomicBool::new(granted),
        }
    }

    fn set(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
    }
}

impl PermissionProvider for SwitchablePermissions {
    fn is_location_granted(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    fn is_notification_granted(&self) -> bool {
        true
    }
}

#[derive(Default)]
struct CountingPrompt {
    prompts: AtomicUsize,
}

impl PermissionPrompt for CountingPrompt {
    fn request_permissions(&self) {
        self.prompts.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct FakeProcess {
    running: AtomicBool,
    fail_start: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl FakeProcess {
    fn crash(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl ProcessControl for FakeProcess {
    fn start_monitoring(&self) -> Result<bool, MonitorError> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(MonitorError::RuntimeUnavailable("no runtime".to_string()));
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(!self.running.swap(true, Ordering::SeqCst))
    }

    fn stop_monitoring(&self) -> bool {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.running.swap(false, Ordering::SeqCst)
    }

    fn is_monitoring_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

struct Harness {
    store: Arc<SignalStore>,
    permissions: Arc<SwitchablePermissions>,
    prompt: Arc<CountingPrompt>,
    process: Arc<FakeProcess>,
    board: Arc<NotificationBoard>,
    controller: Arc<LifecycleController>,
}

impl Harness {
    fn new(exists: bool, granted: bool) -> Self {
        let store = Arc::new(SignalStore::new(exists));
        let permissions = Arc::new(SwitchablePermissions::new(granted));
        let prompt = Arc::new(CountingPrompt::default());
        let process = Arc::new(FakeProcess::default());
        let board = Arc::new(NotificationBoard::new());
        let controller = Arc::new(LifecycleController::new(
            store.clone(),
            permissions.clone(),
            prompt.clone(),
            process.clone(),
            board.clone(),
        ));
        Self {
            store,
            permissions,
            prompt,
            process,
            board,
            controller,
        }
    }

    fn starts(&self) -> usize {
        self.process.starts.load(Ordering::SeqCst)
    }

    fn stops(&self) -> usize {
        self.process.stops.load(Ordering::SeqCst)
    }

    fn prompts(&self) -> usize {
        self.prompt.prompts.load(Ordering::SeqCst)
    }
}

#[tokio::test]
async fn no_memos_stays_idle_without_commands() {
    let h = Harness::new(false, true);

    let state = h.controller.on_boot_completed().await.unwrap();

    assert_eq!(state, MonitorState::Idle);
    assert_eq!(h.starts(), 0);
    assert_eq!(h.stops(), 0);
    assert_eq!(h.prompts(), 0);
}

#[tokio::test]
async fn granted_memos_start_once_across_recomputes() {
    let h = Harness::new(true, true);

    let first = h.controller.recompute(RecomputeTrigger::StoreChange).await.unwrap();
    let second = h.controller.recompute(RecomputeTrigger::StoreChange).await.unwrap();

    assert_eq!(first, MonitorState::Running);
    assert_eq!(second, MonitorState::Running);
    assert_eq!(h.starts(), 1);
    assert_eq!(h.stops(), 0);
}

#[tokio::test]
async fn last_memo_gone_stops_monitoring_once() {
    let h = Harness::new(true, true);
    h.controller.on_boot_completed().await.unwrap();

    h.store.set(false);
    let first = h.controller.recompute(RecomputeTrigger::StoreChange).await.unwrap();
    let second = h.controller.recompute(RecomputeTrigger::StoreChange).await.unwrap();

    assert_eq!(first, MonitorState::Idle);
    assert_eq!(second, MonitorState::Idle);
    assert_eq!(h.stops(), 1);
    assert!(!h.process.is_monitoring_running());
}

#[tokio::test]
async fn missing_permissions_prompt_once_on_store_changes() {
    let h = Harness::new(true, false);

    let first = h.controller.recompute(RecomputeTrigger::StoreChange).await.unwrap();
    let second = h.controller.recompute(RecomputeTrigger::StoreChange).await.unwrap();

    assert_eq!(first, MonitorState::NeedsPermission);
    assert_eq!(second, MonitorState::NeedsPermission);
    assert_eq!(h.prompts(), 1);
    assert_eq!(h.starts(), 0);
}

#[tokio::test]
async fn resume_re_prompts_while_permissions_missing() {
    let h = Harness::new(true, false);
    h.controller.recompute(RecomputeTrigger::StoreChange).await.unwrap();

    h.controller.on_app_resumed().await.unwrap();
    assert_eq!(h.prompts(), 2);

    h.permissions.set(true);
    let state = h.controller.on_app_resumed().await.unwrap();
    assert_eq!(state, MonitorState::Running);
    assert_eq!(h.prompts(), 2);
    assert_eq!(h.starts(), 1);
}

#[tokio::test]
async fn boot_never_prompts() {
    let h = Harness::new(true, false);

    let state = h.controller.on_boot_completed().await.unwrap();

    assert_eq!(state, MonitorState::NeedsPermission);
    assert_eq!(h.prompts(), 0);
    assert_eq!(h.starts(), 0);
}

#[tokio::test]
async fn revoking_permissions_does_not_stop_running_monitor() {
    let h = Harness::new(true, true);
    h.controller.on_boot_completed().await.unwrap();

    h.permissions.set(false);
    let state = h.controller.recompute(RecomputeTrigger::StoreChange).await.unwrap();

    assert_eq!(state, MonitorState::Running);
    assert_eq!(h.stops(), 0);
    assert_eq!(h.prompts(), 0);
}

#[tokio::test]
async fn crashed_process_is_restarted() {
    let h = Harness::new(true, true);
    h.controller.on_boot_completed().await.unwrap();

    h.process.crash();
    let state = h.controller.on_app_resumed().await.unwrap();

    assert_eq!(state, MonitorState::Running);
    assert_eq!(h.starts(), 2);
}

#[tokio::test]
async fn stray_process_without_memos_is_stopped() {
    let h = Harness::new(false, true);
    h.process.running.store(true, Ordering::SeqCst);

    let state = h.controller.on_boot_completed().await.unwrap();

    assert_eq!(state, MonitorState::Idle);
    assert_eq!(h.stops(), 1);
}

#[tokio::test]
async fn start_failure_is_reported_and_retried_later() {
    let h = Harness::new(true, true);
    h.process.fail_start.store(true, Ordering::SeqCst);

    let err = h.controller.on_boot_completed().await.unwrap_err();
    assert!(matches!(err, LifecycleError::Start(_)));
    assert_ne!(h.controller.state().await, MonitorState::Running);

    h.process.fail_start.store(false, Ordering::SeqCst);
    let state = h.controller.on_app_resumed().await.unwrap();
    assert_eq!(state, MonitorState::Running);
    assert_eq!(h.starts(), 1);
}

#[tokio::test]
async fn repeated_start_failure_is_surfaced_once() {
    let h = Harness::new(true, true);
    let mut events = h.board.subscribe();
    h.process.fail_start.store(true, Ordering::SeqCst);

    h.controller.on_boot_completed().await.unwrap_err();
    h.controller.on_app_resumed().await.unwrap_err();

    assert_eq!(
        h.board.failure().as_deref(),
        Some("monitoring runtime unavailable: no runtime")
    );
    assert!(matches!(
        events.try_recv().unwrap(),
        NotificationEvent::MonitoringFailed { .. }
    ));
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn observer_follows_store_signal() {
    let h = Harness::new(false, true);
    let cancel = CancellationToken::new();
    let observer = h.controller.spawn_observer(cancel.clone());

    h.store.set(true);
    wait_until(|| h.starts() == 1).await;
    assert!(h.process.is_monitoring_running());

    h.store.set(false);
    wait_until(|| h.stops() == 1).await;
    assert!(!h.process.is_monitoring_running());

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), observer)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(h.starts(), 1);
}

async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}
