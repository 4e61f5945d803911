use async_trait::async_trait;
use geomemo_core::{
    FixRequest, FixSource, FixSourceError, GeoPoint, Memo, MemoId, MemoStore, MonitorConfig,
    MonitorDeps, MonitorError, MonitorFailure, MonitorSupervisor, NotificationBoard,
    NotificationEvent, PermissionProvider, ProcessControl, ProximityEvaluator, SqliteMemoStore,
    StoreError, StoreResult,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

const CENTER: GeoPoint = GeoPoint::new(41.64635, 41.62474);

/// Fix source fed by the test through `push`.
#[derive(Default)]
struct ChannelFixSource {
    sender: Mutex<Option<mpsc::Sender<GeoPoint>>>,
    fail_with: Mutex<Option<FixSourceError>>,
    stops: AtomicUsize,
}

impl ChannelFixSource {
    fn failing(err: FixSourceError) -> Self {
        Self {
            fail_with: Mutex::new(Some(err)),
            ..Self::default()
        }
    }

    fn is_started(&self) -> bool {
        self.sender.lock().unwrap().is_some()
    }

    async fn push(&self, fix: GeoPoint) -> bool {
        let sender = self.sender.lock().unwrap().clone();
        match sender {
            Some(sender) => sender.send(fix).await.is_ok(),
            None => false,
        }
    }

    /// Ends the stream as a provider shutting down would.
    fn close(&self) {
        self.sender.lock().unwrap().take();
    }
}

#[async_trait]
impl FixSource for ChannelFixSource {
    async fn start(
        &self,
        _request: FixRequest,
    ) -> Result<mpsc::Receiver<GeoPoint>, FixSourceError> {
        if let Some(err) = self.fail_with.lock().unwrap().clone() {
            return Err(err);
        }
        let (sender, receiver) = mpsc::channel(16);
        *self.sender.lock().unwrap() = Some(sender);
        Ok(receiver)
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.sender.lock().unwrap().take();
    }
}

struct Grants(AtomicBool);

impl PermissionProvider for Grants {
    fn is_location_granted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn is_notification_granted(&self) -> bool {
        true
    }
}

/// Store whose first proximity query fails.
struct FlakyStore {
    inner: SqliteMemoStore,
    queries: AtomicUsize,
}

#[async_trait]
impl MemoStore for FlakyStore {
    async fn find_near(&self, center: GeoPoint, radius_meters: f64) -> StoreResult<Vec<Memo>> {
        if self.queries.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(StoreError::LockPoisoned);
        }
        self.inner.find_near(center, radius_meters).await
    }

    async fn has_open_with_location(&self) -> StoreResult<bool> {
        self.inner.has_open_with_location().await
    }

    async fn get_by_id(&self, id: MemoId) -> StoreResult<Option<Memo>> {
        self.inner.get_by_id(id).await
    }

    fn subscribe_open_with_location(&self) -> watch::Receiver<bool> {
        self.inner.subscribe_open_with_location()
    }
}

struct Harness {
    source: Arc<ChannelFixSource>,
    board: Arc<NotificationBoard>,
    supervisor: MonitorSupervisor,
}

async fn bakery_store() -> SqliteMemoStore {
    let store = SqliteMemoStore::open_in_memory().unwrap();
    store
        .create_memo(Memo::new("Bakery", "bread").with_location(CENTER))
        .await
        .unwrap();
    store
}

async fn harness_with(source: ChannelFixSource, granted: bool) -> Harness {
    harness_on(Arc::new(bakery_store().await), source, granted)
}

fn harness_on(store: Arc<dyn MemoStore>, source: ChannelFixSource, granted: bool) -> Harness {
    let source = Arc::new(source);
    let board = Arc::new(NotificationBoard::new());
    let config = MonitorConfig::default();
    let evaluator = Arc::new(ProximityEvaluator::new(store, board.clone(), &config));
    let supervisor = MonitorSupervisor::new(MonitorDeps {
        evaluator,
        fix_source: source.clone(),
        permissions: Arc::new(Grants(AtomicBool::new(granted))),
        notifier: board.clone(),
        request: config.fix_request(),
    });
    Harness {
        source,
        board,
        supervisor,
    }
}

async fn harness() -> Harness {
    harness_with(ChannelFixSource::default(), true).await
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

#[tokio::test]
async fn fixes_near_a_memo_produce_one_notification() {
    let h = harness().await;

    assert!(h.supervisor.start_monitoring().unwrap());
    wait_until(|| h.source.is_started()).await;
    assert!(h.board.is_status_visible());

    assert!(h.source.push(CENTER).await);
    assert!(h.source.push(CENTER).await);
    wait_until(|| h.board.active().len() == 1).await;

    assert!(h.supervisor.stop_and_wait().await);
    assert!(!h.supervisor.is_monitoring_running());
    assert!(!h.board.is_status_visible());
    assert!(h.source.stops.load(Ordering::SeqCst) >= 1);
    assert_eq!(h.board.active().len(), 1);
}

#[tokio::test]
async fn failed_fix_does_not_end_the_run() {
    let store = Arc::new(FlakyStore {
        inner: bakery_store().await,
        queries: AtomicUsize::new(0),
    });
    let h = harness_on(store.clone(), ChannelFixSource::default(), true);

    h.supervisor.start_monitoring().unwrap();
    wait_until(|| h.source.is_started()).await;

    assert!(h.source.push(CENTER).await);
    wait_until(|| store.queries.load(Ordering::SeqCst) == 1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(h.supervisor.is_monitoring_running());
    assert!(h.board.active().is_empty());

    assert!(h.source.push(CENTER).await);
    wait_until(|| h.board.active().len() == 1).await;
    assert_eq!(store.queries.load(Ordering::SeqCst), 2);
    assert!(h.supervisor.is_monitoring_running());
    assert!(h.supervisor.take_failure().is_none());

    assert!(h.supervisor.stop_and_wait().await);
}

#[tokio::test]
async fn second_start_is_a_no_op() {
    let h = harness().await;

    assert!(h.supervisor.start_monitoring().unwrap());
    assert!(!h.supervisor.start_monitoring().unwrap());
    assert!(h.supervisor.is_monitoring_running());

    assert!(h.supervisor.stop_monitoring());
    assert!(!h.supervisor.stop_monitoring());
    h.supervisor.wait_until_stopped().await;
}

#[tokio::test]
async fn no_notifications_after_stop() {
    let h = harness().await;
    let mut events = h.board.subscribe();

    h.supervisor.start_monitoring().unwrap();
    wait_until(|| h.source.is_started()).await;
    assert!(h.supervisor.stop_and_wait().await);

    assert!(!h.source.push(CENTER).await);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(h.board.active().is_empty());
    while let Ok(event) = events.try_recv() {
        assert!(!matches!(event, NotificationEvent::MemoAlerted { .. }));
    }
}

#[tokio::test]
async fn monitor_can_restart_after_stop() {
    let h = harness().await;

    h.supervisor.start_monitoring().unwrap();
    wait_until(|| h.source.is_started()).await;
    h.supervisor.stop_and_wait().await;

    assert!(h.supervisor.start_monitoring().unwrap());
    wait_until(|| h.source.is_started()).await;
    assert!(h.source.push(CENTER).await);
    wait_until(|| h.board.active().len() == 1).await;
    assert!(h.supervisor.is_monitoring_running());
    h.supervisor.stop_and_wait().await;
}

#[tokio::test]
async fn fix_source_failure_is_surfaced_once() {
    let h = harness_with(
        ChannelFixSource::failing(FixSourceError::Unavailable("gps off".to_string())),
        true,
    )
    .await;
    let mut events = h.board.subscribe();

    assert!(h.supervisor.start_monitoring().unwrap());
    h.supervisor.wait_until_stopped().await;

    assert!(matches!(
        h.supervisor.take_failure(),
        Some(MonitorFailure::FixSource(FixSourceError::Unavailable(_)))
    ));
    assert!(h.supervisor.take_failure().is_none());
    assert!(h.board.failure().unwrap().contains("gps off"));
    assert!(!h.board.is_status_visible());

    let mut failures = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, NotificationEvent::MonitoringFailed { .. }) {
            failures += 1;
        }
    }
    assert_eq!(failures, 1);
}

#[tokio::test]
async fn closed_source_ends_the_run() {
    let h = harness().await;

    h.supervisor.start_monitoring().unwrap();
    wait_until(|| h.source.is_started()).await;
    h.source.close();

    tokio::time::timeout(Duration::from_secs(1), h.supervisor.wait_until_stopped())
        .await
        .unwrap();
    assert!(!h.supervisor.is_monitoring_running());
    assert!(h.supervisor.take_failure().is_none());
}

#[tokio::test]
async fn missing_permissions_end_the_run_before_subscribing() {
    let h = harness_with(ChannelFixSource::default(), false).await;

    assert!(h.supervisor.start_monitoring().unwrap());
    tokio::time::timeout(Duration::from_secs(1), h.supervisor.wait_until_stopped())
        .await
        .unwrap();

    assert!(!h.source.is_started());
    assert!(!h.board.is_status_visible());
}

#[test]
fn start_without_runtime_is_an_error() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let h = runtime.block_on(harness());

    let err = h.supervisor.start_monitoring().unwrap_err();
    assert!(matches!(err, MonitorError::RuntimeUnavailable(_)));
    assert!(!h.supervisor.is_monitoring_running());
}
