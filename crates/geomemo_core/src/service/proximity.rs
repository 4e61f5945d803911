//! Proximity evaluation for a single position fix.
//!
//! # Responsibility
//! - Query open memos near a fix and hand each one to the notifier.
//! - Contain per-fix failures so the monitoring loop keeps running.
//!
//! # Invariants
//! - The radius is fixed for the lifetime of an evaluator.
//! - Each memo id produces at most one event per fix.
//! - No notifier call is made once the cancellation token has fired.
//! - `on_fix` never returns an error; failures are logged and the fix skipped.

use crate::config::MonitorConfig;
use crate::model::memo::{GeoPoint, MemoId};
use crate::port::notification::{body_snippet, Notifier};
use crate::store::{MemoStore, StoreResult};
use log::{debug, warn};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// "Memo became near" for one fix. Recomputed from scratch every time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProximityEvent {
    pub memo_id: MemoId,
}

/// Turns position fixes into notifier calls.
pub struct ProximityEvaluator {
    store: Arc<dyn MemoStore>,
    notifier: Arc<dyn Notifier>,
    radius_meters: f64,
    snippet_max_chars: usize,
}

impl ProximityEvaluator {
    pub fn new(
        store: Arc<dyn MemoStore>,
        notifier: Arc<dyn Notifier>,
        config: &MonitorConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            radius_meters: config.radius_meters,
            snippet_max_chars: config.snippet_max_chars,
        }
    }

    /// Evaluates one fix, swallowing and logging any failure.
    pub async fn on_fix(&self, fix: GeoPoint, cancel: &CancellationToken) -> Vec<ProximityEvent> {
        match self.evaluate(fix, cancel).await {
            Ok(events) => events,
            Err(err) => {
                warn!(
                    "event=proximity_eval module=proximity status=error error_code=store_failed error={err}"
                );
                Vec::new()
            }
        }
    }

    /// Evaluates one fix and reports store failures to the caller.
    pub async fn evaluate(
        &self,
        fix: GeoPoint,
        cancel: &CancellationToken,
    ) -> StoreResult<Vec<ProximityEvent>> {
        let started_at = Instant::now();
        let memos = self.store.find_near(fix, self.radius_meters).await?;

        let mut seen = BTreeSet::new();
        let mut events = Vec::with_capacity(memos.len());
        for memo in memos {
            if !memo.is_open_with_location() || !seen.insert(memo.id) {
                continue;
            }
            if cancel.is_cancelled() {
                debug!("event=proximity_eval module=proximity status=skip reason=cancelled");
                break;
            }
            let snippet = body_snippet(&memo.description, self.snippet_max_chars);
            self.notifier.notify(memo.id, &memo.title, &snippet);
            events.push(ProximityEvent { memo_id: memo.id });
        }

        debug!(
            "event=proximity_eval module=proximity status=ok matched={} duration_ms={}",
            events.len(),
            started_at.elapsed().as_millis()
        );
        Ok(events)
    }
}
