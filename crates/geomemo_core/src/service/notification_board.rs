//! In-process notification board.
//!
//! # Responsibility
//! - Keep one update-in-place entry per memo id.
//! - Track the persistent monitoring indicator and the one-shot failure entry.
//! - Publish render events for the host on a broadcast channel.
//!
//! # Invariants
//! - A memo id alerts once; later `notify` calls for the same id are silent
//!   and only publish when content changed.
//! - `dismiss` removes the entry, so the next `notify` alerts again.
//! - A failure reason is published once until monitoring status is shown again.

use crate::model::memo::MemoId;
use crate::port::notification::Notifier;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

/// Visible notification for one memo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoNotification {
    pub memo_id: MemoId,
    pub title: String,
    pub body: String,
    /// Number of in-place updates after the initial alert.
    pub updates: u32,
}

/// Render instructions for the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    /// New entry; the only event that should make noise.
    MemoAlerted {
        memo_id: MemoId,
        title: String,
        body: String,
    },
    /// Silent in-place content update.
    MemoUpdated {
        memo_id: MemoId,
        title: String,
        body: String,
    },
    MemoDismissed {
        memo_id: MemoId,
    },
    MonitoringStatusShown,
    MonitoringStatusCleared,
    MonitoringFailed {
        reason: String,
    },
}

#[derive(Debug, Default)]
struct BoardState {
    memos: BTreeMap<MemoId, MemoNotification>,
    status_visible: bool,
    failure: Option<String>,
}

/// Default `Notifier` implementation shared by hosts.
pub struct NotificationBoard {
    state: Mutex<BoardState>,
    events: broadcast::Sender<NotificationEvent>,
}

impl Default for NotificationBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationBoard {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(BoardState::default()),
            events,
        }
    }

    /// Subscribes to render events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.events.subscribe()
    }

    pub fn get(&self, memo_id: MemoId) -> Option<MemoNotification> {
        self.lock().memos.get(&memo_id).cloned()
    }

    /// Visible memo entries ordered by memo id.
    pub fn active(&self) -> Vec<MemoNotification> {
        self.lock().memos.values().cloned().collect()
    }

    pub fn is_status_visible(&self) -> bool {
        self.lock().status_visible
    }

    pub fn failure(&self) -> Option<String> {
        self.lock().failure.clone()
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: NotificationEvent) {
        // No subscribers is fine; the board state is the source of truth.
        let _ = self.events.send(event);
    }
}

impl Notifier for NotificationBoard {
    fn notify(&self, memo_id: MemoId, title: &str, body_snippet: &str) {
        let event = {
            let mut state = self.lock();
            match state.memos.get_mut(&memo_id) {
                Some(entry) => {
                    if entry.title == title && entry.body == body_snippet {
                        None
                    } else {
                        entry.title = title.to_string();
                        entry.body = body_snippet.to_string();
                        entry.updates += 1;
                        Some(NotificationEvent::MemoUpdated {
                            memo_id,
                            title: entry.title.clone(),
                            body: entry.body.clone(),
                        })
                    }
                }
                None => {
                    state.memos.insert(
                        memo_id,
                        MemoNotification {
                            memo_id,
                            title: title.to_string(),
                            body: body_snippet.to_string(),
                            updates: 0,
                        },
                    );
                    Some(NotificationEvent::MemoAlerted {
                        memo_id,
                        title: title.to_string(),
                        body: body_snippet.to_string(),
                    })
                }
            }
        };

        match event {
            Some(event @ NotificationEvent::MemoAlerted { .. }) => {
                info!("event=memo_alert module=notification status=ok memo_id={memo_id}");
                self.publish(event);
            }
            Some(event) => {
                debug!("event=memo_alert module=notification status=updated memo_id={memo_id}");
                self.publish(event);
            }
            None => {
                debug!("event=memo_alert module=notification status=skip memo_id={memo_id}");
            }
        }
    }

    fn dismiss(&self, memo_id: MemoId) {
        if self.lock().memos.remove(&memo_id).is_some() {
            info!("event=memo_dismiss module=notification status=ok memo_id={memo_id}");
            self.publish(NotificationEvent::MemoDismissed { memo_id });
        }
    }

    fn show_monitoring_status(&self) {
        {
            let mut state = self.lock();
            state.failure = None;
            if state.status_visible {
                return;
            }
            state.status_visible = true;
        }
        self.publish(NotificationEvent::MonitoringStatusShown);
    }

    fn clear_monitoring_status(&self) {
        {
            let mut state = self.lock();
            if !state.status_visible {
                return;
            }
            state.status_visible = false;
        }
        self.publish(NotificationEvent::MonitoringStatusCleared);
    }

    fn show_monitoring_failure(&self, reason: &str) {
        {
            let mut state = self.lock();
            if state.failure.as_deref() == Some(reason) {
                return;
            }
            state.failure = Some(reason.to_string());
        }
        warn!("event=monitor_failure_shown module=notification status=error");
        self.publish(NotificationEvent::MonitoringFailed {
            reason: reason.to_string(),
        });
    }
}
