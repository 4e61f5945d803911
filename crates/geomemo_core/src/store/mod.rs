//! Store handle contract consumed by the monitoring pipeline.
//!
//! # Responsibility
//! - Expose the read side the proximity evaluator and lifecycle controller need.
//! - Publish the "exists open memo with location" signal as a subscription.
//!
//! # Invariants
//! - The signal is latest-value-wins: intermediate states may be coalesced,
//!   but a committed write is visible no later than the next delivered value.
//! - Store handles are explicitly constructed and injected; there is no
//!   process-global store.

use crate::db::DbError;
use crate::model::memo::{GeoPoint, Memo, MemoId};
use crate::repo::memo_repo::RepoError;
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};
use tokio::sync::watch;

mod sqlite;

pub use sqlite::SqliteMemoStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store access failures. All of them are treated as transient by the pipeline.
#[derive(Debug)]
pub enum StoreError {
    Repo(RepoError),
    /// A previous holder of the connection lock panicked.
    LockPoisoned,
    /// The blocking task running the query failed or was cancelled.
    Task(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::LockPoisoned => write!(f, "memo store connection lock poisoned"),
            Self::Task(message) => write!(f, "memo store task failed: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::LockPoisoned | Self::Task(_) => None,
        }
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Repo(RepoError::Db(value))
    }
}

/// Read-side memo store used by the proximity pipeline.
#[async_trait]
pub trait MemoStore: Send + Sync {
    /// Open memos with a location within `radius_meters` of `center`.
    async fn find_near(&self, center: GeoPoint, radius_meters: f64) -> StoreResult<Vec<Memo>>;
    /// One-shot read of the monitoring signal.
    async fn has_open_with_location(&self) -> StoreResult<bool>;
    async fn get_by_id(&self, id: MemoId) -> StoreResult<Option<Memo>>;
    /// Continuous, change-notified view of the monitoring signal.
    fn subscribe_open_with_location(&self) -> watch::Receiver<bool>;
}
