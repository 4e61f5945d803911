//! SQLite-backed store handle.
//!
//! # Responsibility
//! - Own one migrated connection and serialize access to it.
//! - Run every query on the blocking pool so async callers never stall.
//! - Republish the monitoring signal after every committed write.
//!
//! # Invariants
//! - The signal is recomputed under the same lock as the write, so readers of
//!   the channel never observe a value older than the last commit.
//! - The channel only notifies subscribers when the value actually changes.

use super::{MemoStore, StoreError, StoreResult};
use crate::db::{open_db, open_db_in_memory};
use crate::model::memo::{GeoPoint, Memo, MemoId};
use crate::repo::memo_repo::{MemoListQuery, MemoRepository, RepoResult, SqliteMemoRepository};
use async_trait::async_trait;
use log::{debug, info};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Explicitly constructed handle over the memo database.
///
/// Cloning is cheap and shares the connection and the signal channel.
#[derive(Clone)]
pub struct SqliteMemoStore {
    conn: Arc<Mutex<Connection>>,
    open_with_location: Arc<watch::Sender<bool>>,
}

impl SqliteMemoStore {
    /// Wraps an already migrated connection.
    pub fn new(conn: Connection) -> StoreResult<Self> {
        let initial = SqliteMemoRepository::new(&conn).has_open_with_location()?;
        let (sender, _) = watch::channel(initial);
        info!("event=store_open module=store status=ok open_with_location={initial}");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            open_with_location: Arc::new(sender),
        })
    }

    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::new(open_db(path)?)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::new(open_db_in_memory()?)
    }

    pub async fn create_memo(&self, memo: Memo) -> StoreResult<MemoId> {
        self.write(move |repo| repo.create_memo(&memo)).await
    }

    /// Marks a memo as done. One-way.
    pub async fn mark_done(&self, id: MemoId) -> StoreResult<()> {
        self.write(move |repo| repo.mark_done(id)).await
    }

    pub async fn list_memos(&self, query: MemoListQuery) -> StoreResult<Vec<Memo>> {
        self.read(move |repo| repo.list_memos(&query)).await
    }

    async fn read<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteMemoRepository<'_>) -> RepoResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            op(&SqliteMemoRepository::new(&guard)).map_err(StoreError::from)
        })
        .await
        .map_err(|err| StoreError::Task(err.to_string()))?
    }

    async fn write<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteMemoRepository<'_>) -> RepoResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let sender = Arc::clone(&self.open_with_location);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            let repo = SqliteMemoRepository::new(&guard);
            let value = op(&repo)?;
            let exists = repo.has_open_with_location()?;
            let changed = sender.send_if_modified(|current| {
                if *current == exists {
                    return false;
                }
                *current = exists;
                true
            });
            if changed {
                debug!("event=store_signal module=store status=ok open_with_location={exists}");
            }
            Ok(value)
        })
        .await
        .map_err(|err| StoreError::Task(err.to_string()))?
    }
}

#[async_trait]
impl MemoStore for SqliteMemoStore {
    async fn find_near(&self, center: GeoPoint, radius_meters: f64) -> StoreResult<Vec<Memo>> {
        self.read(move |repo| repo.find_near(center, radius_meters))
            .await
    }

    async fn has_open_with_location(&self) -> StoreResult<bool> {
        self.read(|repo| repo.has_open_with_location()).await
    }

    async fn get_by_id(&self, id: MemoId) -> StoreResult<Option<Memo>> {
        self.read(move |repo| repo.get_memo(id)).await
    }

    fn subscribe_open_with_location(&self) -> watch::Receiver<bool> {
        self.open_with_location.subscribe()
    }
}
