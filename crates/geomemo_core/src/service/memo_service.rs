//! Memo use-case service.
//!
//! # Responsibility
//! - Validate user drafts before they reach storage.
//! - Create, complete, fetch and list memos through the store handle.
//! - Keep the notification surface consistent with completion.
//!
//! # Invariants
//! - Drafts need a non-blank title and a non-blank description.
//! - Completing a memo always dismisses its notification, even when the memo
//!   was already done.

use crate::model::memo::{GeoPoint, Memo, MemoId};
use crate::port::notification::Notifier;
use crate::repo::memo_repo::{MemoListQuery, RepoError};
use crate::store::{MemoStore, SqliteMemoStore, StoreError};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Service error for memo use-cases.
#[derive(Debug)]
pub enum MemoServiceError {
    /// Draft input rejected before storage.
    InvalidDraft(&'static str),
    /// Target memo does not exist.
    MemoNotFound(MemoId),
    /// Persistence-layer failure.
    Store(StoreError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for MemoServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDraft(details) => write!(f, "invalid memo draft: {details}"),
            Self::MemoNotFound(id) => write!(f, "memo not found: {id}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent memo state: {details}"),
        }
    }
}

impl Error for MemoServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for MemoServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Repo(RepoError::NotFound(id)) => Self::MemoNotFound(id),
            other => Self::Store(other),
        }
    }
}

/// User input for a new memo.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoDraft {
    pub title: String,
    pub description: String,
    pub reminder_date: i64,
    pub location: Option<GeoPoint>,
}

impl MemoDraft {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            reminder_date: 0,
            location: None,
        }
    }

    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_reminder_date(mut self, reminder_date: i64) -> Self {
        self.reminder_date = reminder_date;
        self
    }

    fn validate(&self) -> Result<(), MemoServiceError> {
        if self.title.trim().is_empty() {
            return Err(MemoServiceError::InvalidDraft("title must not be blank"));
        }
        if self.description.trim().is_empty() {
            return Err(MemoServiceError::InvalidDraft(
                "description must not be blank",
            ));
        }
        Ok(())
    }

    fn into_memo(self) -> Memo {
        let memo = Memo::new(self.title, self.description).with_reminder_date(self.reminder_date);
        match self.location {
            Some(location) => memo.with_location(location),
            None => memo,
        }
    }
}

/// Memo service facade over the store handle.
pub struct MemoService {
    store: SqliteMemoStore,
    notifier: Arc<dyn Notifier>,
}

impl MemoService {
    pub fn new(store: SqliteMemoStore, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Validates and stores a draft, returning the persisted memo.
    pub async fn create_memo(&self, draft: MemoDraft) -> Result<Memo, MemoServiceError> {
        draft.validate()?;
        let id = self.store.create_memo(draft.into_memo()).await?;
        info!("event=memo_create module=memo_service status=ok memo_id={id}");
        self.store
            .get_by_id(id)
            .await?
            .ok_or(MemoServiceError::InconsistentState(
                "created memo not found in read-back",
            ))
    }

    /// Marks a memo done and dismisses its notification.
    pub async fn complete_memo(&self, id: MemoId) -> Result<Memo, MemoServiceError> {
        self.store.mark_done(id).await?;
        self.notifier.dismiss(id);
        info!("event=memo_complete module=memo_service status=ok memo_id={id}");
        self.store
            .get_by_id(id)
            .await?
            .ok_or(MemoServiceError::InconsistentState(
                "completed memo not found in read-back",
            ))
    }

    pub async fn get_memo(&self, id: MemoId) -> Result<Option<Memo>, MemoServiceError> {
        Ok(self.store.get_by_id(id).await?)
    }

    /// Lists all memos when `show_all` is set, otherwise open memos only.
    pub async fn list_memos(&self, show_all: bool) -> Result<Vec<Memo>, MemoServiceError> {
        let query = MemoListQuery {
            include_done: show_all,
        };
        Ok(self.store.list_memos(query).await?)
    }

    /// Store handle backing this service.
    pub fn store(&self) -> &SqliteMemoStore {
        &self.store
    }
}
