//! Memo repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over the `memos` table.
//! - Own the spatial query that decides which open memos are near a point.
//!
//! # Invariants
//! - Write paths call `Memo::validate()` before SQL mutations.
//! - Read paths reject invalid persisted rows instead of masking them.
//! - `mark_done` never clears the flag; there is no un-done path.
//! - `find_near` and `has_open_with_location` only see open memos with a location.

use crate::db::DbError;
use crate::geo::planar::PlanarWindow;
use crate::model::memo::{GeoPoint, Memo, MemoId, MemoValidationError};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const MEMO_SELECT_SQL: &str = "SELECT
    uuid,
    title,
    description,
    reminder_date,
    is_done,
    latitude,
    longitude
FROM memos";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for memo persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(MemoValidationError),
    Db(DbError),
    NotFound(MemoId),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "memo not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted memo data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<MemoValidationError> for RepoError {
    fn from(value: MemoValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Query options for listing memos.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoListQuery {
    /// When `false`, only open memos are returned.
    pub include_done: bool,
}

/// Repository interface for memo operations.
pub trait MemoRepository {
    fn create_memo(&self, memo: &Memo) -> RepoResult<MemoId>;
    /// Replaces title, description, reminder date and location.
    ///
    /// The done flag is carried forward only when set; an update never reopens.
    fn update_memo(&self, memo: &Memo) -> RepoResult<()>;
    fn get_memo(&self, id: MemoId) -> RepoResult<Option<Memo>>;
    fn list_memos(&self, query: &MemoListQuery) -> RepoResult<Vec<Memo>>;
    /// Marks a memo as done. Idempotent.
    fn mark_done(&self, id: MemoId) -> RepoResult<()>;
    fn has_open_with_location(&self) -> RepoResult<bool>;
    /// Open memos whose anchor lies within `radius_meters` of `center`.
    fn find_near(&self, center: GeoPoint, radius_meters: f64) -> RepoResult<Vec<Memo>>;
}

/// SQLite-backed memo repository.
pub struct SqliteMemoRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMemoRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl MemoRepository for SqliteMemoRepository<'_> {
    fn create_memo(&self, memo: &Memo) -> RepoResult<MemoId> {
        memo.validate()?;
        let (latitude, longitude) = split_location(memo.location);

        self.conn.execute(
            "INSERT INTO memos (
                uuid,
                title,
                description,
                reminder_date,
                is_done,
                latitude,
                longitude
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                memo.id.to_string(),
                memo.title.as_str(),
                memo.description.as_str(),
                memo.reminder_date,
                bool_to_int(memo.done),
                latitude,
                longitude,
            ],
        )?;

        Ok(memo.id)
    }

    fn update_memo(&self, memo: &Memo) -> RepoResult<()> {
        memo.validate()?;
        let (latitude, longitude) = split_location(memo.location);

        let changed = self.conn.execute(
            "UPDATE memos
             SET
                title = ?1,
                description = ?2,
                reminder_date = ?3,
                is_done = MAX(is_done, ?4),
                latitude = ?5,
                longitude = ?6,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?7;",
            params![
                memo.title.as_str(),
                memo.description.as_str(),
                memo.reminder_date,
                bool_to_int(memo.done),
                latitude,
                longitude,
                memo.id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(memo.id));
        }

        Ok(())
    }

    fn get_memo(&self, id: MemoId) -> RepoResult<Option<Memo>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{MEMO_SELECT_SQL} WHERE uuid = ?1;"))?;

        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_memo_row(row)?));
        }

        Ok(None)
    }

    fn list_memos(&self, query: &MemoListQuery) -> RepoResult<Vec<Memo>> {
        let mut stmt = self.conn.prepare(&format!(
            "{MEMO_SELECT_SQL}
             WHERE (?1 = 1 OR is_done = 0)
             ORDER BY created_at ASC, uuid ASC;"
        ))?;

        let mut rows = stmt.query([bool_to_int(query.include_done)])?;
        let mut memos = Vec::new();
        while let Some(row) = rows.next()? {
            memos.push(parse_memo_row(row)?);
        }

        Ok(memos)
    }

    fn mark_done(&self, id: MemoId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE memos
             SET
                is_done = 1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            [id.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn has_open_with_location(&self) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM memos
                WHERE is_done = 0
                  AND latitude IS NOT NULL
                  AND longitude IS NOT NULL
            );",
            [],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn find_near(&self, center: GeoPoint, radius_meters: f64) -> RepoResult<Vec<Memo>> {
        let window = PlanarWindow::new(center, radius_meters);

        // The bounding box runs on the (is_done, latitude, longitude) index;
        // the exact planar test runs on the candidates below.
        let mut stmt = self.conn.prepare(&format!(
            "{MEMO_SELECT_SQL}
             WHERE is_done = 0
               AND latitude BETWEEN ?1 AND ?2
               AND longitude BETWEEN ?3 AND ?4
             ORDER BY uuid ASC;"
        ))?;

        let mut rows = stmt.query(params![
            window.min_latitude(),
            window.max_latitude(),
            window.min_longitude(),
            window.max_longitude(),
        ])?;

        let mut memos = Vec::new();
        while let Some(row) = rows.next()? {
            let memo = parse_memo_row(row)?;
            if memo.location.is_some_and(|point| window.contains(point)) {
                memos.push(memo);
            }
        }

        Ok(memos)
    }
}

fn parse_memo_row(row: &Row<'_>) -> RepoResult<Memo> {
    let uuid_text: String = row.get("uuid")?;
    let id = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{uuid_text}` in memos.uuid"))
    })?;

    let done = match row.get::<_, i64>("is_done")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_done value `{other}` in memos.is_done"
            )));
        }
    };

    let latitude: Option<f64> = row.get("latitude")?;
    let longitude: Option<f64> = row.get("longitude")?;
    let location = match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(GeoPoint::new(latitude, longitude)),
        (None, None) => None,
        _ => {
            return Err(RepoError::InvalidData(format!(
                "memo {id} has a partial location"
            )));
        }
    };

    let memo = Memo {
        id,
        title: row.get("title")?,
        description: row.get("description")?,
        reminder_date: row.get("reminder_date")?,
        done,
        location,
    };
    memo.validate()?;
    Ok(memo)
}

fn split_location(location: Option<GeoPoint>) -> (Option<f64>, Option<f64>) {
    match location {
        Some(point) => (Some(point.latitude), Some(point.longitude)),
        None => (None, None),
    }
}

fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}
