//! Memo domain model.
//!
//! # Responsibility
//! - Define the canonical reminder record and its optional anchor point.
//! - Provide lifecycle helpers for the one-way completion flag.
//!
//! # Invariants
//! - `id` is stable and never reused for another memo.
//! - `done` only ever moves from `false` to `true`.
//! - A done memo never takes part in proximity evaluation.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier assigned to a memo on creation.
pub type MemoId = Uuid;

/// Geographic point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Returns whether both coordinates are finite and inside their valid ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl Display for GeoPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Canonical reminder record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memo {
    pub id: MemoId,
    pub title: String,
    pub description: String,
    /// Unix epoch milliseconds. Advisory only; nothing schedules on it yet.
    pub reminder_date: i64,
    /// One-way completion flag.
    pub done: bool,
    /// Anchor point. Memos without one are never location-triggered.
    pub location: Option<GeoPoint>,
}

impl Memo {
    /// Creates an open memo with a generated stable ID and no location.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), title, description)
    }

    /// Creates an open memo with a caller-provided stable ID.
    pub fn with_id(id: MemoId, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: description.into(),
            reminder_date: 0,
            done: false,
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

    /// Marks this memo as done. There is no inverse operation.
    pub fn complete(&mut self) {
        self.done = true;
    }

    pub fn is_open(&self) -> bool {
        !self.done
    }

    /// Returns whether this memo should keep location monitoring alive.
    pub fn is_open_with_location(&self) -> bool {
        self.is_open() && self.location.is_some()
    }

    /// Validates persisted-shape invariants.
    ///
    /// # Errors
    /// - `EmptyTitle` when the title is blank.
    /// - `InvalidLocation` when the anchor is non-finite or out of range.
    pub fn validate(&self) -> Result<(), MemoValidationError> {
        if self.title.trim().is_empty() {
            return Err(MemoValidationError::EmptyTitle);
        }
        if let Some(location) = self.location {
            if !location.is_valid() {
                return Err(MemoValidationError::InvalidLocation(location));
            }
        }
        Ok(())
    }
}

/// Validation failures for memo records.
#[derive(Debug, Clone, PartialEq)]
pub enum MemoValidationError {
    EmptyTitle,
    InvalidLocation(GeoPoint),
}

impl Display for MemoValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "memo title must not be blank"),
            Self::InvalidLocation(point) => {
                write!(f, "memo location {point} is outside valid coordinate ranges")
            }
        }
    }
}

impl Error for MemoValidationError {}
