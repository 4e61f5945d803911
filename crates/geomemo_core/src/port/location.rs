//! Position fix source port.
//!
//! # Responsibility
//! - Define how the monitoring task subscribes to position fixes.
//! - Provide the shared suppression rules (spacing, displacement) adapters apply.
//!
//! # Invariants
//! - After `stop`, an adapter must not deliver further fixes. The monitoring
//!   task also drops its receiver, so in-flight fixes are discarded.

use crate::geo::planar::PlanarWindow;
use crate::model::memo::GeoPoint;
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Cadence requested from a fix source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixRequest {
    /// Nominal interval between fixes.
    pub interval: Duration,
    /// Fixes closer together than this are dropped.
    pub min_interval: Duration,
    /// Fixes that moved less than this from the last delivered one are dropped.
    pub min_displacement_meters: f64,
}

/// Host location provider.
#[async_trait]
pub trait FixSource: Send + Sync {
    /// Begins delivering fixes on the returned channel.
    ///
    /// Starting an already started source replaces the previous subscription.
    async fn start(&self, request: FixRequest) -> Result<mpsc::Receiver<GeoPoint>, FixSourceError>;
    /// Stops delivery. Must be safe to call when not started.
    fn stop(&self);
}

/// Fix source failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixSourceError {
    PermissionDenied,
    Unavailable(String),
}

impl Display for FixSourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PermissionDenied => write!(f, "location permission denied"),
            Self::Unavailable(message) => write!(f, "location provider unavailable: {message}"),
        }
    }
}

impl Error for FixSourceError {}

/// Drops fixes that arrive too soon or moved too little.
#[derive(Debug, Clone)]
pub struct FixFilter {
    min_interval: Duration,
    min_displacement_meters: f64,
    last: Option<(GeoPoint, Instant)>,
}

impl FixFilter {
    pub fn new(request: &FixRequest) -> Self {
        Self {
            min_interval: request.min_interval,
            min_displacement_meters: request.min_displacement_meters,
            last: None,
        }
    }

    /// Returns whether `fix`, observed at `at`, should be delivered.
    ///
    /// Accepted fixes become the new reference point.
    pub fn accept(&mut self, fix: GeoPoint, at: Instant) -> bool {
        if let Some((last_fix, last_at)) = self.last {
            if at.saturating_duration_since(last_at) < self.min_interval {
                return false;
            }
            let moved_squared = PlanarWindow::new(last_fix, 0.0).distance_squared(fix);
            if moved_squared < self.min_displacement_meters * self.min_displacement_meters {
                return false;
            }
        }
        self.last = Some((fix, at));
        true
    }
}
