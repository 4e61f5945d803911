//! Core domain logic for geomemo.
//! This crate is the single source of truth for proximity and monitoring invariants.

pub mod config;
pub mod db;
pub mod geo;
pub mod logging;
pub mod model;
pub mod port;
pub mod repo;
pub mod service;
pub mod store;

pub use config::MonitorConfig;
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use geo::planar::{planar_distance_meters, PlanarWindow};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::memo::{GeoPoint, Memo, MemoId, MemoValidationError};
pub use port::location::{FixFilter, FixRequest, FixSource, FixSourceError};
pub use port::notification::{body_snippet, Notifier};
pub use port::permission::{PermissionPrompt, PermissionProvider};
pub use port::process::{MonitorError, ProcessControl};
pub use repo::memo_repo::{
    MemoListQuery, MemoRepository, RepoError, RepoResult, SqliteMemoRepository,
};
pub use service::lifecycle::{
    decide, LifecycleCommand, LifecycleController, LifecycleError, MonitorState,
    MonitoringDecision, RecomputeTrigger,
};
pub use service::memo_service::{MemoDraft, MemoService, MemoServiceError};
pub use service::monitor::{MonitorDeps, MonitorFailure, MonitorSupervisor};
pub use service::notification_board::{MemoNotification, NotificationBoard, NotificationEvent};
pub use service::proximity::{ProximityEvaluator, ProximityEvent};
pub use store::{MemoStore, SqliteMemoStore, StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
