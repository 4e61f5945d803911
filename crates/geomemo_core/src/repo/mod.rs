//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for memos.
//! - Isolate SQLite query details from services and the monitoring pipeline.
//!
//! # Invariants
//! - Repository writes enforce `Memo::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod memo_repo;
