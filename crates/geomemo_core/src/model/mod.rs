//! Domain model for location-anchored reminders.
//!
//! # Responsibility
//! - Define the memo record and the geographic point it may be anchored to.
//!
//! # Invariants
//! - Every memo is identified by a stable `MemoId`.
//! - Completion is one-way; there is no "un-done" transition.

pub mod memo;
