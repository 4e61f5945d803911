//! Capability ports the core depends on.
//!
//! # Responsibility
//! - Describe host-provided collaborators (permissions, fixes, notifications,
//!   process control) as narrow traits.
//! - Keep the proximity pipeline and lifecycle controller testable with
//!   in-memory doubles.
//!
//! # Invariants
//! - Port implementations must be `Send + Sync`; they are shared across tasks.
//! - Each host environment provides exactly one adapter per port.

pub mod location;
pub mod notification;
pub mod permission;
pub mod process;
