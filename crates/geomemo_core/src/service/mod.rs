//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store and port calls into use-case level APIs.
//! - Host the monitoring pipeline: proximity evaluation, the background
//!   supervisor and the lifecycle controller that drives it.

pub mod lifecycle;
pub mod memo_service;
pub mod monitor;
pub mod notification_board;
pub mod proximity;
