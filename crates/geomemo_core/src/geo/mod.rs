//! Geometry helpers for proximity queries.

pub mod planar;
