//! Access-control navigation guard.
//!
//! The guard is a pure function of the destination and the explicit
//! [`AuthContext`](crate::auth::AuthContext): no storage reads, no I/O.

pub mod access;

pub use access::{AccessGuard, GuardDecision};
