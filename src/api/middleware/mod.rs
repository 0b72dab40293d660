//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Auth validator: bearer token → `Caller`
//! 2. Audit logger: runs after auth, so it sees the caller id

pub mod audit;
pub mod auth;
