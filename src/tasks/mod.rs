//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Expiry sweep: Removes expired cache entries that are never re-requested

mod sweep;

pub use sweep::spawn_sweep_task;
