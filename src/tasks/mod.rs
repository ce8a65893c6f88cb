//! Background Tasks Module
//!
//! Periodic maintenance that runs alongside the primitives.
//!
//! # Tasks
//! - Expiry sweep: removes idle-expired cache entries at a fixed interval

mod cleanup;

pub use cleanup::spawn_cleanup_task;
