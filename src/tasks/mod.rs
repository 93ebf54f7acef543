//! Background Tasks Module
//!
//! Contains background tasks that run while a cache instance is live.
//!
//! # Tasks
//! - Eviction sweep: removes idle/age-expired entries at the configured
//!   interval, one task per cache instance.

mod sweeper;

pub use sweeper::{spawn_sweep_task, SweeperHandle};
