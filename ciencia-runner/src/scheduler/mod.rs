//! Scheduler layer
//!
//! Background work that outlives the request which started a run: one
//! watcher task per live engine process.

pub mod watcher;

pub use watcher::RunWatcher;
