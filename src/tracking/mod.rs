//! Experiment tracking
//!
//! An optional side channel that records which model won a training run.

mod storage;
mod tracker;

pub use storage::{LocalStorage, StorageBackend};
pub use tracker::{ExperimentTracker, Run, RunStatus};
