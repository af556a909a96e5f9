//! Background Tasks Module
//!
//! Contains the background task that keeps cache policy up to date.
//!
//! # Tasks
//! - Maintenance: applies recorded accesses, evicts over capacity and
//!   sweeps expired entries at a configured interval

mod maintenance;

pub use maintenance::{spawn_maintenance_task, BatchReport, Maintenance, PipelineState};
