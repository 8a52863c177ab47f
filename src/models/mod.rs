//! Core data models for the log recorder.
//!
//! Run identity, time handling, log file naming, staging files and snapshot
//! requests. Nothing here performs network I/O.

pub mod log_file;
pub mod run;
pub mod snapshot;
pub mod temp_file;
pub mod timestamp;
