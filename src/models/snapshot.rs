//! Snapshot requests issued at the start of a recording window.

use crate::models::run::RunHandle;

pub const SNAPSHOT_TAG_KEY: &str = "app";
pub const SNAPSHOT_TAG_VALUE: &str = "rdsrecorder";

/// Which kind of snapshot the database topology calls for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SnapshotTarget {
    /// Standalone instance, snapshotted by its own identifier.
    Instance(String),
    /// Cluster member, snapshotted through its cluster identifier.
    Cluster(String),
}

/// A snapshot call ready to be dispatched to the database service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotRequest {
    pub target: SnapshotTarget,
    pub snapshot_identifier: String,
    pub tags: Vec<(String, String)>,
}

impl SnapshotRequest {
    pub fn new(run: &RunHandle, target: SnapshotTarget) -> Self {
        Self {
            target,
            snapshot_identifier: build_snapshot_identifier(run),
            tags: vec![(SNAPSHOT_TAG_KEY.to_string(), SNAPSHOT_TAG_VALUE.to_string())],
        }
    }
}

/// Database instance as reported by the service; only topology matters here.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DbInstance {
    pub identifier: String,
    pub cluster_identifier: Option<String>,
}

pub fn build_snapshot_identifier(run: &RunHandle) -> String {
    format!("pgreplay-{}", run.pid())
}
