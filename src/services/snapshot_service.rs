//! Snapshot initiator: waits for the window start, then snapshots the
//! database at instance or cluster level depending on its topology.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::errors::RecorderResult;
use crate::models::{
    run::RunHandle,
    snapshot::{SnapshotRequest, SnapshotTarget},
};
use crate::services::provider::DbLogSource;

#[derive(Clone)]
pub struct SnapshotService {
    source: Arc<dyn DbLogSource>,
    run: RunHandle,
}

impl SnapshotService {
    pub fn new(source: Arc<dyn DbLogSource>, run: RunHandle) -> Self {
        Self { source, run }
    }

    /// Snapshot `db_identifier` once `start_at` is reached.
    ///
    /// Returns the snapshot ARN, or `None` when the run was cancelled while
    /// waiting.
    pub async fn create_db_snapshot(
        &self,
        db_identifier: &str,
        start_at: DateTime<Utc>,
    ) -> RecorderResult<Option<String>> {
        let wait = (start_at - Utc::now()).to_std().unwrap_or_default();
        tokio::select! {
            _ = self.run.cancel_signal().cancelled() => {
                info!(db = db_identifier, "snapshot cancelled before the start time");
                return Ok(None);
            }
            _ = tokio::time::sleep(wait) => {}
        }

        let target = self.resolve_target(db_identifier).await;
        let request = SnapshotRequest::new(&self.run, target);

        let arn = match &request.target {
            SnapshotTarget::Cluster(_) => self.source.create_db_cluster_snapshot(&request).await?,
            SnapshotTarget::Instance(_) => self.source.create_db_snapshot(&request).await?,
        };
        info!(arn = %arn, snapshot = %request.snapshot_identifier, "the snapshot is created");
        Ok(Some(arn))
    }

    /// Cluster members are snapshotted through their cluster; anything else,
    /// including a failed lookup, falls back to an instance snapshot.
    async fn resolve_target(&self, db_identifier: &str) -> SnapshotTarget {
        let instances = match self.source.describe_db_instances(db_identifier).await {
            Ok(instances) => instances,
            Err(err) => {
                error!(db = db_identifier, error = %err, "unable to describe the DB");
                return SnapshotTarget::Instance(db_identifier.to_string());
            }
        };

        match instances.first() {
            None => {
                info!(db = db_identifier, "database not found");
                SnapshotTarget::Instance(db_identifier.to_string())
            }
            Some(instance) => {
                debug!(
                    db = %instance.identifier,
                    cluster = ?instance.cluster_identifier,
                    "resolved database topology"
                );
                match instance.cluster_identifier.as_deref() {
                    Some(cluster) if !cluster.is_empty() => {
                        SnapshotTarget::Cluster(cluster.to_string())
                    }
                    _ => SnapshotTarget::Instance(db_identifier.to_string()),
                }
            }
        }
    }
}
