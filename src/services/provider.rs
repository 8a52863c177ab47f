//! Capabilities the recorder needs from the cloud provider.
//!
//! The core only talks to these two traits. Production implementations live
//! in `services::aws`; tests use the in-memory fakes from `services::testing`.

use async_trait::async_trait;
use std::{collections::HashMap, path::Path};

use crate::errors::RecorderResult;
use crate::models::snapshot::{DbInstance, SnapshotRequest};

/// One page of the database log listing.
#[derive(Clone, Debug, Default)]
pub struct LogFilesPage {
    pub file_names: Vec<String>,
    pub marker: Option<String>,
}

/// One page of a log file's content.
#[derive(Clone, Debug, Default)]
pub struct LogPortion {
    pub data: String,
    pub marker: Option<String>,
}

/// Source of database logs, topology and snapshots.
#[async_trait]
pub trait DbLogSource: Send + Sync {
    async fn describe_db_log_files(&self, db_identifier: &str, marker: &str)
    -> RecorderResult<LogFilesPage>;

    async fn download_db_log_file_portion(
        &self,
        db_identifier: &str,
        log_file_name: &str,
        marker: &str,
        number_of_lines: i32,
    ) -> RecorderResult<LogPortion>;

    async fn describe_db_instances(&self, db_identifier: &str) -> RecorderResult<Vec<DbInstance>>;

    /// Returns the ARN of the new instance snapshot.
    async fn create_db_snapshot(&self, request: &SnapshotRequest) -> RecorderResult<String>;

    /// Returns the ARN of the new cluster snapshot.
    async fn create_db_cluster_snapshot(&self, request: &SnapshotRequest)
    -> RecorderResult<String>;
}

/// Object storage the logs are archived into.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Names of every bucket visible to the caller.
    async fn list_buckets(&self) -> RecorderResult<Vec<String>>;

    /// Keys under `prefix`, at most `max_keys` of them.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        max_keys: i32,
    ) -> RecorderResult<Vec<String>>;

    /// Write an empty object carrying `metadata`.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        metadata: HashMap<String, String>,
    ) -> RecorderResult<()>;

    /// Upload a local file, in parts when it is large.
    async fn upload_large_file(&self, bucket: &str, file: &Path, key: &str)
    -> RecorderResult<()>;
}
