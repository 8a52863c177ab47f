//! Bucket-side operations of a run: bucket verification, the run folder
//! marker and log uploads.
//!
//! Layout inside the bucket:
//! - `{PID}/`: zero-byte folder marker with a `db-identifier` metadata entry
//! - `{PID}/rds_log_{PID}_{unix_seconds}`: one object per archived log

use std::{
    collections::HashMap,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::errors::RecorderResult;
use crate::models::{log_file::format_file_path, run::RunHandle};
use crate::services::provider::ObjectStore;

pub const BUCKET_ENV_VAR: &str = "AWS_S3_BUCKET_NAME";
pub const DB_IDENTIFIER_METADATA: &str = "db-identifier";

/// Client bound to one bucket for the lifetime of a run.
pub struct BucketClient {
    store: Arc<dyn ObjectStore>,
    bucket_name: String,
    run: RunHandle,
    /// Set once the run folder is known to exist.
    folder_exists: AtomicBool,
    /// Serializes check-then-create of the folder marker.
    folder_lock: Mutex<()>,
}

impl BucketClient {
    pub fn new(store: Arc<dyn ObjectStore>, bucket_name: impl Into<String>, run: RunHandle) -> Self {
        Self {
            store,
            bucket_name: bucket_name.into(),
            run,
            folder_exists: AtomicBool::new(false),
            folder_lock: Mutex::new(()),
        }
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    /// True iff the configured bucket is visible to the caller.
    pub async fn verify_bucket(&self) -> bool {
        match self.store.list_buckets().await {
            Ok(buckets) => buckets.iter().any(|name| name == &self.bucket_name),
            Err(err) => {
                error!(error = %err, "unable to get buckets");
                false
            }
        }
    }

    /// True if `folder/` already holds at least one object.
    ///
    /// A positive answer is cached for the rest of the run; listing errors
    /// count as "missing" and are retried on the next call.
    pub async fn verify_bucket_folder(&self, folder: &str) -> bool {
        if self.folder_exists.load(Ordering::Acquire) {
            return true;
        }

        let prefix = format!("{}/", folder);
        let exists = match self.store.list_objects(&self.bucket_name, &prefix, 1).await {
            Ok(keys) => !keys.is_empty(),
            Err(err) => {
                error!(folder, error = %err, "couldn't get the object");
                false
            }
        };
        if exists {
            self.folder_exists.store(true, Ordering::Release);
        }
        exists
    }

    /// Write the zero-byte folder marker tagged with the database identifier.
    pub async fn create_bucket_folder(&self, folder: &str, db_identifier: &str) -> RecorderResult<()> {
        let metadata = HashMap::from([(
            DB_IDENTIFIER_METADATA.to_string(),
            db_identifier.to_string(),
        )]);
        self.store
            .put_object(&self.bucket_name, &format!("{}/", folder), metadata)
            .await?;
        self.folder_exists.store(true, Ordering::Release);
        Ok(())
    }

    /// Upload a staged log under `{PID}/{file_name}`, creating the run folder first if needed.
    pub async fn push_log_to_bucket(
        &self,
        file: &Path,
        file_name: &str,
        db_identifier: &str,
    ) -> RecorderResult<()> {
        let folder = self.run.pid();

        if !self.folder_exists.load(Ordering::Acquire) {
            let _guard = self.folder_lock.lock().await;
            if !self.verify_bucket_folder(folder).await {
                self.create_bucket_folder(folder, db_identifier).await?;
                info!(folder, bucket = %self.bucket_name, "the bucket folder is created");
            }
        }

        self.store
            .upload_large_file(&self.bucket_name, file, &format_file_path(folder, file_name))
            .await
    }
}
