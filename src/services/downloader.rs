//! Interval downloader: archive every log whose canonical instant falls in a
//! closed window, at most `parallelism` files at a time.
//!
//! Per-file failures are logged and dropped so one bad file never stops its
//! siblings; only a failed listing fails the whole call.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{debug, error, info, warn};

use crate::errors::RecorderResult;
use crate::models::{
    log_file::{find_datetime_from_log, format_file_name_for_s3},
    run::RunHandle,
    timestamp::{time_between, truncate_to_hour},
};
use crate::services::{bucket_client::BucketClient, log_client::LogClient, metrics::Metrics};

/// Concurrent download+upload pipelines per call.
pub const DEFAULT_PARALLELISM: usize = 5;

#[derive(Clone)]
pub struct IntervalDownloader {
    log_client: LogClient,
    bucket: Arc<BucketClient>,
    metrics: Metrics,
    run: RunHandle,
    parallelism: usize,
}

impl IntervalDownloader {
    pub fn new(
        log_client: LogClient,
        bucket: Arc<BucketClient>,
        metrics: Metrics,
        run: RunHandle,
    ) -> Self {
        Self {
            log_client,
            bucket,
            metrics,
            run,
            parallelism: DEFAULT_PARALLELISM,
        }
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Archive the logs of `db_identifier` stamped within `[start, finish]`.
    ///
    /// Without `strict_interval` the start is first rounded down to the hour,
    /// so the window may reach up to one hour earlier than requested.
    pub async fn download_logs_interval(
        &self,
        db_identifier: &str,
        strict_interval: bool,
        start: DateTime<Utc>,
        finish: DateTime<Utc>,
    ) -> RecorderResult<()> {
        let log_files = self.log_client.describe_log_files(db_identifier).await?;

        let start = if strict_interval {
            start
        } else {
            truncate_to_hour(start)
        };

        let filtered: Vec<String> = log_files
            .into_iter()
            .filter(|file| match find_datetime_from_log(file) {
                Ok(instant) => time_between(instant, start, finish),
                Err(err) => {
                    error!(error = %err, "skipping log file");
                    false
                }
            })
            .collect();

        if filtered.is_empty() {
            info!(%start, %finish, "no files found for the provided interval");
            return Ok(());
        }
        debug!(%start, %finish, files = filtered.len(), "downloading logs by an interval");

        let total = filtered.len();
        let permits = Arc::new(Semaphore::new(self.parallelism));
        let mut workers = JoinSet::new();

        for (idx, file_name) in filtered.into_iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = self.run.cancel_signal().cancelled() => {
                    warn!(remaining = total - idx, "run cancelled, skipping remaining files");
                    break;
                }
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let this = self.clone();
            let db_identifier = db_identifier.to_string();
            workers.spawn(async move {
                let _permit = permit;
                this.start_sync_log_process(&db_identifier, &file_name).await;
                info!(file_number = %format!("{}/{}", idx + 1, total), "file sync completed");
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(err) = joined {
                error!(error = %err, "log sync worker panicked");
            }
        }
        Ok(())
    }

    /// Download one log and push it to the bucket. Failures are logged, not returned.
    async fn start_sync_log_process(&self, db_identifier: &str, target_file: &str) {
        let object_name = match format_file_name_for_s3(&self.run, target_file) {
            Ok(name) => name,
            Err(err) => {
                error!(file = target_file, error = %err, "unable to format file name");
                return;
            }
        };

        debug!(file = target_file, "downloading a log file");
        let staged = match self.log_client.download_log_file(db_identifier, target_file).await {
            Ok(staged) => staged,
            Err(err) => {
                error!(file = target_file, error = %err.source, "unable to download log file");
                if let Some(partial) = &err.partial {
                    debug!(file = target_file, tmp = %partial.path().display(), "discarding partial download");
                }
                return;
            }
        };
        self.metrics.increment_downloaded_logs();
        let size = match staged.len().await {
            Ok(size) => size,
            Err(err) => {
                warn!(file = target_file, tmp = %staged.path().display(), error = %err, "unable to stat the staged file, size metric will not count it");
                0
            }
        };
        debug!(file = target_file, tmp = %staged.path().display(), size, "file downloaded");

        debug!(file = target_file, object = %object_name, "uploading a file to the bucket");
        if let Err(err) = self
            .bucket
            .push_log_to_bucket(staged.path(), &object_name, db_identifier)
            .await
        {
            error!(file = target_file, bucket = self.bucket.bucket_name(), error = %err, "unable to push to the bucket");
            return;
        }
        self.metrics.increment_uploaded_logs();
        self.metrics.increment_size_uploaded_logs(size);
        debug!(file = target_file, object = %object_name, "upload to the bucket done");
    }
}
