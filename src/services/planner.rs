//! Window planner: validates the requested window, then runs the snapshot
//! branch and the log branch side by side.
//!
//! The log branch depends on where the window sits relative to "now":
//! - entirely in the future: stream it as it happens
//! - entirely in the past: download it in one batch
//! - straddling now: download the elapsed part while streaming the rest
//!
//! Only the log branch decides the outcome; the snapshot is advisory.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::{debug, error, info, warn};

use crate::errors::{RecorderError, RecorderResult};
use crate::models::{
    run::RunHandle,
    timestamp::{parse_timestamp, validate_7_days, validate_interval, validate_utc},
};
use crate::services::{
    bucket_client::BucketClient,
    downloader::{DEFAULT_PARALLELISM, IntervalDownloader},
    log_client::LogClient,
    metrics::Metrics,
    provider::{DbLogSource, ObjectStore},
    snapshot_service::SnapshotService,
    streamer::{DEFAULT_SYNC_INTERVAL, LogStreamer},
};

/// Lead time given to a snapshot requested without a start.
const SNAPSHOT_DEFAULT_DELAY_SECS: i64 = 3;

/// Tunables of the recording pipeline.
#[derive(Clone, Debug)]
pub struct RecorderSettings {
    /// Length of each streamed interval.
    pub sync_interval: Duration,
    /// Concurrent download+upload pipelines per interval.
    pub parallelism: usize,
    /// Directory for staging files.
    pub tmp_dir: PathBuf,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            sync_interval: DEFAULT_SYNC_INTERVAL,
            parallelism: DEFAULT_PARALLELISM,
            tmp_dir: PathBuf::from("/var/tmp"),
        }
    }
}

/// How the log branch covers a window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowPlan {
    /// The window has not started yet.
    Stream,
    /// The window is over.
    Download,
    /// The window started in the past and ends in the future.
    DownloadAndStream,
}

/// Classify `[start, finish]` against `now`.
pub fn classify_window(start: DateTime<Utc>, finish: DateTime<Utc>, now: DateTime<Utc>) -> WindowPlan {
    if start - now >= ChronoDuration::zero() {
        WindowPlan::Stream
    } else if finish - now <= ChronoDuration::zero() {
        WindowPlan::Download
    } else {
        WindowPlan::DownloadAndStream
    }
}

/// Entry point of the `sync` and `snapshot` commands.
pub struct Recorder {
    source: Arc<dyn DbLogSource>,
    store: Arc<dyn ObjectStore>,
    run: RunHandle,
    metrics: Metrics,
    settings: RecorderSettings,
}

impl Recorder {
    pub fn new(
        source: Arc<dyn DbLogSource>,
        store: Arc<dyn ObjectStore>,
        run: RunHandle,
        metrics: Metrics,
        settings: RecorderSettings,
    ) -> Self {
        Self {
            source,
            store,
            run,
            metrics,
            settings,
        }
    }

    /// Archive the logs of `[start_at, end_at]` into `bucket_name` and, unless
    /// this is a recovery run, snapshot the database at `start_at`.
    pub async fn start_sync_process(
        &self,
        db_identifier: &str,
        start_at: &str,
        end_at: &str,
        bucket_name: &str,
    ) -> RecorderResult<()> {
        if bucket_name.is_empty() {
            return Err(RecorderError::MissingBucket);
        }

        let start = parse_timestamp(start_at)
            .inspect_err(|err| error!(error = %err, input = start_at, "invalid input for --start flag"))?
            .ok_or(RecorderError::MissingTimestamp("start"))?;
        let finish = parse_timestamp(end_at)
            .inspect_err(|err| error!(error = %err, input = end_at, "invalid input for --finish flag"))?
            .ok_or(RecorderError::MissingTimestamp("finish"))?;

        validate_interval(start, finish)
            .inspect_err(|err| error!(error = %err, "the start at & end at interval are not valid"))?;
        validate_7_days(start).inspect_err(
            |err| error!(error = %err, "the start at date is before the 7 days DB log retention"),
        )?;
        validate_utc(&[start, finish])
            .inspect_err(|err| error!(error = %err, "the start or finish datetime is not on UTC timezone"))?;

        let log_client = LogClient::new(
            self.source.clone(),
            self.run.clone(),
            self.settings.tmp_dir.clone(),
        );
        let bucket = Arc::new(BucketClient::new(
            self.store.clone(),
            bucket_name,
            self.run.clone(),
        ));
        if !bucket.verify_bucket().await {
            return Err(RecorderError::BucketNotFound(bucket_name.to_string()));
        }

        let downloader = IntervalDownloader::new(
            log_client,
            bucket,
            self.metrics.clone(),
            self.run.clone(),
        )
        .with_parallelism(self.settings.parallelism);
        let streamer = LogStreamer::new(
            downloader.clone(),
            self.run.clone(),
            self.settings.sync_interval,
        );
        let snapshots = SnapshotService::new(self.source.clone(), self.run.clone());

        let snapshot_branch = async {
            if self.run.is_recovery() {
                return;
            }
            if let Err(err) = snapshots.create_db_snapshot(db_identifier, start).await {
                error!(error = %err, "unable to create the snapshot");
            }
            info!("snapshot process is finished");
        };

        let log_branch = async {
            let result = if self.run.is_recovery() {
                warn!(pid = self.run.pid(), "recovery run: log sync is not performed");
                Ok(())
            } else {
                self.sync_logs(&downloader, &streamer, db_identifier, start, finish)
                    .await
            };
            info!("log sync process is finished");
            result
        };

        let ((), result) = tokio::join!(snapshot_branch, log_branch);
        info!("all processes were finished");
        result
    }

    async fn sync_logs(
        &self,
        downloader: &IntervalDownloader,
        streamer: &LogStreamer,
        db_identifier: &str,
        start: DateTime<Utc>,
        finish: DateTime<Utc>,
    ) -> RecorderResult<()> {
        let now = Utc::now();

        match classify_window(start, finish, now) {
            WindowPlan::Stream => {
                debug!("starting process: Wait & Sync");
                streamer.stream_log_files(db_identifier, start, finish).await;
                Ok(())
            }
            WindowPlan::Download => {
                debug!("starting process: Download Interval");
                downloader
                    .download_logs_interval(db_identifier, true, start, finish)
                    .await
                    .inspect_err(|err| {
                        error!(error = %err, "the download log interval function finished with an error")
                    })
            }
            WindowPlan::DownloadAndStream => {
                debug!("starting process: Download Interval & Sync");
                // The loose interval rounds the start down to the hour so the
                // hand-off with the stream leaves no gap.
                let period = ChronoDuration::from_std(streamer.interval())
                    .unwrap_or(ChronoDuration::hours(1));
                let backfill = async {
                    let result = downloader
                        .download_logs_interval(db_identifier, false, start - period, now - period)
                        .await;
                    match &result {
                        Ok(()) => info!("the download log interval function is finished"),
                        Err(err) => error!(error = %err, "the download log interval function finished with an error"),
                    }
                    result
                };
                let stream = streamer.stream_log_files(db_identifier, now, finish);

                let (result, ()) = tokio::join!(backfill, stream);
                result
            }
        }
    }

    /// Snapshot the database at `start_at`, or a few seconds from now when
    /// no start is given.
    pub async fn start_snapshot_process(&self, db_identifier: &str, start_at: &str) -> RecorderResult<()> {
        let start = parse_timestamp(start_at)
            .inspect_err(|err| error!(error = %err, input = start_at, "invalid input for --start flag"))?
            .unwrap_or_else(|| Utc::now() + ChronoDuration::seconds(SNAPSHOT_DEFAULT_DELAY_SECS));

        if start < Utc::now() {
            error!(start = %start, "the start at time is on the past");
            return Err(RecorderError::SnapshotInPast);
        }
        validate_utc(&[start]).inspect_err(|err| error!(error = %err, "invalid timezone"))?;

        SnapshotService::new(self.source.clone(), self.run.clone())
            .create_db_snapshot(db_identifier, start)
            .await
            .inspect_err(|err| error!(error = %err, "unable to create the snapshot"))?;
        Ok(())
    }
}
