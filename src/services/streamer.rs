//! Periodic streamer: while a window is still open, archive each elapsed
//! interval as soon as it closes.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::models::run::RunHandle;
use crate::services::{downloader::IntervalDownloader, ticker};

pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Delay applied to the first tick so the first interval has produced its logs.
const START_SLACK_SECS: i64 = 1;
/// Extra time granted past the window end before the watchdog fires.
const END_SLACK_SECS: i64 = 2;

#[derive(Clone)]
pub struct LogStreamer {
    downloader: IntervalDownloader,
    run: RunHandle,
    interval: Duration,
}

impl LogStreamer {
    pub fn new(downloader: IntervalDownloader, run: RunHandle, interval: Duration) -> Self {
        Self {
            downloader,
            run,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Tick every interval from `start_at`, archiving `[tick - interval, tick]`
    /// on each tick, until `end_at` passes. Returns once every spawned sync
    /// has finished.
    pub async fn stream_log_files(
        &self,
        db_identifier: &str,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    ) {
        let start_at = start_at + ChronoDuration::seconds(START_SLACK_SECS);
        let end_at = end_at + ChronoDuration::seconds(END_SLACK_SECS);
        let step = ChronoDuration::from_std(self.interval).unwrap_or(ChronoDuration::hours(1));

        let cancel = self.run.cancel_signal().child_token();
        let watchdog = {
            let cancel = cancel.clone();
            let wait = (end_at - Utc::now()).to_std().unwrap_or_default();
            tokio::spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(wait) => {
                        debug!("stream window closed");
                        cancel.cancel();
                    }
                }
            })
        };

        let mut ticks = ticker::every(start_at, self.interval, cancel.clone());
        let mut workers = JoinSet::new();

        while let Some(tick) = ticks.recv().await {
            let downloader = self.downloader.clone();
            let cancel = cancel.clone();
            let db_identifier = db_identifier.to_string();

            workers.spawn(async move {
                debug!(time = %tick, "new sync process started");
                if let Err(err) = downloader
                    .download_logs_interval(&db_identifier, true, tick - step, tick)
                    .await
                {
                    error!(time = %tick, error = %err, "the periodic log sync failed");
                }

                if tick > end_at {
                    cancel.cancel();
                    return;
                }
                info!(time = %(tick + step), "waiting to the next sync");
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(err) = joined {
                error!(error = %err, "periodic sync worker panicked");
            }
        }
        watchdog.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        bucket_client::BucketClient,
        log_client::LogClient,
        metrics::Metrics,
        testing::{FakeDbLogSource, FakeObjectStore},
    };
    use std::sync::Arc;

    fn streamer(source: Arc<FakeDbLogSource>, run: RunHandle, dir: &std::path::Path) -> LogStreamer {
        let store = Arc::new(FakeObjectStore::with_buckets(&["archive"]));
        let log_client = LogClient::new(source, run.clone(), dir);
        let bucket = Arc::new(BucketClient::new(store, "archive", run.clone()));
        let downloader = IntervalDownloader::new(log_client, bucket, Metrics::new().unwrap(), run.clone());
        LogStreamer::new(downloader, run, Duration::from_millis(100))
    }

    #[tokio::test]
    async fn ticks_until_the_window_closes() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(FakeDbLogSource::default());
        let run = RunHandle::with_pid("A1234ASDF", false);
        let streamer = streamer(source.clone(), run, dir.path());

        let start = Utc::now() + ChronoDuration::milliseconds(100);
        let finish = Utc::now() + ChronoDuration::milliseconds(500);
        streamer.stream_log_files("test-db", start, finish).await;

        assert!(source.describe_calls() >= 4, "calls: {}", source.describe_calls());
        assert!(Utc::now() >= finish + ChronoDuration::seconds(END_SLACK_SECS));
    }

    #[tokio::test]
    async fn run_cancellation_stops_the_stream() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(FakeDbLogSource::default());
        let run = RunHandle::with_pid("A1234ASDF", false);
        let streamer = streamer(source.clone(), run.clone(), dir.path());

        let canceller = {
            let run = run.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(1300)).await;
                run.cancel();
            })
        };

        let started = std::time::Instant::now();
        streamer
            .stream_log_files("test-db", Utc::now(), Utc::now() + ChronoDuration::hours(1))
            .await;
        canceller.await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(source.describe_calls() >= 1);
    }
}
