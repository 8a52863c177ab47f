//! Paginated access to database logs.
//!
//! Both the listing and the download follow the same marker protocol: start
//! at `"0"`, stop when the service returns no marker or echoes the one it was
//! given.

use std::{path::PathBuf, sync::Arc};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::errors::{DownloadError, RecorderError, RecorderResult};
use crate::models::{log_file::is_csv_log, run::RunHandle, temp_file::TempLogFile};
use crate::services::provider::DbLogSource;

pub const START_MARKER: &str = "0";

/// Lines requested per page; larger pages get truncated by the service.
pub const LINES_PER_PORTION: i32 = 1450;

/// Seven days of hourly logs, plus slack.
const EXPECTED_LOG_FILES: usize = 170;

#[derive(Clone)]
pub struct LogClient {
    source: Arc<dyn DbLogSource>,
    run: RunHandle,
    tmp_dir: PathBuf,
}

impl LogClient {
    pub fn new(source: Arc<dyn DbLogSource>, run: RunHandle, tmp_dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            run,
            tmp_dir: tmp_dir.into(),
        }
    }

    /// Every CSV log file of the database, in the order the service lists them.
    pub async fn describe_log_files(&self, db_identifier: &str) -> RecorderResult<Vec<String>> {
        let mut marker = START_MARKER.to_string();
        let mut files = Vec::with_capacity(EXPECTED_LOG_FILES);

        loop {
            let page = self
                .source
                .describe_db_log_files(db_identifier, &marker)
                .await?;
            files.extend(page.file_names.into_iter().filter(|name| is_csv_log(name)));

            match page.marker {
                Some(next) if next != marker => marker = next,
                _ => break,
            }
        }

        debug!(db = db_identifier, count = files.len(), "listed log files");
        Ok(files)
    }

    /// Download every portion of `log_file_name` into a new staging file.
    ///
    /// On failure the partially written file is returned inside the error.
    pub async fn download_log_file(
        &self,
        db_identifier: &str,
        log_file_name: &str,
    ) -> Result<TempLogFile, DownloadError> {
        let fail = |partial: Option<TempLogFile>, source: RecorderError| DownloadError {
            file_name: log_file_name.to_string(),
            partial,
            source,
        };

        let (tmp, file) = match TempLogFile::create(&self.tmp_dir, self.run.pid()).await {
            Ok(created) => created,
            Err(err) => return Err(fail(None, err.into())),
        };
        let mut writer = BufWriter::new(file);

        let written = self
            .copy_portions(db_identifier, log_file_name, &mut writer)
            .await;
        let flushed = writer.flush().await;

        match (written, flushed) {
            (Ok(()), Ok(())) => Ok(tmp),
            (Err(err), _) => Err(fail(Some(tmp), err)),
            (Ok(()), Err(err)) => Err(fail(Some(tmp), err.into())),
        }
    }

    async fn copy_portions<W>(
        &self,
        db_identifier: &str,
        log_file_name: &str,
        writer: &mut W,
    ) -> RecorderResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut marker = START_MARKER.to_string();
        loop {
            let portion = self
                .source
                .download_db_log_file_portion(
                    db_identifier,
                    log_file_name,
                    &marker,
                    LINES_PER_PORTION,
                )
                .await?;
            writer.write_all(portion.data.as_bytes()).await?;

            match portion.marker {
                Some(next) if next != marker => marker = next,
                _ => return Ok(()),
            }
        }
    }
}
