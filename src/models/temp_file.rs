//! Local staging file for one downloaded log.

use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::fs::{File, OpenOptions};
use tracing::{debug, warn};
use uuid::Uuid;

pub const STAGING_PREFIX: &str = "rds-log-";

/// Prefix shared by every staging file of a run: `rds-log-{PID}-`.
pub fn temp_file_prefix(pid: &str) -> String {
    format!("{}{}-", STAGING_PREFIX, pid)
}

/// A staging file named `rds-log-{PID}-{random}`.
///
/// The file is removed when the value is dropped, whichever path the
/// download or upload took.
#[derive(Debug)]
pub struct TempLogFile {
    path: PathBuf,
}

impl TempLogFile {
    /// Create a fresh, empty staging file under `dir`.
    pub async fn create(dir: &Path, pid: &str) -> io::Result<(Self, File)> {
        let path = dir.join(format!("{}{}", temp_file_prefix(pid), Uuid::new_v4().simple()));
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        Ok((Self { path }, file))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn len(&self) -> io::Result<u64> {
        Ok(tokio::fs::metadata(&self.path).await?.len())
    }
}

impl Drop for TempLogFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(tmp = %self.path.display(), "removed staging file"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(tmp = %self.path.display(), error = %err, "unable to remove staging file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn file_is_named_after_the_run_and_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let (tmp, mut file) = TempLogFile::create(dir.path(), "ASDF1234").await.unwrap();
        file.write_all(b"Hello World!").await.unwrap();
        file.flush().await.unwrap();

        let name = tmp.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("rds-log-ASDF1234-"));
        assert_eq!(tmp.len().await.unwrap(), 12);

        let path = tmp.path().to_path_buf();
        drop(file);
        drop(tmp);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn staging_files_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let (a, _fa) = TempLogFile::create(dir.path(), "ASDF1234").await.unwrap();
        let (b, _fb) = TempLogFile::create(dir.path(), "ASDF1234").await.unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[tokio::test]
    async fn len_fails_once_the_file_is_gone() {
        let dir = tempfile::tempdir().unwrap();
        let (tmp, file) = TempLogFile::create(dir.path(), "ASDF1234").await.unwrap();
        drop(file);
        std::fs::remove_file(tmp.path()).unwrap();

        assert_eq!(tmp.len().await.unwrap_err().kind(), ErrorKind::NotFound);
    }
}
