//! In-memory implementations of the provider capabilities for unit tests.

use async_trait::async_trait;
use std::{
    collections::HashMap,
    path::Path,
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use crate::errors::{RecorderError, RecorderResult};
use crate::models::{
    snapshot::{DbInstance, SnapshotRequest, SnapshotTarget},
    temp_file::STAGING_PREFIX,
};
use crate::services::provider::{DbLogSource, LogFilesPage, LogPortion, ObjectStore};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn fake_error(operation: &'static str, message: &str) -> RecorderError {
    RecorderError::provider(operation, message)
}

/// Number of staging files left in `dir`.
pub fn count_staging_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|entry| entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX))
                .count()
        })
        .unwrap_or(0)
}

enum Listing {
    /// Every added log in one page.
    AllLogs,
    /// Fixed pages, chained by their index.
    Pages(Vec<Vec<String>>),
    /// The same file forever, always with the same marker.
    Echo { file: String, marker: String },
}

#[derive(Default)]
struct SourceState {
    listing: Option<Listing>,
    describe_markers: Vec<String>,
    describe_error: Option<String>,

    logs: Vec<(String, Vec<String>)>,
    download_failures: HashMap<String, (usize, String)>,
    portion_line_counts: Vec<i32>,
    portion_delay: Duration,
    downloaded_files: Vec<String>,
    in_flight: usize,
    max_in_flight: usize,

    instances: Vec<DbInstance>,
    describe_instances_error: Option<String>,
    snapshots: Vec<SnapshotRequest>,
    snapshot_error: Option<String>,
}

/// Scripted database log source.
#[derive(Default)]
pub struct FakeDbLogSource {
    state: Mutex<SourceState>,
}

impl FakeDbLogSource {
    pub fn set_listing_pages(&self, pages: Vec<Vec<&str>>) {
        let pages = pages
            .into_iter()
            .map(|page| page.into_iter().map(str::to_string).collect())
            .collect();
        lock(&self.state).listing = Some(Listing::Pages(pages));
    }

    pub fn set_listing_echo(&self, file: &str, marker: &str) {
        lock(&self.state).listing = Some(Listing::Echo {
            file: file.to_string(),
            marker: marker.to_string(),
        });
    }

    pub fn fail_describe(&self, message: &str) {
        lock(&self.state).describe_error = Some(message.to_string());
    }

    /// Markers received by the listing, in call order.
    pub fn describe_markers(&self) -> Vec<String> {
        lock(&self.state).describe_markers.clone()
    }

    pub fn describe_calls(&self) -> usize {
        lock(&self.state).describe_markers.len()
    }

    /// Register a log file served as `portions`, one per page.
    pub fn add_log(&self, name: &str, portions: &[&str]) {
        let portions = portions.iter().map(|p| p.to_string()).collect();
        lock(&self.state).logs.push((name.to_string(), portions));
    }

    /// Portion requests for `name` from index `after` on fail with `message`.
    pub fn fail_download_after(&self, name: &str, after: usize, message: &str) {
        lock(&self.state)
            .download_failures
            .insert(name.to_string(), (after, message.to_string()));
    }

    pub fn set_portion_delay(&self, delay: Duration) {
        lock(&self.state).portion_delay = delay;
    }

    /// Line counts requested by every portion call.
    pub fn portion_line_counts(&self) -> Vec<i32> {
        lock(&self.state).portion_line_counts.clone()
    }

    /// Files whose download started, in start order.
    pub fn downloaded_files(&self) -> Vec<String> {
        lock(&self.state).downloaded_files.clone()
    }

    pub fn max_concurrent_downloads(&self) -> usize {
        lock(&self.state).max_in_flight
    }

    pub fn set_instances(&self, instances: Vec<DbInstance>) {
        lock(&self.state).instances = instances;
    }

    pub fn fail_describe_instances(&self, message: &str) {
        lock(&self.state).describe_instances_error = Some(message.to_string());
    }

    pub fn fail_snapshots(&self, message: &str) {
        lock(&self.state).snapshot_error = Some(message.to_string());
    }

    pub fn snapshots(&self) -> Vec<SnapshotRequest> {
        lock(&self.state).snapshots.clone()
    }

    fn record_snapshot(&self, request: &SnapshotRequest) -> RecorderResult<String> {
        let mut state = lock(&self.state);
        if let Some(message) = &state.snapshot_error {
            return Err(fake_error("CreateDBSnapshot", message));
        }
        state.snapshots.push(request.clone());
        let kind = match request.target {
            SnapshotTarget::Cluster(_) => "cluster-snapshot",
            SnapshotTarget::Instance(_) => "snapshot",
        };
        Ok(format!("arn:aws:rds:{}:{}", kind, request.snapshot_identifier))
    }

    /// Resolve one portion; returns the pending delay so the lock is not held while sleeping.
    fn next_portion(&self, name: &str, marker: &str) -> RecorderResult<(LogPortion, Duration)> {
        let state = lock(&self.state);
        let index: usize = marker
            .parse()
            .map_err(|_| fake_error("DownloadDBLogFilePortion", "unknown marker"))?;

        if let Some((after, message)) = state.download_failures.get(name) {
            if index >= *after {
                return Err(fake_error("DownloadDBLogFilePortion", message));
            }
        }

        let portions = state
            .logs
            .iter()
            .find(|(log, _)| log == name)
            .map(|(_, portions)| portions.clone())
            .ok_or_else(|| fake_error("DownloadDBLogFilePortion", "log file not found"))?;
        let data = portions.get(index).cloned().unwrap_or_default();
        let marker = (index + 1 < portions.len()).then(|| (index + 1).to_string());

        Ok((LogPortion { data, marker }, state.portion_delay))
    }
}

#[async_trait]
impl DbLogSource for FakeDbLogSource {
    async fn describe_db_log_files(
        &self,
        _db_identifier: &str,
        marker: &str,
    ) -> RecorderResult<LogFilesPage> {
        let mut state = lock(&self.state);
        state.describe_markers.push(marker.to_string());
        if let Some(message) = &state.describe_error {
            return Err(fake_error("DescribeDBLogFiles", message));
        }

        let page = match state.listing.as_ref().unwrap_or(&Listing::AllLogs) {
            Listing::AllLogs => LogFilesPage {
                file_names: state.logs.iter().map(|(name, _)| name.clone()).collect(),
                marker: None,
            },
            Listing::Pages(pages) => {
                let index: usize = marker.parse().unwrap_or(pages.len());
                LogFilesPage {
                    file_names: pages.get(index).cloned().unwrap_or_default(),
                    marker: (index + 1 < pages.len()).then(|| (index + 1).to_string()),
                }
            }
            Listing::Echo { file, marker } => LogFilesPage {
                file_names: vec![file.clone()],
                marker: Some(marker.clone()),
            },
        };
        Ok(page)
    }

    async fn download_db_log_file_portion(
        &self,
        _db_identifier: &str,
        log_file_name: &str,
        marker: &str,
        number_of_lines: i32,
    ) -> RecorderResult<LogPortion> {
        {
            let mut state = lock(&self.state);
            state.portion_line_counts.push(number_of_lines);
            if marker == "0" {
                state.downloaded_files.push(log_file_name.to_string());
            }
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
        }

        let result = self.next_portion(log_file_name, marker);
        if let Ok((_, delay)) = &result {
            if !delay.is_zero() {
                tokio::time::sleep(*delay).await;
            }
        }

        lock(&self.state).in_flight -= 1;
        result.map(|(portion, _)| portion)
    }

    async fn describe_db_instances(&self, _db_identifier: &str) -> RecorderResult<Vec<DbInstance>> {
        let state = lock(&self.state);
        match &state.describe_instances_error {
            Some(message) => Err(fake_error("DescribeDBInstances", message)),
            None => Ok(state.instances.clone()),
        }
    }

    async fn create_db_snapshot(&self, request: &SnapshotRequest) -> RecorderResult<String> {
        self.record_snapshot(request)
    }

    async fn create_db_cluster_snapshot(&self, request: &SnapshotRequest) -> RecorderResult<String> {
        self.record_snapshot(request)
    }
}

#[derive(Default)]
struct StoreState {
    buckets: Vec<String>,
    list_buckets_error: Option<String>,
    list_buckets_calls: usize,
    list_objects_calls: usize,
    objects: HashMap<String, Vec<u8>>,
    put_objects: Vec<(String, HashMap<String, String>)>,
    put_object_error: Option<String>,
    uploaded_keys: Vec<String>,
    failing_uploads: Vec<String>,
}

/// Object store backed by a map of key to content.
#[derive(Default)]
pub struct FakeObjectStore {
    state: Mutex<StoreState>,
}

impl FakeObjectStore {
    pub fn with_buckets(buckets: &[&str]) -> Self {
        let store = Self::default();
        lock(&store.state).buckets = buckets.iter().map(|b| b.to_string()).collect();
        store
    }

    pub fn fail_list_buckets(&self, message: &str) {
        lock(&self.state).list_buckets_error = Some(message.to_string());
    }

    pub fn list_buckets_calls(&self) -> usize {
        lock(&self.state).list_buckets_calls
    }

    pub fn insert_object(&self, key: &str, content: Vec<u8>) {
        lock(&self.state).objects.insert(key.to_string(), content);
    }

    pub fn list_objects_calls(&self) -> usize {
        lock(&self.state).list_objects_calls
    }

    /// Metadata-only objects written through `put_object`.
    pub fn put_objects(&self) -> Vec<(String, HashMap<String, String>)> {
        lock(&self.state).put_objects.clone()
    }

    pub fn fail_put_object(&self, message: &str) {
        lock(&self.state).put_object_error = Some(message.to_string());
    }

    /// Keys written through `upload_large_file`, in completion order.
    pub fn uploaded_keys(&self) -> Vec<String> {
        lock(&self.state).uploaded_keys.clone()
    }

    pub fn fail_upload_for(&self, key: &str) {
        lock(&self.state).failing_uploads.push(key.to_string());
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        lock(&self.state).objects.get(key).cloned()
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn list_buckets(&self) -> RecorderResult<Vec<String>> {
        let mut state = lock(&self.state);
        state.list_buckets_calls += 1;
        match &state.list_buckets_error {
            Some(message) => Err(fake_error("ListBuckets", message)),
            None => Ok(state.buckets.clone()),
        }
    }

    async fn list_objects(&self, _bucket: &str, prefix: &str, max_keys: i32) -> RecorderResult<Vec<String>> {
        let mut state = lock(&self.state);
        state.list_objects_calls += 1;
        let mut keys: Vec<String> = state
            .objects
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys.truncate(usize::try_from(max_keys).unwrap_or(0));
        Ok(keys)
    }

    async fn put_object(
        &self,
        _bucket: &str,
        key: &str,
        metadata: HashMap<String, String>,
    ) -> RecorderResult<()> {
        let mut state = lock(&self.state);
        if let Some(message) = &state.put_object_error {
            return Err(fake_error("PutObject", message));
        }
        state.objects.insert(key.to_string(), Vec::new());
        state.put_objects.push((key.to_string(), metadata));
        Ok(())
    }

    async fn upload_large_file(&self, _bucket: &str, file: &Path, key: &str) -> RecorderResult<()> {
        if lock(&self.state).failing_uploads.iter().any(|k| k == key) {
            return Err(fake_error("CompleteMultipartUpload", "upload rejected"));
        }
        let content = tokio::fs::read(file).await?;

        let mut state = lock(&self.state);
        state.objects.insert(key.to_string(), content);
        state.uploaded_keys.push(key.to_string());
        Ok(())
    }
}
