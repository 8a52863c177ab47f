//! Prometheus counters exposed on `/metrics`.
//!
//! Tracks:
//! - log files downloaded from the database
//! - log files uploaded to the bucket
//! - megabytes uploaded to the bucket
//!
//! `rdsrecorder_uploaded_s3_size_logs_total` keeps its historical name but is
//! recorded in megabytes (bytes / 1048576), which existing dashboards expect.

use prometheus::{Counter, Encoder, IntCounter, Registry, TextEncoder};

use crate::errors::RecorderResult;

const MEGABYTE: f64 = 1024.0 * 1024.0;

pub const DOWNLOADED_LOGS_TOTAL: &str = "rdsrecorder_downloaded_logs_total";
pub const UPLOADED_S3_LOGS_TOTAL: &str = "rdsrecorder_uploaded_s3_logs_total";
pub const UPLOADED_S3_SIZE_LOGS_TOTAL: &str = "rdsrecorder_uploaded_s3_size_logs_total";

/// Counter set owned by one process; clones share the same counters.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    downloaded_logs: IntCounter,
    uploaded_logs: IntCounter,
    uploaded_size_mb: Counter,
}

impl Metrics {
    pub fn new() -> RecorderResult<Self> {
        let registry = Registry::new();

        let downloaded_logs = IntCounter::new(
            DOWNLOADED_LOGS_TOTAL,
            "Total amount of log files downloaded from RDS",
        )?;
        let uploaded_logs = IntCounter::new(
            UPLOADED_S3_LOGS_TOTAL,
            "Total amount of log files uploaded to S3 Bucket",
        )?;
        let uploaded_size_mb = Counter::new(
            UPLOADED_S3_SIZE_LOGS_TOTAL,
            "Total amount of MB uploaded to the S3 Bucket",
        )?;

        registry.register(Box::new(downloaded_logs.clone()))?;
        registry.register(Box::new(uploaded_logs.clone()))?;
        registry.register(Box::new(uploaded_size_mb.clone()))?;

        Ok(Self {
            registry,
            downloaded_logs,
            uploaded_logs,
            uploaded_size_mb,
        })
    }

    pub fn increment_downloaded_logs(&self) {
        self.downloaded_logs.inc();
    }

    pub fn increment_uploaded_logs(&self) {
        self.uploaded_logs.inc();
    }

    pub fn increment_size_uploaded_logs(&self, size_bytes: u64) {
        self.uploaded_size_mb.inc_by(size_bytes as f64 / MEGABYTE);
    }

    pub fn downloaded_logs(&self) -> u64 {
        self.downloaded_logs.get()
    }

    pub fn uploaded_logs(&self) -> u64 {
        self.uploaded_logs.get()
    }

    pub fn uploaded_megabytes(&self) -> f64 {
        self.uploaded_size_mb.get()
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> RecorderResult<Vec<u8>> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}
