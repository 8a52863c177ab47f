use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{env, path::PathBuf};

use crate::services::{aws::DEFAULT_REGION, bucket_client::BUCKET_ENV_VAR};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub command: Command,
    pub debug: bool,
    pub start: String,
    pub finish: String,
    pub bucket: String,
    pub db_identifier: String,
    pub metrics_host: String,
    pub metrics_port: u16,
    pub tmp_dir: PathBuf,
    pub region: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(
    name = "rdsrecorder",
    author,
    version,
    about = "Record RDS PostgreSQL logs into S3 and snapshot the database"
)]
pub struct Args {
    /// Enable debug logs (ignored when RUST_LOG is set)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Window start, e.g. "2024-02-23 08:30:00.000 UTC"
    #[arg(long, global = true, default_value = "")]
    pub start: String,

    /// Window end, same layout as --start
    #[arg(long, global = true, default_value = "")]
    pub finish: String,

    /// Destination bucket
    #[arg(long, global = true, env = BUCKET_ENV_VAR, default_value = "")]
    pub bucket: String,

    /// RDS instance identifier
    #[arg(long, global = true, default_value = "")]
    pub db_identifier: String,

    /// Address the metrics server binds to
    #[arg(long, global = true, default_value = "0.0.0.0")]
    pub metrics_address: String,

    /// Port the metrics server binds to
    #[arg(long, global = true, default_value_t = 9445)]
    pub metrics_port: u16,

    /// Directory for staging files
    #[arg(long, global = true, env = "RDSRECORDER_TMP_DIR", default_value = "/var/tmp")]
    pub tmp_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Archive the logs of [start, finish] and snapshot the database at start
    Sync,
    /// Snapshot the database at start, or a few seconds from now
    Snapshot,
    /// Print the process identifier of this run and exit
    Pid,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let region = match env::var("AWS_REGION") {
            Ok(value) if !value.trim().is_empty() => value,
            Ok(_) | Err(env::VarError::NotPresent) => DEFAULT_REGION.to_string(),
            Err(err) => return Err(err).context("reading AWS_REGION"),
        };

        Ok(Self::from_args(args, region))
    }

    pub fn from_args(args: Args, region: String) -> Self {
        Self {
            command: args.command,
            debug: args.debug,
            start: args.start,
            finish: args.finish,
            bucket: args.bucket,
            db_identifier: args.db_identifier,
            metrics_host: args.metrics_address,
            metrics_port: args.metrics_port,
            tmp_dir: args.tmp_dir,
            region,
        }
    }

    pub fn metrics_addr(&self) -> String {
        format!("{}:{}", self.metrics_host, self.metrics_port)
    }
}
