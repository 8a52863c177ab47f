use anyhow::{Context, Result};
use axum::Router;
use std::{io::ErrorKind, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

use config::{AppConfig, Command};
use models::run::RunHandle;
use services::{
    aws::{self, AwsDbLogSource, AwsObjectStore},
    metrics::Metrics,
    planner::{Recorder, RecorderSettings},
};

/// Time left for a last scrape before the metrics server goes away.
const METRICS_DRAIN: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<()> {
    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;

    // --- Logging setup ---
    let default_level = if cfg.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    // --- Run identity ---
    let run = RunHandle::from_env().context("generating the process id")?;
    if cfg.command == Command::Pid {
        println!("{}", run.pid());
        return Ok(());
    }
    tracing::info!(
        pid = run.pid(),
        recovery = run.is_recovery(),
        command = ?cfg.command,
        "starting rdsrecorder"
    );
    tracing::debug!("config: {:?}", cfg);

    // --- AWS clients ---
    let sdk_config = aws::load_provider_config(&cfg.region).await;
    aws::verify_credentials(&sdk_config).await?;

    // --- Metrics server ---
    let metrics = Metrics::new()?;
    let server_shutdown = CancellationToken::new();
    let server = tokio::spawn(serve_metrics(
        cfg.clone(),
        metrics.clone(),
        server_shutdown.clone(),
    ));

    // --- Host signals cancel the run ---
    tokio::spawn(cancel_on_signal(run.clone()));

    // --- Dispatch ---
    let recorder = Recorder::new(
        Arc::new(AwsDbLogSource::new(&sdk_config)),
        Arc::new(AwsObjectStore::new(&sdk_config)),
        run.clone(),
        metrics,
        RecorderSettings {
            tmp_dir: cfg.tmp_dir.clone(),
            ..RecorderSettings::default()
        },
    );
    let result = match cfg.command {
        Command::Sync => {
            recorder
                .start_sync_process(&cfg.db_identifier, &cfg.start, &cfg.finish, &cfg.bucket)
                .await
        }
        Command::Snapshot => {
            recorder
                .start_snapshot_process(&cfg.db_identifier, &cfg.start)
                .await
        }
        Command::Pid => Ok(()),
    };

    // --- Shutdown ---
    tokio::time::sleep(METRICS_DRAIN).await;
    server_shutdown.cancel();
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::error!("metrics server failed: {:#}", err),
        Err(err) => tracing::error!("metrics server task failed: {}", err),
    }

    result.with_context(|| format!("{:?} command failed, pid: {}", cfg.command, run.pid()))?;
    tracing::info!(pid = run.pid(), "rdsrecorder finished");
    Ok(())
}

/// Serve `/metrics` and `/healthz` until `shutdown` fires.
async fn serve_metrics(cfg: AppConfig, metrics: Metrics, shutdown: CancellationToken) -> Result<()> {
    let app: Router = routes::routes::routes().with_state(metrics);

    let addr = cfg.metrics_addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.metrics_host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.metrics_port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err).with_context(|| format!("binding metrics server to {}", addr)),
    };

    tracing::info!("Metrics server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

/// Cancel the run on SIGINT or SIGTERM.
async fn cancel_on_signal(run: RunHandle) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!("unable to listen for SIGINT: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!("unable to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, cancelling the run"),
        _ = terminate => tracing::info!("received SIGTERM, cancelling the run"),
        _ = run.cancel_signal().cancelled() => return,
    }
    run.cancel();
}
