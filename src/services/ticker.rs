//! Wall-clock ticker: first tick at `start_at`, then every `period`.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Emit `start_at + k * period` for k = 0, 1, 2, ... until `cancel` fires.
///
/// Each tick is delivered once its instant has passed. The channel holds a
/// single tick, so a slow consumer delays the generator instead of letting
/// ticks pile up.
pub fn every(
    start_at: DateTime<Utc>,
    period: Duration,
    cancel: CancellationToken,
) -> mpsc::Receiver<DateTime<Utc>> {
    let (tx, rx) = mpsc::channel(1);
    let step = chrono::Duration::from_std(period).unwrap_or(chrono::Duration::hours(1));

    tokio::spawn(async move {
        let mut tick = start_at;
        loop {
            let wait = (tick - Utc::now()).to_std().unwrap_or_default();
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                sent = tx.send(tick) => if sent.is_err() { break },
            }
            tick += step;
        }
    });

    rx
}
