//! Background ingestion scheduler.
//!
//! Runs one worker per interval. Each tick a worker polls the newest bars of
//! every instrument, repairs a few queued day windows and, once a day, prunes
//! rows past the retention horizon.

use std::sync::Arc;

use barline_core::{IngestionService, IngestionState, RepairQueue};
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::main_lib::AppState;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Runs every worker until Ctrl-C.
pub async fn run(state: Arc<AppState>) -> anyhow::Result<()> {
    info!(
        "Ingestion scheduler started: {} instrument(s) x {} interval(s), polling every {:?}",
        state.config.instruments.len(),
        state.services.len(),
        state.config.poll_interval
    );

    let workers = state
        .services
        .iter()
        .cloned()
        .map(|service| run_worker(service, state.config.poll_interval));

    tokio::select! {
        _ = futures::future::join_all(workers) => {}
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutdown requested");
        }
    }

    Ok(())
}

async fn run_worker(service: Arc<IngestionService>, poll_interval: Duration) {
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut queue = RepairQueue::new();
    let mut last_cleanup: Option<Instant> = None;

    loop {
        ticker.tick().await;

        if service.state() == IngestionState::Uninitialized {
            match service.initialize().await {
                Ok(reports) => {
                    let written: usize = reports.iter().map(|r| r.written).sum();
                    let failed = reports.iter().filter(|r| r.failure.is_some()).count();
                    info!(
                        "{} backfill complete: {} candle(s) written, {} instrument(s) left to repair",
                        service.interval(),
                        written,
                        failed
                    );
                }
                Err(e) => {
                    // Retried on the next tick
                    warn!("{} initialization failed ({:?}): {}", service.interval(), e.kind(), e);
                    continue;
                }
            }
        }

        poll_realtime(&service).await;
        run_repairs(&service, &mut queue).await;

        let now = Instant::now();
        if cleanup_due(last_cleanup, now) {
            match service.cleanup_old_data().await {
                Ok(pruned) => {
                    debug!("{} retention pass pruned {} row(s)", service.interval(), pruned);
                    last_cleanup = Some(now);
                }
                Err(e) => warn!("{} retention pass failed: {}", service.interval(), e),
            }
        }
    }
}

async fn poll_realtime(service: &IngestionService) {
    for instrument in service.instruments() {
        match service.fetch_realtime(instrument).await {
            Ok(report) => {
                debug!(
                    "{} {} via {:?}: fetched {}, wrote {}",
                    instrument,
                    service.interval(),
                    report.tier,
                    report.fetched,
                    report.written
                );
                if let Some(catch_up) = report.catch_up {
                    info!(
                        "{} {} caught up: {} candle(s) written over {} page(s)",
                        instrument,
                        service.interval(),
                        catch_up.written,
                        catch_up.pages
                    );
                }
            }
            Err(e) => warn!(
                "{} {} poll failed ({:?}): {}",
                instrument,
                service.interval(),
                e.kind(),
                e
            ),
        }
    }
}

async fn run_repairs(service: &IngestionService, queue: &mut RepairQueue) {
    match service.run_repair_cycle(queue).await {
        Ok(reports) => {
            for report in reports.iter().filter(|r| r.written > 0) {
                info!(
                    "{} {} repaired [{}, {}): {} candle(s) written",
                    report.instrument,
                    service.interval(),
                    report.start,
                    report.end,
                    report.written
                );
            }
        }
        Err(e) => warn!("{} repair cycle failed ({:?}): {}", service.interval(), e.kind(), e),
    }
}

fn cleanup_due(last: Option<Instant>, now: Instant) -> bool {
    last.map_or(true, |at| now.duration_since(at) >= CLEANUP_INTERVAL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_runs_first_then_daily() {
        let start = Instant::now();
        assert!(cleanup_due(None, start));
        assert!(!cleanup_due(Some(start), start + Duration::from_secs(3600)));
        assert!(cleanup_due(Some(start), start + CLEANUP_INTERVAL));
    }
}
