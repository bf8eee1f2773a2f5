use std::time::Duration;

use chrono::Utc;
use common::engine::Reconciler;
use tracing::{error, info};

/// Run storage reconciliation as a background task.
pub async fn run_reconciler(reconciler: Reconciler, interval_secs: u64) {
    let settings = reconciler.settings();
    info!(
        interval_secs,
        grace_secs = settings.grace.num_seconds(),
        dry_run = settings.dry_run,
        "Starting storage reconciler"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));

    loop {
        interval.tick().await;

        match reconciler.run_once(Utc::now()).await {
            Ok(report) if report.is_clean() && report.failures == 0 => {}
            Ok(report) => info!(
                orphan_objects = report.orphan_objects.len(),
                ghost_rows = report.ghost_rows.len(),
                detached_rows = report.detached_rows.len(),
                failures = report.failures,
                dry_run = report.dry_run,
                "Reconciliation pass finished with changes"
            ),
            Err(e) => error!(error = %e, "Reconciliation pass failed"),
        }
    }
}
