use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

static TABLES_COPIED_TOTAL: AtomicU64 = AtomicU64::new(0);
static COPY_FAILURES_TOTAL: AtomicU64 = AtomicU64::new(0);
static TABLES_REMAINING: AtomicU64 = AtomicU64::new(0);

fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Records a completed table copy as a structured log entry.
pub fn record_copy_latency(run_id: Uuid, table: &str, rows: u64, duration: Duration) {
    let total = TABLES_COPIED_TOTAL.fetch_add(1, Ordering::Relaxed) + 1;
    info!(
        metric = "copy_latency_ms",
        run_id = %run_id,
        table,
        rows,
        latency_ms = duration_ms(duration),
        tables_copied_total = total
    );
}

/// Marks a per-table copy failure for observability logs.
pub fn record_copy_failure(run_id: Uuid, table: &str, error: &str) {
    let total = COPY_FAILURES_TOTAL.fetch_add(1, Ordering::Relaxed) + 1;
    warn!(
        metric = "copy_failure",
        run_id = %run_id,
        table,
        error,
        copy_failures_total = total
    );
}

/// Records a drained extraction stage.
pub fn record_stage_drained(run_id: Uuid, stage: usize, tables: usize, duration: Duration) {
    info!(
        metric = "stage_drained",
        run_id = %run_id,
        stage,
        tables,
        latency_ms = duration_ms(duration)
    );
}

/// Sets the tables-remaining gauge and logs the change.
pub fn set_tables_remaining(run_id: Uuid, remaining: u64) {
    TABLES_REMAINING.store(remaining, Ordering::Relaxed);
    info!(metric = "tables_remaining_gauge", run_id = %run_id, remaining);
}
