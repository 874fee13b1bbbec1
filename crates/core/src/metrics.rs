//! Prometheus metrics for the ticket engine.
//!
//! This module provides metrics for:
//! - Engine operations (create/update/delete/subscribe by result)
//! - Dispatch loops and subscriptions currently alive
//! - Snapshot delivery (delivered, lagged, failed recomputes)

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Operations
// =============================================================================

/// Engine operations by operation and result.
pub static ENGINE_OPERATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ticketdesk_engine_operations_total",
            "Ticket engine operations processed by dispatch loops",
        ),
        &["operation", "result"], // result: "ok", "validation", "not_found", "backend_unavailable"
    )
    .unwrap()
});

// =============================================================================
// Dispatch loops and subscriptions
// =============================================================================

/// Per-user dispatch loops currently running.
pub static DISPATCH_LOOPS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "ticketdesk_dispatch_loops_active",
        "Number of running per-user dispatch loops",
    )
    .unwrap()
});

/// Registered snapshot listeners.
pub static SUBSCRIPTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "ticketdesk_subscriptions_active",
        "Number of registered snapshot listeners",
    )
    .unwrap()
});

// =============================================================================
// Snapshot delivery
// =============================================================================

/// Snapshots handed to listener channels.
pub static SNAPSHOTS_DELIVERED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "ticketdesk_snapshots_delivered_total",
        "Snapshots pushed to listener channels",
    )
    .unwrap()
});

/// Snapshots a slow listener never saw because newer ones replaced them.
pub static SNAPSHOTS_LAGGED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "ticketdesk_snapshots_lagged_total",
        "Snapshots dropped because a listener fell behind",
    )
    .unwrap()
});

/// Snapshot recomputes that failed after a successful mutation.
pub static SNAPSHOT_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "ticketdesk_snapshot_failures_total",
        "Snapshot recomputes that failed to read the collection",
    )
    .unwrap()
});

/// All core metrics, for registration in the server's registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(ENGINE_OPERATIONS.clone()),
        Box::new(DISPATCH_LOOPS_ACTIVE.clone()),
        Box::new(SUBSCRIPTIONS_ACTIVE.clone()),
        Box::new(SNAPSHOTS_DELIVERED.clone()),
        Box::new(SNAPSHOTS_LAGGED.clone()),
        Box::new(SNAPSHOT_FAILURES.clone()),
    ]
}
