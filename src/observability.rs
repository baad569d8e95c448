use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "bookq_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "bookq_query_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "bookq_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "bookq_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "bookq_connections_rejected_total";

/// Gauge: number of tenants with a loaded dataset.
pub const TENANTS_ACTIVE: &str = "bookq_tenants_active";

/// Counter: rejected logins.
pub const AUTH_FAILURES_TOTAL: &str = "bookq_auth_failures_total";

/// Counter: dataset reloads. Labels: status.
pub const SNAPSHOT_RELOADS_TOTAL: &str = "bookq_snapshot_reloads_total";

/// Gauge: bookings in the most recently loaded snapshot.
pub const SNAPSHOT_RECORDS: &str = "bookq_snapshot_records";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::SelectBookings { .. } => "select_bookings",
        Command::SelectStats => "select_booking_stats",
        Command::SelectProperties => "select_properties",
        Command::Refresh => "refresh",
    }
}
