use std::net::SocketAddr;

use metrics_exporter_prometheus::BuildError;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total wire queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "housebook_queries_total";

/// Histogram: wire query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "housebook_query_duration_seconds";

/// Counter: booking attempts and cancellations from the booking views.
/// Labels: resource (kitchen|projector), outcome.
pub const BOOKINGS_TOTAL: &str = "housebook_bookings_total";

/// Counter: resident logins. Labels: outcome (ok|blocked).
pub const LOGINS_TOTAL: &str = "housebook_logins_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "housebook_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "housebook_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "housebook_connections_rejected_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "housebook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "housebook_wal_flush_batch_size";

/// Counter: WAL compactions run by the background compactor.
pub const WAL_COMPACTIONS_TOTAL: &str = "housebook_wal_compactions_total";

/// Install the Prometheus exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
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
        Command::InsertResident { .. } => "insert_resident",
        Command::GrantAdmin { .. } => "grant_admin",
        Command::RevokeAdmin { .. } => "revoke_admin",
        Command::BlockResident { .. } => "block_resident",
        Command::UnblockResident { .. } => "unblock_resident",
        Command::InsertKitchenBooking { .. } => "insert_kitchen_booking",
        Command::DeleteKitchenBooking { .. } => "delete_kitchen_booking",
        Command::InsertProjectorBooking { .. } => "insert_projector_booking",
        Command::DeleteProjectorBooking { .. } => "delete_projector_booking",
        Command::SetConfig { .. } => "set_config",
        Command::Select { .. } => "select",
    }
}
