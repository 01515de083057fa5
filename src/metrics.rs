use std::sync::OnceLock;

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus exporter and register all application metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload.
///
/// Safe to call more than once (tests build several routers); only the first
/// call installs the global recorder.
pub fn init_metrics() -> PrometheusHandle {
    HANDLE
        .get_or_init(|| {
            let handle = match PrometheusBuilder::new().install_recorder() {
                Ok(handle) => handle,
                Err(e) => {
                    // Another recorder is already global; keep a detached one
                    // so /metrics still renders.
                    tracing::warn!(error = %e, "Prometheus recorder not installed");
                    PrometheusBuilder::new().build_recorder().handle()
                }
            };

            // Pre-register counters so they appear even before the first increment.
            counter!("orders_created_total").absolute(0);
            counter!("offers_submitted_total").absolute(0);
            counter!("offers_accepted_total").absolute(0);
            counter!("tracking_steps_total").absolute(0);
            counter!("payments_captured_total").absolute(0);
            counter!("ledger_captures_total").absolute(0);
            counter!("ledger_releases_total").absolute(0);
            counter!("ledger_reversals_total").absolute(0);
            counter!("captures_after_cancel_total").absolute(0);

            handle
        })
        .clone()
}
