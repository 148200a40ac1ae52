// Prometheus metrics for the execution gateway
//
// Exposed on the /metrics HTTP endpoint when enabled:
// - Requests by outcome (counter)
// - Execution durations by outcome (histogram)
// - Executions in flight (gauge)

use lazy_static::lazy_static;
use prometheus::{Encoder, HistogramVec, IntCounterVec, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

use crate::tools::ExecutionResult;

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    pub static ref GATEWAY_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("gateway_requests_total", "Total number of gateway requests by outcome"),
        &["outcome"]
    ).expect("Failed to create gateway requests metric");

    pub static ref GATEWAY_EXECUTION_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "gateway_execution_duration_seconds",
            "Wall-clock duration of gateway requests in seconds"
        ),
        &["outcome"]
    ).expect("Failed to create execution duration metric");

    pub static ref GATEWAY_ACTIVE_EXECUTIONS: IntGauge = IntGauge::new(
        "gateway_active_executions",
        "Number of child processes currently running"
    ).expect("Failed to create active executions metric");
}

/// Initialize metrics registry - must be called once at startup
pub fn init() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(GATEWAY_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(GATEWAY_EXECUTION_DURATION_SECONDS.clone()))?;
    REGISTRY.register(Box::new(GATEWAY_ACTIVE_EXECUTIONS.clone()))?;
    Ok(())
}

/// Count a finished request under its outcome label
pub fn record_result(result: &ExecutionResult) {
    let outcome = result.outcome();
    GATEWAY_REQUESTS_TOTAL.with_label_values(&[outcome]).inc();
    GATEWAY_EXECUTION_DURATION_SECONDS
        .with_label_values(&[outcome])
        .observe(result.duration().as_secs_f64());
}

/// Holds the active-executions gauge up while alive
#[must_use]
pub struct ActiveExecution(());

impl ActiveExecution {
    pub fn start() -> Self {
        GATEWAY_ACTIVE_EXECUTIONS.inc();
        Self(())
    }
}

impl Drop for ActiveExecution {
    fn drop(&mut self) {
        GATEWAY_ACTIVE_EXECUTIONS.dec();
    }
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Rejection;
    use std::time::Duration;

    #[test]
    fn test_record_result_counts_outcome() {
        let before = GATEWAY_REQUESTS_TOTAL
            .with_label_values(&["rejected"])
            .get();

        record_result(&ExecutionResult::rejected(&Rejection::EmptyCommand));

        let after = GATEWAY_REQUESTS_TOTAL
            .with_label_values(&["rejected"])
            .get();
        assert!(after > before);
    }

    #[test]
    fn test_completed_outcome_label() {
        let result = ExecutionResult::Completed {
            stdout: String::new(),
            stderr: String::new(),
            status: 0,
            duration: Duration::from_millis(10),
        };
        record_result(&result);
        assert!(
            GATEWAY_REQUESTS_TOTAL
                .with_label_values(&["completed"])
                .get()
                >= 1
        );
    }

    #[test]
    fn test_gather_after_init() {
        // Registration fails on a second call within the same process, which is fine
        let _ = init();
        record_result(&ExecutionResult::faulted("boom", Duration::ZERO));

        let text = gather_metrics().unwrap();
        assert!(text.contains("gateway_requests_total"));
    }
}
