use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Registry, opts,
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry,
};
use std::sync::LazyLock;

pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

const METRIC_CONTEXT: &str = "dbreach metrics registry";

trait ResultExt<T> {
    fn or_exit(self, context: &str) -> T;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn or_exit(self, context: &str) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                eprintln!("cannot register metric ({context}): {err}");
                std::process::exit(1);
            }
        }
    }
}

/// Probe outcomes by resource type, `outcome` is one of
/// success, empty, failed, unsupported, skipped, panicked
pub static PROBES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec_with_registry!(
        opts!(
            "dbreach_probes_total",
            "Total connectivity probes by resource type and outcome"
        ),
        &["resource_type", "outcome"],
        &REGISTRY
    )
    .or_exit(METRIC_CONTEXT)
});

pub static PROBE_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec_with_registry!(
        HistogramOpts::new(
            "dbreach_probe_duration_seconds",
            "Duration of connect, query and disconnect in seconds"
        ),
        &["resource_type"],
        &REGISTRY
    )
    .or_exit(METRIC_CONTEXT)
});

pub static CONFIG_LOAD_ERRORS: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter_with_registry!(
        opts!(
            "dbreach_config_load_errors_total",
            "Total failed attempts to load the connector configuration"
        ),
        &REGISTRY
    )
    .or_exit(METRIC_CONTEXT)
});

pub static LAST_RUN: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge_with_registry!(
        opts!(
            "dbreach_last_run_timestamp_seconds",
            "Unix timestamp of the last completed test run"
        ),
        &REGISTRY
    )
    .or_exit(METRIC_CONTEXT)
});

/// Encode metrics to prometheus text format
///
/// # Errors
///
/// Returns an error if metrics cannot be encoded
pub fn encode_metrics() -> Result<Vec<u8>, String> {
    let mut buffer = Vec::new();
    let encoder = prometheus::TextEncoder::new();

    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| format!("failed to encode metrics: {e}"))?;

    Ok(buffer)
}
