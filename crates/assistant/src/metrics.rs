use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    pub static ref QUESTIONS_TOTAL: IntCounter = register_int_counter!(
        "askdb_questions_total",
        "Total number of questions submitted."
    )
    .expect("register askdb_questions_total");
    pub static ref RUN_OUTCOMES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "askdb_run_outcomes_total",
        "Workflow runs by outcome.",
        &["outcome"]
    )
    .expect("register askdb_run_outcomes_total");
    pub static ref SQL_ERRORS_TOTAL: IntCounter = register_int_counter!(
        "askdb_sql_errors_total",
        "Total number of failed SQL executions."
    )
    .expect("register askdb_sql_errors_total");
    pub static ref QUERY_REGENERATIONS_TOTAL: IntCounter = register_int_counter!(
        "askdb_query_regenerations_total",
        "Total number of question reformulations after a failed execution."
    )
    .expect("register askdb_query_regenerations_total");
}

/// Gather the default registry in the Prometheus text format.
pub fn gather_metrics() -> String {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
