mod http;

use prometheus::{exponential_buckets, HistogramVec, IntCounter, IntCounterVec, IntGauge};

pub use self::http::PrometheusServer;
use lazy_static::lazy_static;

lazy_static! {
    pub static ref TOTAL_CONNECTION_PROCESSED: IntCounter = register_int_counter!(
        "cachette_total_connection_processed_total",
        "Total connection processed"
    )
    .unwrap();
    pub static ref REQUEST_COUNTER: IntCounter =
        register_int_counter!("cachette_requests_total", "Request counter").unwrap();
    pub static ref CURRENT_CONNECTION_COUNTER: IntGauge = register_int_gauge!(
        "cachette_current_connections",
        "Current connection counter"
    )
    .unwrap();
    pub static ref REQUEST_CMD_COUNTER: IntCounterVec = register_int_counter_vec!(
        "cachette_command_requests_total",
        "Request command counter",
        &["cmd"]
    )
    .unwrap();
    pub static ref REQUEST_CMD_FINISH_COUNTER: IntCounterVec = register_int_counter_vec!(
        "cachette_command_requests_finish_total",
        "Request command finish counter",
        &["cmd"]
    )
    .unwrap();
    pub static ref REQUEST_CMD_ERROR_COUNTER: IntCounterVec = register_int_counter_vec!(
        "cachette_command_requests_error_total",
        "Request command error counter",
        &["cmd"]
    )
    .unwrap();
    pub static ref REQUEST_CMD_HANDLE_TIME: HistogramVec = register_histogram_vec!(
        "cachette_command_handle_time_duration_seconds",
        "Bucketed histogram of command handle duration",
        &["cmd"],
        exponential_buckets(0.0005, 2.0, 20).unwrap()
    )
    .unwrap();
    pub static ref REMOVED_EXPIRED_KEY_COUNTER: IntCounterVec = register_int_counter_vec!(
        "cachette_removed_expired_keys_count_total",
        "The number of expired keys that have been removed",
        &["kind"]
    )
    .unwrap();
    pub static ref EVICTED_KEY_COUNTER: IntCounter = register_int_counter!(
        "cachette_evicted_keys_count_total",
        "The number of keys evicted under capacity pressure"
    )
    .unwrap();
}
