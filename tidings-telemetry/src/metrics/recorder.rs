//! Pre-defined realtime client metrics.

use metrics::{counter, describe_counter, describe_gauge, gauge};

/// Metrics for the realtime client.
///
/// Naming convention: `tidings_<area>_<metric>[_total]`.
pub struct TidingsMetrics;

impl TidingsMetrics {
    /// Registers all metric descriptions.
    pub fn register() {
        describe_counter!(
            "tidings_connect_attempts_total",
            "Transport connection attempts by method"
        );
        describe_counter!(
            "tidings_transport_failures_total",
            "Transport failures by method"
        );
        describe_counter!(
            "tidings_reconnects_scheduled_total",
            "Reconnect attempts scheduled by the supervisor"
        );
        describe_counter!(
            "tidings_circuit_opened_total",
            "Times realtime delivery was disabled by the circuit breaker"
        );
        describe_gauge!(
            "tidings_connected",
            "Connection status by method (1=connected, 0=disconnected)"
        );
        describe_counter!(
            "tidings_poll_failures_total",
            "Failed poll requests"
        );
        describe_counter!(
            "tidings_poll_sessions_created_total",
            "Poll sessions created, including re-creation after expiry"
        );
        describe_counter!(
            "tidings_messages_routed_total",
            "Messages routed by category"
        );
        describe_counter!(
            "tidings_handler_failures_total",
            "Handler errors and panics by category"
        );
    }

    /// Records a transport connection attempt.
    pub fn connect_attempt(method: &str) {
        counter!("tidings_connect_attempts_total", "method" => method.to_string()).increment(1);
    }

    /// Records a transport failure.
    pub fn transport_failed(method: &str) {
        counter!("tidings_transport_failures_total", "method" => method.to_string()).increment(1);
    }

    /// Records a scheduled reconnect.
    pub fn reconnect_scheduled(method: &str) {
        counter!("tidings_reconnects_scheduled_total", "method" => method.to_string())
            .increment(1);
    }

    /// Records the circuit opening.
    pub fn circuit_opened() {
        counter!("tidings_circuit_opened_total").increment(1);
    }

    /// Records connection status for a method.
    pub fn set_connected(method: &str, connected: bool) {
        gauge!("tidings_connected", "method" => method.to_string())
            .set(if connected { 1.0 } else { 0.0 });
    }

    /// Records a failed poll.
    pub fn poll_failed(status: &str) {
        counter!("tidings_poll_failures_total", "status" => status.to_string()).increment(1);
    }

    /// Records a poll session creation.
    pub fn poll_session_created() {
        counter!("tidings_poll_sessions_created_total").increment(1);
    }

    /// Records a routed message.
    pub fn message_routed(category: &str) {
        counter!("tidings_messages_routed_total", "category" => category.to_string())
            .increment(1);
    }

    /// Records a handler failure.
    pub fn handler_failed(category: &str) {
        counter!("tidings_handler_failures_total", "category" => category.to_string())
            .increment(1);
    }
}
