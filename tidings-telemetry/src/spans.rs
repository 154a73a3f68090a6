//! Span definitions.
//!
//! Pre-defined spans for the connection lifecycle and message delivery.

use tracing::{Span, info_span, debug_span};

/// Span covering one `connect()` call on the supervisor.
///
/// ```
/// use tidings_telemetry::spans::connect_span;
///
/// let span = connect_span(3, "closed");
/// let _guard = span.enter();
/// ```
#[must_use]
pub fn connect_span(channel_count: usize, circuit_state: &str) -> Span {
    info_span!(
        "realtime.connect",
        channels = channel_count,
        circuit = %circuit_state,
    )
}

/// Span covering one transport attempt.
#[must_use]
pub fn transport_span(method: &str, attempt: u32) -> Span {
    info_span!(
        "realtime.transport",
        transport.method = %method,
        attempt = attempt,
    )
}

/// Span covering one poll request.
#[must_use]
pub fn poll_span(session_id: &str, consecutive_failures: u32) -> Span {
    debug_span!(
        "realtime.poll",
        session_id = %session_id,
        failures = consecutive_failures,
    )
}

/// Span covering routing of one message.
#[must_use]
pub fn route_span(channel: &str, kind: &str) -> Span {
    debug_span!(
        "realtime.route",
        channel = %channel,
        message.type = %kind,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spans_construct_without_subscriber() {
        let spans = [
            connect_span(2, "closed"),
            transport_span("socket", 1),
            poll_span("sess_1", 0),
            route_span("comments_post_7", "new_comment"),
        ];
        for span in &spans {
            let _guard = span.enter();
        }
    }
}
