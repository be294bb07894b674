//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Ticks**: Ticks received, price changes by direction, processing time
//! - **Stream**: Subscription state and stream errors by kind
//! - **Narration**: Outcomes, throttle suppressions and retries
//! - **Animation**: Departing-price queue depth and reaps
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::application::services::StreamState;
use crate::domain::pricing::PriceMove;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Later calls return the handle installed by the first one.
///
/// # Errors
///
/// Returns an error if another global recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();

    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Tick counters
    describe_counter!(
        "price_whisperer_ticks_received_total",
        "Total ticks decoded from the price feed"
    );
    describe_counter!(
        "price_whisperer_price_changes_total",
        "Total price changes by direction"
    );

    // Stream
    describe_gauge!(
        "price_whisperer_stream_state",
        "Subscription state (0 connecting, 1 streaming, 2 ended, 3 failed, 4 canceled)"
    );
    describe_counter!(
        "price_whisperer_stream_errors_total",
        "Total stream failures by kind"
    );

    // Narration
    describe_counter!(
        "price_whisperer_narrations_total",
        "Total narrations by outcome"
    );
    describe_counter!(
        "price_whisperer_narration_retries_total",
        "Total narration retries by speech error kind"
    );

    // Animation
    describe_gauge!(
        "price_whisperer_animation_queue_depth",
        "Departing prices still on screen"
    );
    describe_counter!(
        "price_whisperer_animations_reaped_total",
        "Total departing prices removed after their transition"
    );

    // Latency histograms
    describe_histogram!(
        "price_whisperer_tick_processing_seconds",
        "Time to fan one observation out to display, animation and narration"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

const fn stream_state_value(state: StreamState) -> f64 {
    match state {
        StreamState::Connecting => 0.0,
        StreamState::Streaming => 1.0,
        StreamState::Ended => 2.0,
        StreamState::Failed => 3.0,
        StreamState::Canceled => 4.0,
    }
}

/// Record a tick decoded from the feed.
pub fn record_tick_received() {
    counter!("price_whisperer_ticks_received_total").increment(1);
}

/// Record a price change.
pub fn record_price_change(direction: PriceMove) {
    counter!(
        "price_whisperer_price_changes_total",
        "direction" => direction.as_str()
    )
    .increment(1);
}

/// Update the subscription state.
pub fn set_stream_state(state: StreamState) {
    gauge!("price_whisperer_stream_state").set(stream_state_value(state));
}

/// Record a stream failure.
pub fn record_stream_error(kind: &'static str) {
    counter!(
        "price_whisperer_stream_errors_total",
        "kind" => kind
    )
    .increment(1);
}

/// Record how a narration ended.
pub fn record_narration(outcome: &'static str) {
    counter!(
        "price_whisperer_narrations_total",
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a narration dropped by the throttle.
pub fn record_narration_suppressed() {
    record_narration("suppressed");
}

/// Record a narration retry.
pub fn record_narration_retry(error_kind: &'static str) {
    counter!(
        "price_whisperer_narration_retries_total",
        "error" => error_kind
    )
    .increment(1);
}

/// Update the animation queue depth.
#[allow(clippy::cast_precision_loss)]
pub fn set_animation_queue_depth(depth: usize) {
    gauge!("price_whisperer_animation_queue_depth").set(depth as f64);
}

/// Record reaped animations.
pub fn record_animations_reaped(count: usize) {
    counter!("price_whisperer_animations_reaped_total").increment(count as u64);
}

/// Record tick processing duration.
pub fn record_processing_duration(duration: Duration) {
    histogram!("price_whisperer_tick_processing_seconds").record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_state_values_are_distinct() {
        let values = [
            StreamState::Connecting,
            StreamState::Streaming,
            StreamState::Ended,
            StreamState::Failed,
            StreamState::Canceled,
        ]
        .map(stream_state_value);

        for (i, a) in values.iter().enumerate() {
            for b in &values[i + 1..] {
                assert!((a - b).abs() > f64::EPSILON);
            }
        }
    }

    #[test]
    fn recording_without_recorder_is_a_noop() {
        record_tick_received();
        record_price_change(PriceMove::Up);
        record_narration_suppressed();
        set_animation_queue_depth(3);
        record_processing_duration(Duration::from_millis(1));
    }
}
