//! Fixed-width latency encoding.
//!
//! A round-trip time in `[0.0, 1.0]` seconds is stored as an unsigned
//! 16-bit value scaled by [`LATENCY_MAX`]. The top value is reserved as the
//! timeout sentinel, giving a resolution of roughly 15.26 µs and a ceiling
//! of exactly one second.

/// Encoded value meaning "no reply within budget".
pub const LATENCY_TIMEOUT: u16 = 65535;

/// Largest real sample; encodes exactly 1.0 second.
pub const LATENCY_MAX: u16 = 65534;

/// Encode the delta between a send and a receive timestamp.
///
/// A missing timestamp on either side means the probe timed out.
pub fn encode(sent: Option<f64>, received: Option<f64>) -> u16 {
    match (sent, received) {
        (Some(sent), Some(received)) => encode_seconds(received - sent),
        _ => LATENCY_TIMEOUT,
    }
}

/// Encode a latency given in seconds.
///
/// Negative, over-one-second and NaN deltas all clamp to the sentinel.
pub fn encode_seconds(delta: f64) -> u16 {
    if delta.is_nan() || !(0.0..=1.0).contains(&delta) {
        return LATENCY_TIMEOUT;
    }
    (delta * f64::from(LATENCY_MAX)).round() as u16
}

/// Decode a stored value back into seconds. `None` is a timeout.
pub fn decode(value: u16) -> Option<f64> {
    if value == LATENCY_TIMEOUT {
        None
    } else {
        Some(f64::from(value) / f64::from(LATENCY_MAX))
    }
}
