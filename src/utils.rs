//! Payload and name generation plus small formatting helpers.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// The value written by every create and set request.
///
/// Content is all zeroes; the benchmark never inspects payloads beyond
/// success or failure, only their size matters.
pub fn generate_payload(size: usize) -> Vec<u8> {
    vec![0u8; size]
}

/// Random alphanumeric node name of the given length.
pub fn random_node_name(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Render a microsecond latency for log lines.
pub fn format_micros(micros: u64) -> String {
    if micros < 1_000 {
        format!("{}us", micros)
    } else if micros < 1_000_000 {
        format!("{:.2}ms", micros as f64 / 1_000.0)
    } else {
        format!("{:.2}s", micros as f64 / 1_000_000.0)
    }
}
