//! ID generation utilities for trainr
//!
//! Provides run id generation and the monotonic sequence used to disambiguate
//! artifact file names saved within the same wall-clock instant.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

/// Generate a unique run ID
///
/// Format: `{timestamp_ms}-{random_hex}`
/// Example: `1738300800123-a1b2`
pub fn generate_run_id() -> String {
    let timestamp = now_ms();
    let random: u16 = rand::rng().random();
    format!("{}-{:04x}", timestamp, random)
}

static LAST_SEQ: AtomicU64 = AtomicU64::new(0);

/// Next artifact sequence number, strictly increasing per process.
///
/// Starts from the millisecond clock so sequences also order across restarts,
/// and bumps past the previous value when two saves land on the same tick.
pub fn next_artifact_seq() -> u64 {
    let now = now_ms();
    let mut prev = LAST_SEQ.load(Ordering::Relaxed);
    loop {
        let next = now.max(prev + 1);
        match LAST_SEQ.compare_exchange_weak(prev, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(observed) => prev = observed,
        }
    }
}
