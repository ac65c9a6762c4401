use std::time::Duration;

use rand::Rng;

pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_WATCH_JITTER: Duration = Duration::from_secs(120);

/// Delay before the next watch-mode run: the interval plus up to
/// `jitter_max` of random spread.
pub fn next_run_delay(interval: Duration, jitter_max: Duration) -> Duration {
    if jitter_max.is_zero() {
        return interval;
    }
    let jitter_ms = rand::thread_rng().gen_range(0..=jitter_max.as_millis() as u64);
    interval + Duration::from_millis(jitter_ms)
}
