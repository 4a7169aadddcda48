// Politeness delays between remote calls.

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleSettings {
    /// Pause between the promote and demote phases of one swap.
    pub inter_phase: Duration,
    /// Pause between consecutive swaps.
    pub inter_swap: Duration,
    /// Upper bound of the random extra added to `inter_swap`.
    pub inter_swap_jitter: Duration,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            inter_phase: Duration::from_millis(300),
            inter_swap: Duration::from_millis(600),
            inter_swap_jitter: Duration::from_millis(400),
        }
    }
}

impl ThrottleSettings {
    /// No delays at all. Useful for dry runs and tests.
    pub fn none() -> Self {
        Self {
            inter_phase: Duration::ZERO,
            inter_swap: Duration::ZERO,
            inter_swap_jitter: Duration::ZERO,
        }
    }
}

/// `base` plus a uniformly random extra in `[0, jitter]`.
pub fn jittered(base: Duration, jitter: Duration) -> Duration {
    let max_ms = u64::try_from(jitter.as_millis()).unwrap_or(u64::MAX);
    if max_ms == 0 {
        return base;
    }
    let extra = rand::thread_rng().gen_range(0..=max_ms);
    base + Duration::from_millis(extra)
}

/// Sleep for a jittered duration. Zero durations return immediately.
pub async fn pause(base: Duration, jitter: Duration) {
    let delay = jittered(base, jitter);
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
