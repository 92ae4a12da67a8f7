use std::time::Duration;

// ---

use tokio::time::Instant;

// ---------------------------------------------------------------------------
// SimClock
// ---------------------------------------------------------------------------

/// Simulated clock shared by every process of one simulation.
///
/// The clock is a copyable handle to the instant the simulation started.
/// Create it inside the runtime, before any process sleeps, so that all
/// timestamps are measured from the same origin.
#[derive(Debug, Clone, Copy)]
pub struct SimClock {
    // ---
    origin: Instant,
}

// ---

impl SimClock {
    // ---
    /// Start a clock at the runtime's current instant (time zero).
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    // ---

    /// Simulated units elapsed since [`SimClock::start`].
    pub fn now(&self) -> f64 {
        Instant::now().duration_since(self.origin).as_secs_f64()
    }

    // ---

    /// Suspend the calling process for `units` simulated units.
    ///
    /// Negative and NaN durations are treated as zero.
    pub async fn sleep(&self, units: f64) {
        // ---
        tokio::time::sleep(units_to_duration(units)).await;
    }

    // ---

    /// Suspend the calling process until simulated time `at`.
    ///
    /// Returns immediately if `at` is already in the past.
    pub async fn sleep_until(&self, at: f64) {
        // ---
        match self.origin.checked_add(units_to_duration(at)) {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}

// ---

fn units_to_duration(units: f64) -> Duration {
    // ---
    if units.is_nan() || units <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(units).unwrap_or(Duration::MAX)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_advances_virtual_time_exactly() {
        // ---
        let clock = SimClock::start();
        assert_eq!(clock.now(), 0.0);

        clock.sleep(80.0).await;
        assert_eq!(clock.now(), 80.0);

        clock.sleep(0.1).await;
        assert!((clock.now() - 80.1).abs() < 1e-9, "now = {}", clock.now());
    }

    // ---

    #[tokio::test(start_paused = true)]
    async fn sleep_until_past_returns_immediately() {
        // ---
        let clock = SimClock::start();
        clock.sleep_until(5.0).await;
        assert_eq!(clock.now(), 5.0);

        clock.sleep_until(2.0).await;
        assert_eq!(clock.now(), 5.0);
    }

    // ---

    #[test]
    fn bogus_durations_clamp_to_zero() {
        // ---
        assert_eq!(units_to_duration(-1.0), Duration::ZERO);
        assert_eq!(units_to_duration(f64::NAN), Duration::ZERO);
        assert_eq!(units_to_duration(1.5), Duration::from_millis(1_500));
        assert_eq!(units_to_duration(f64::INFINITY), Duration::MAX);
    }
}
