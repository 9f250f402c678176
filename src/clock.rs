use std::time::{Duration, Instant};

use spin_sleep::SpinSleeper;
use twig_motor::Clock;

/// Millisecond clock for running the scheduler on a desktop OS.
///
/// Cooperative waits sleep for a short slice instead of spinning, which lets
/// several motor threads share a core.
pub struct HostClock {
    origin: Instant,
    sleeper: SpinSleeper,
    slice: Duration,
}

impl HostClock {
    pub fn new() -> Self {
        Self::with_slice(Duration::from_micros(250))
    }

    pub fn with_slice(slice: Duration) -> Self {
        Self {
            origin: Instant::now(),
            sleeper: SpinSleeper::new(100_000),
            slice,
        }
    }
}

impl Default for HostClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for HostClock {
    fn now_ms(&mut self) -> u32 {
        // Wraps after ~49 days, like a microcontroller millis() counter
        self.origin.elapsed().as_millis() as u32
    }

    fn yield_now(&mut self) {
        self.sleeper.sleep(self.slice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_clock_advances() {
        let mut clock = HostClock::with_slice(Duration::from_millis(2));
        let start = clock.now_ms();
        clock.yield_now();
        clock.yield_now();
        assert!(clock.now_ms().wrapping_sub(start) >= 4);
    }
}
