//! Time source and wait policy for the step scheduler.

/// A monotonic millisecond counter.
///
/// The counter is allowed to wrap at `u32::MAX`, like a microcontroller's
/// `millis()`; the scheduler only ever looks at wrapping differences between
/// two readings.
pub trait Clock {
    /// Returns the current time in milliseconds.
    fn now_ms(&mut self) -> u32;

    /// Gives other work a chance to run between two time checks.
    ///
    /// Called by the scheduler under [`SchedulingPolicy::Cooperative`].
    /// The default is a spin-loop hint, which is all a bare-metal target
    /// without a scheduler can do.
    fn yield_now(&mut self) {
        core::hint::spin_loop();
    }
}

impl<C: Clock + ?Sized> Clock for &mut C {
    fn now_ms(&mut self) -> u32 {
        (**self).now_ms()
    }

    fn yield_now(&mut self) {
        (**self).yield_now()
    }
}

/// Milliseconds elapsed from `since` to `now`, correct across one counter wrap.
#[inline]
pub fn elapsed_ms(now: u32, since: u32) -> u32 {
    now.wrapping_sub(since)
}

/// How the scheduler waits between step deadlines.
///
/// Both policies check the clock on every iteration and give the same step
/// timing; they only differ in what happens between checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SchedulingPolicy {
    /// Spin on the clock without ever handing control to [`Clock::yield_now`].
    #[default]
    Blocking,
    /// Call [`Clock::yield_now`] between checks.
    Cooperative,
}

impl SchedulingPolicy {
    /// Waits once according to the policy.
    pub fn wait<C: Clock + ?Sized>(self, clock: &mut C) {
        match self {
            SchedulingPolicy::Blocking => core::hint::spin_loop(),
            SchedulingPolicy::Cooperative => clock.yield_now(),
        }
    }
}
