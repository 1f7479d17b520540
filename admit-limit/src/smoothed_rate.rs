use std::num::NonZeroUsize;
use std::ops::ControlFlow;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use quanta::Clock;
use quanta::Instant;

use crate::Reason;
use crate::Strategy;

/// Smoothed-rate counter in Generic Cell Rate form.
///
/// Refills continuously at `limit / period` with a burst capacity of `limit`: a fresh
/// counter admits `limit` requests at once, then one more every `period / limit`.
/// This is a token bucket tracked as a single Theoretical Arrival Time rather than a
/// token count, so one CAS covers both refill and consumption.
#[derive(Debug)]
pub struct SmoothedRate {
    /// Theoretical Arrival Time (TAT) in nanoseconds.
    tat: AtomicU64,
    emission_interval_ns: u64,
    delay_tolerance_ns: u64,
    clock: Clock,
    /// A fixed point in time (TSC tick) to calculate deltas from.
    anchor: Instant,
}

impl SmoothedRate {
    pub fn new(limit: NonZeroUsize, period: Duration) -> Self {
        Self::with_clock(limit, period, Clock::new())
    }

    pub fn with_clock(limit: NonZeroUsize, period: Duration, clock: Clock) -> Self {
        let anchor = clock.now();
        let period_ns = u64::try_from(period.as_nanos()).unwrap_or(u64::MAX);
        let emission_interval_ns = period_ns / limit.get() as u64;

        Self {
            tat: AtomicU64::new(0),
            emission_interval_ns,
            // Whole intervals only, so the burst is exactly `limit`.
            delay_tolerance_ns: emission_interval_ns.saturating_mul(limit.get() as u64),
            clock,
            anchor,
        }
    }

    /// Units that could be consumed right now without a rejection.
    pub fn remaining(&self) -> usize {
        if self.emission_interval_ns == 0 {
            return usize::MAX;
        }
        let now = self.elapsed_ns();
        let tat = self.tat.load(Ordering::Acquire);
        let total = self.delay_tolerance_ns / self.emission_interval_ns;

        if tat <= now {
            return total as usize;
        }

        // A partially drained interval still counts as used.
        let used = (tat - now).div_ceil(self.emission_interval_ns);
        total.saturating_sub(used) as usize
    }

    fn elapsed_ns(&self) -> u64 {
        let elapsed = self.clock.now().duration_since(self.anchor);
        u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX)
    }
}

impl Strategy for SmoothedRate {
    #[inline]
    fn process(&self) -> ControlFlow<Reason> {
        let now = self.elapsed_ns();
        let horizon = now.saturating_add(self.delay_tolerance_ns);

        loop {
            let tat = self.tat.load(Ordering::Acquire);

            let arrival = tat.max(now);
            let next_tat = arrival.saturating_add(self.emission_interval_ns);

            if next_tat > horizon {
                return ControlFlow::Break(Reason::Overloaded {
                    retry_after: Duration::from_nanos(next_tat - horizon),
                });
            }

            if self
                .tat
                .compare_exchange_weak(tat, next_tat, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                return ControlFlow::Continue(());
            }
        }
    }
}
