use std::collections::HashMap;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::ops::ControlFlow;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use quanta::Clock;
use quanta::Instant;

use crate::QuotaTier;
use crate::Reason;
use crate::SmoothedRate;
use crate::Strategy;
use crate::Sweep;

/// One counter per tier.
#[derive(Debug)]
enum Meter {
    /// A zero-amount tier admits nothing.
    Closed { period: Duration },
    Smoothed(SmoothedRate),
}

impl Meter {
    fn new(tier: &QuotaTier, clock: Clock) -> Self {
        match NonZeroUsize::new(tier.amount as usize) {
            Some(limit) => Meter::Smoothed(SmoothedRate::with_clock(limit, tier.period, clock)),
            None => Meter::Closed {
                period: tier.period,
            },
        }
    }
}

impl Strategy for Meter {
    fn process(&self) -> ControlFlow<Reason> {
        match self {
            Meter::Closed { period } => ControlFlow::Break(Reason::Overloaded {
                retry_after: *period,
            }),
            Meter::Smoothed(rate) => rate.process(),
        }
    }
}

#[derive(Debug)]
struct Client {
    meters: Vec<Meter>,
    last_seen: Instant,
}

/// Per-client, multi-tier admission for one protected operation.
///
/// Every client key gets its own independent counters, one per tier, created on first
/// sight. A request is admitted only when every tier has capacity. Tiers are evaluated
/// in ascending `amount × period` order and evaluation stops at the first tier that
/// rejects: tiers before it have consumed a unit, tiers after it are untouched.
///
/// The whole decision (lookup, lazy creation, consumption) runs under one lock, so
/// concurrent requests from the same client can never jointly overshoot a tier.
#[derive(Debug)]
pub struct Governor<K = String> {
    tiers: Vec<QuotaTier>,
    longest: Duration,
    clients: Mutex<HashMap<K, Client>>,
    clock: Clock,
}

impl<K> Governor<K>
where
    K: Hash + Eq,
{
    pub fn new(tiers: impl IntoIterator<Item = QuotaTier>) -> Self {
        Self::with_clock(tiers, Clock::new())
    }

    pub fn with_clock(tiers: impl IntoIterator<Item = QuotaTier>, clock: Clock) -> Self {
        let mut tiers: Vec<QuotaTier> = tiers.into_iter().collect();
        // `sort_by_key` is stable: equal weights keep their configured order.
        tiers.sort_by_key(QuotaTier::weight);
        let longest = tiers
            .iter()
            .map(|tier| tier.period)
            .max()
            .unwrap_or_default();

        Self {
            tiers,
            longest,
            clients: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Tiers in evaluation order.
    pub fn tiers(&self) -> &[QuotaTier] {
        &self.tiers
    }

    /// Admit or reject one request from `key`.
    pub fn is_allowed(&self, key: impl Into<K>) -> bool {
        self.check(key).is_continue()
    }

    /// Like [`Governor::is_allowed`], but a rejection carries the wait hint of the
    /// tier that rejected.
    pub fn check(&self, key: impl Into<K>) -> ControlFlow<Reason> {
        if self.tiers.is_empty() {
            return ControlFlow::Continue(());
        }

        let now = self.clock.now();
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        let client = clients.entry(key.into()).or_insert_with(|| Client {
            meters: self
                .tiers
                .iter()
                .map(|tier| Meter::new(tier, self.clock.clone()))
                .collect(),
            last_seen: now,
        });
        client.last_seen = now;

        client.meters.iter().try_for_each(Strategy::process)
    }

    /// Number of client keys currently tracked.
    pub fn len(&self) -> usize {
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K> Sweep for Governor<K>
where
    K: Hash + Eq,
{
    /// A client idle for the longest tier period has fully refilled every counter,
    /// so dropping it is indistinguishable from keeping it.
    fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        let before = clients.len();
        clients.retain(|_, client| now.duration_since(client.last_seen) < self.longest);
        before - clients.len()
    }
}
