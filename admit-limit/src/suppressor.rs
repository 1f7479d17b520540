use std::hash::Hash;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use quanta::Clock;
use quanta::Instant;

use crate::Sweep;

/// Cool-down applied when none is configured.
pub const DEFAULT_COOL_DOWN: Duration = Duration::from_secs(30 * 60);

/// Suppresses a repeated one-shot side effect (e.g. a view increment) for the same
/// `(resource, client)` pair within a cool-down window.
///
/// The check and the timestamp update happen under the pair's shard lock, so two
/// concurrent first observations of a pair cannot both be told to apply.
#[derive(Debug)]
pub struct Suppressor<R = String, C = String>
where
    R: Eq + Hash,
    C: Eq + Hash,
{
    seen: DashMap<(R, C), Instant>,
    cool_down: Duration,
    clock: Clock,
}

impl<R, C> Suppressor<R, C>
where
    R: Eq + Hash,
    C: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_cool_down(DEFAULT_COOL_DOWN)
    }

    pub fn with_cool_down(cool_down: Duration) -> Self {
        Self::with_clock(cool_down, Clock::new())
    }

    pub fn with_clock(cool_down: Duration, clock: Clock) -> Self {
        Self {
            seen: DashMap::new(),
            cool_down,
            clock,
        }
    }

    pub fn cool_down(&self) -> Duration {
        self.cool_down
    }

    /// Returns `true` if the side effect should be applied now, recording the
    /// application. Returns `false`, without touching the record, if it was already
    /// applied for this pair within the cool-down.
    pub fn should_apply(&self, resource: impl Into<R>, client: impl Into<C>) -> bool {
        let now = self.clock.now();

        match self.seen.entry((resource.into(), client.into())) {
            Entry::Occupied(mut entry) => {
                if now.duration_since(*entry.get()) < self.cool_down {
                    false
                } else {
                    entry.insert(now);
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }

    /// Number of pairs currently remembered.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl<R, C> Default for Suppressor<R, C>
where
    R: Eq + Hash,
    C: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R, C> Sweep for Suppressor<R, C>
where
    R: Eq + Hash,
    C: Eq + Hash,
{
    /// An absent pair behaves exactly like one whose cool-down has passed.
    fn sweep(&self) -> usize {
        let now = self.clock.now();
        let before = self.seen.len();
        self.seen
            .retain(|_, applied| now.duration_since(*applied) < self.cool_down);
        before.saturating_sub(self.seen.len())
    }
}
