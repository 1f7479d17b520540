//! # admit-limit
//!
//! `admit-limit` decides, per client and per protected operation, whether a request may
//! proceed right now, and suppresses repeated side effects from the same client.
//!
//! ## Key Concepts
//!
//! * **Quota Tier**: "at most `amount` events per `period`". See [`QuotaTier`].
//! * **Governor**: holds an ordered set of tiers and lazily creates one
//!   [`SmoothedRate`] counter per tier for every client key it sees. A request is
//!   admitted only when *every* tier has capacity.
//! * **Suppressor**: remembers when a side effect was last applied for a
//!   `(resource, client)` pair and ignores repeats inside a cool-down window.
//! * **Sweep**: both maps grow with client cardinality. [`Sweep::sweep`] drops entries
//!   that are indistinguishable from fresh state, so sweeping never changes a decision.
//!
//! Time is read from an injectable [`quanta::Clock`], which makes every component
//! deterministic under `Clock::mock()`.
//!
//! ## Example
//!
//! ```rust
//! use admit_limit::Governor;
//! use admit_limit::QuotaTier;
//! use std::time::Duration;
//!
//! let governor: Governor = Governor::new(vec![
//!     QuotaTier::new(3, Duration::from_secs(1)),
//!     QuotaTier::new(60, Duration::from_secs(60)),
//! ]);
//!
//! if governor.is_allowed("203.0.113.7") {
//!     // Request allowed
//! }
//! ```

use std::fmt::Debug;
use std::ops::ControlFlow;
use std::time::Duration;

mod governor;
mod smoothed_rate;
mod suppressor;
mod tier;

pub use governor::Governor;
pub use smoothed_rate::SmoothedRate;
pub use suppressor::DEFAULT_COOL_DOWN;
pub use suppressor::Suppressor;
pub use tier::QuotaTier;

/// Reasons why a request might be rejected by a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    Overloaded { retry_after: Duration },
}

/// The core trait for admission counters.
///
/// Strategies must be `Send` and `Sync` to allow sharing across thread boundaries
/// via `Arc`.
pub trait Strategy: Debug {
    /// Attempts to admit a single request, consuming one unit of capacity on success.
    ///
    /// # Errors
    ///
    /// Returns `Reason` if the rate limit has been reached.
    fn process(&self) -> ControlFlow<Reason>;
}

/// Removal of per-key state that no longer affects any decision.
pub trait Sweep {
    /// Drops idle entries and returns how many were removed.
    fn sweep(&self) -> usize;
}
