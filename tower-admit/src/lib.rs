//! # Tower Admit
//!
//! `tower-admit` puts [`admit_limit`] on the request path of a
//! [Tower](https://github.com/tower-rs/tower) service stack.
//!
//! ## Pieces
//!
//! 1. **Admission**: [`GovernorLayer`] derives a client key from each request (see
//!    [`RealIp`] and [`PeerIp`]) and consults that operation's [`Governor`]. A rejected
//!    request fails fast with [`AdmitError::TooFast`] and never reaches the inner
//!    service.
//! 2. **View de-duplication**: [`ViewRecorder`] asks the shared [`Suppressor`] whether a
//!    read should count, then increments the count through a [`ViewSink`] in a detached
//!    task.
//! 3. **Configuration**: [`AdmissionConfig`] loads tiers per operation from YAML and
//!    [`Admission`] turns it into governors, a suppressor and an optional
//!    [`spawn_reaper`] sweep.
//!
//! ## Feature Flags
//!
//! - `axum`: Enables `IntoResponse` for [`AdmitError`] (`429` with `Retry-After` and a
//!   `{"ok":false,"error":"TOO_FAST"}` body) and reads axum's `ConnectInfo` for peer
//!   addresses.

mod admission;
mod config;
mod error;
mod key;
mod layer;
mod reaper;
mod service;
mod views;


#[cfg(doc)]
use admit_limit::Governor;
#[cfg(doc)]
use admit_limit::Suppressor;

pub use admission::Admission;
pub use config::AdmissionConfig;
pub use config::ConfigError;
pub use config::TierConfig;
pub use config::ViewsConfig;
pub use error::AdmitError;
pub use key::KeyExtractor;
pub use key::PeerIp;
pub use key::RealIp;
pub use layer::GovernorLayer;
pub use reaper::spawn_reaper;
pub use service::GovernorService;
pub use service::ResponseFuture;
pub use views::ViewRecorder;
pub use views::ViewSink;
