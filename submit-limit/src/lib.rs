//! # submit-limit
//!
//! `submit-limit` provides blocking admission control for callers sharing a
//! rate limited operation.
//!
//! ## Core Philosophy
//!
//! Callers that cannot be admitted are parked, not rejected. A single `Mutex`
//! guards the window state and doubles as the companion of a `Condvar`, so a
//! caller that finds the window exhausted sleeps until the window rolls over
//! or another caller signals a release.
//!
//! ## Key Concepts
//!
//! * **Fixed Window**: At most `capacity` admissions are granted per window.
//! * **Lazy Rollover**: The window is reset by the first access after it
//!   expires, so there are no background threads or timers.
//! * **Cancellation**: A blocked caller can be cancelled through a [`Cancel`]
//!   token, or bounded with a timeout, without consuming any capacity.
//! * **Permits**: [`Permit`] releases its admission when dropped, so release
//!   happens exactly once on every path.
//!
//! ## Example
//!
//! ```rust
//! use std::num::NonZeroUsize;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use submit_limit::Cancel;
//! use submit_limit::FixedWindow;
//! use submit_limit::Permit;
//!
//! let limit = NonZeroUsize::new(10).unwrap();
//! let window = Arc::new(FixedWindow::new(limit, Duration::from_secs(1)));
//!
//! let permit = Permit::acquire(&window, &Cancel::new(), None).unwrap();
//! // ... perform the rate limited call ...
//! drop(permit);
//! ```

use std::fmt::Debug;
use std::ops::ControlFlow;
use std::time::Duration;

mod cancel;
mod fixed_window;
mod permit;

pub use cancel::Cancel;
pub use cancel::CancelGuard;
pub use fixed_window::FixedWindow;
pub use permit::Permit;

/// Reasons why an admission might not be granted.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Reason {
    /// The window is exhausted and the caller asked not to wait.
    #[error("window exhausted; retry after {retry_after:?}")]
    Overloaded { retry_after: Duration },

    /// The caller's wait deadline passed before capacity became available.
    #[error("timed out waiting for admission")]
    TimedOut,

    /// The caller's wait was cancelled.
    #[error("wait for admission was cancelled")]
    Cancelled,
}

/// The core trait for admission control strategies.
///
/// Strategies are shared across threads via `Arc`, so they must be `Send` and
/// `Sync`.
pub trait Strategy: Debug + Send + Sync {
    /// Blocks until an admission is granted.
    ///
    /// The wait ends early with `Reason::Cancelled` when `cancel` fires, or
    /// with `Reason::TimedOut` when `timeout` elapses. Neither outcome
    /// consumes capacity.
    fn acquire(&self, cancel: &Cancel, timeout: Option<Duration>) -> ControlFlow<Reason>;

    /// Attempts to grant an admission without blocking.
    ///
    /// Returns `ControlFlow::Break(Reason::Overloaded { .. })` when the
    /// current window is exhausted, carrying the time until it rolls over.
    fn try_acquire(&self) -> ControlFlow<Reason>;

    /// Signals that an admitted operation has completed.
    ///
    /// Never blocks. Wakes every caller parked in [`Strategy::acquire`].
    fn release(&self);
}
