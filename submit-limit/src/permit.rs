use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use crate::Cancel;
use crate::Reason;
use crate::Strategy;

/// An admission granted by a [`Strategy`].
///
/// Dropping the permit calls [`Strategy::release`] exactly once.
pub struct Permit<L>
where
    L: Strategy + ?Sized,
{
    limiter: Arc<L>,
}

impl<L> Permit<L>
where
    L: Strategy + ?Sized,
{
    /// Blocks until `limiter` grants an admission.
    pub fn acquire(
        limiter: &Arc<L>,
        cancel: &Cancel,
        timeout: Option<Duration>,
    ) -> Result<Self, Reason> {
        match limiter.acquire(cancel, timeout) {
            ControlFlow::Continue(()) => Ok(Self {
                limiter: Arc::clone(limiter),
            }),
            ControlFlow::Break(reason) => Err(reason),
        }
    }

    /// Takes an admission if one is available right now.
    pub fn try_acquire(limiter: &Arc<L>) -> Result<Self, Reason> {
        match limiter.try_acquire() {
            ControlFlow::Continue(()) => Ok(Self {
                limiter: Arc::clone(limiter),
            }),
            ControlFlow::Break(reason) => Err(reason),
        }
    }
}

impl<L> fmt::Debug for Permit<L>
where
    L: Strategy + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permit")
            .field("limiter", &self.limiter)
            .finish()
    }
}

impl<L> Drop for Permit<L>
where
    L: Strategy + ?Sized,
{
    fn drop(&mut self) {
        self.limiter.release();
    }
}
