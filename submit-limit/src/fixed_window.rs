use std::num::NonZeroUsize;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::Duration;

use quanta::Clock;
use quanta::Instant;
use tracing::trace;

use crate::Cancel;
use crate::Reason;
use crate::Strategy;
use crate::cancel::Interrupt;

/// A blocking fixed window limiter.
///
/// Time is divided into windows of `interval`, and at most `capacity`
/// admissions are granted per window. A window rolls over lazily: the first
/// access after it has expired starts a new window at that instant.
///
/// Capacity only comes back at rollover. [`Strategy::release`] wakes parked
/// callers so they re-check the window, but does not return the admission.
#[derive(Debug)]
pub struct FixedWindow {
    capacity: usize,
    interval: Duration,
    clock: Clock,
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    window: Mutex<Window>,
    wake: Condvar,
}

#[derive(Debug)]
struct Window {
    start: Instant,
    count: usize,
}

impl Window {
    fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.start)
    }

    /// Starts a new window at `now` if the current one has expired.
    fn roll(&mut self, now: Instant, interval: Duration) {
        if self.elapsed(now) >= interval {
            self.start = now;
            self.count = 0;
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Window> {
        // Window state is updated in single assignments, so a poisoned lock
        // still holds a consistent window.
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Interrupt for Shared {
    fn interrupt(&self) {
        let _window = self.lock();
        self.wake.notify_all();
    }
}

impl FixedWindow {
    /// Creates a new `FixedWindow` strategy.
    ///
    /// # Arguments
    ///
    /// * `capacity` - The maximum number of admissions within a single window.
    /// * `interval` - The duration of the fixed time window.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero. A zero window would roll over on every
    /// access and never limit anything.
    pub fn new(capacity: NonZeroUsize, interval: Duration) -> Self {
        Self::with_clock(capacity, interval, Clock::new())
    }

    /// Creates a new `FixedWindow` reading time from `clock`.
    ///
    /// Panics if `interval` is zero, as [`FixedWindow::new`] does.
    pub fn with_clock(capacity: NonZeroUsize, interval: Duration, clock: Clock) -> Self {
        assert!(!interval.is_zero(), "window interval must be positive");
        let start = clock.now();
        Self {
            capacity: capacity.get(),
            interval,
            clock,
            shared: Arc::new(Shared {
                window: Mutex::new(Window { start, count: 0 }),
                wake: Condvar::new(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Admissions granted in the current window.
    ///
    /// Reports zero once the window has expired, even before the next access
    /// rolls it over.
    pub fn in_window(&self) -> usize {
        let window = self.shared.lock();
        if window.elapsed(self.clock.now()) >= self.interval {
            0
        } else {
            window.count
        }
    }
}

impl Strategy for FixedWindow {
    fn acquire(&self, cancel: &Cancel, timeout: Option<Duration>) -> ControlFlow<Reason> {
        let waiter: Arc<dyn Interrupt> = self.shared.clone();
        cancel.register(Arc::downgrade(&waiter));

        // A timeout too large to add to the clock is no deadline at all.
        let deadline = timeout.and_then(|t| self.clock.now().checked_add(t));
        let mut window = self.shared.lock();

        loop {
            // Checked before counting, so a cancelled or expired wait never
            // leaves an increment behind.
            if cancel.is_cancelled() {
                trace!("acquire cancelled");
                return ControlFlow::Break(Reason::Cancelled);
            }

            let now = self.clock.now();
            window.roll(now, self.interval);

            if window.count < self.capacity {
                window.count += 1;
                return ControlFlow::Continue(());
            }

            let mut wait = self.interval.saturating_sub(window.elapsed(now));
            if let Some(deadline) = deadline {
                let left = deadline.saturating_duration_since(now);
                if left.is_zero() {
                    trace!("acquire timed out");
                    return ControlFlow::Break(Reason::TimedOut);
                }
                wait = wait.min(left);
            }

            trace!(?wait, count = window.count, "window exhausted, parking");
            window = self
                .shared
                .wake
                .wait_timeout(window, wait)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn try_acquire(&self) -> ControlFlow<Reason> {
        let mut window = self.shared.lock();
        let now = self.clock.now();
        window.roll(now, self.interval);

        if window.count < self.capacity {
            window.count += 1;
            ControlFlow::Continue(())
        } else {
            ControlFlow::Break(Reason::Overloaded {
                retry_after: self.interval.saturating_sub(window.elapsed(now)),
            })
        }
    }

    fn release(&self) {
        let _window = self.shared.lock();
        self.shared.wake.notify_all();
    }
}
