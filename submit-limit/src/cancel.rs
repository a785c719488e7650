use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::Weak;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

/// Something that parks callers and can be told to re-check their state.
pub(crate) trait Interrupt: Send + Sync {
    fn interrupt(&self);
}

/// A cloneable cancellation token for blocking acquires.
///
/// Cancelling wakes every limiter that currently has a caller waiting on this
/// token. A cancelled token stays cancelled.
#[derive(Clone, Default)]
pub struct Cancel {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    waiters: Mutex<Vec<Weak<dyn Interrupt>>>,
}

impl fmt::Debug for Cancel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancel")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl Cancel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the token and wakes any waits that are observing it.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);

        // Snapshot under the lock, interrupt outside it. Interrupting takes
        // the limiter's own lock.
        let waiters: Vec<_> = self
            .inner
            .waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(Weak::upgrade)
            .collect();

        for waiter in waiters {
            waiter.interrupt();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Returns a guard that cancels this token when dropped.
    pub fn drop_guard(self) -> CancelGuard {
        CancelGuard { token: Some(self) }
    }

    /// Must be called before the caller first checks `is_cancelled`, and
    /// without holding the waiter's lock.
    pub(crate) fn register(&self, waiter: Weak<dyn Interrupt>) {
        let mut waiters = self
            .inner
            .waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        waiters.retain(|w| w.strong_count() > 0);
        if !waiters.iter().any(|w| Weak::ptr_eq(w, &waiter)) {
            waiters.push(waiter);
        }
    }
}

/// Cancels its token on drop, unless disarmed.
#[derive(Debug)]
pub struct CancelGuard {
    token: Option<Cancel>,
}

impl CancelGuard {
    /// Gives the token back without cancelling it.
    pub fn disarm(mut self) -> Cancel {
        self.token.take().unwrap_or_default()
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl Interrupt for Counting {
        fn interrupt(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn it_interrupts_registered_waiters_once_per_cancel() {
        let waiter = Arc::new(Counting::default());
        let as_dyn: Arc<dyn Interrupt> = waiter.clone();
        let cancel = Cancel::new();

        cancel.register(Arc::downgrade(&as_dyn));
        cancel.register(Arc::downgrade(&as_dyn));
        cancel.cancel();

        assert!(cancel.is_cancelled());
        assert_eq!(waiter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn it_skips_dropped_waiters() {
        let cancel = Cancel::new();
        {
            let gone: Arc<dyn Interrupt> = Arc::new(Counting::default());
            cancel.register(Arc::downgrade(&gone));
        }
        cancel.cancel();
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_drop_guard() {
        let cancel = Cancel::new();
        drop(cancel.clone().drop_guard());
        assert!(cancel.is_cancelled());

        let cancel = Cancel::new();
        let _ = cancel.clone().drop_guard().disarm();
        assert!(!cancel.is_cancelled());
    }
}
