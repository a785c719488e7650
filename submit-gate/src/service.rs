use std::sync::Arc;
use std::task::Context;
use std::task::Poll;
use std::time::Duration;

use futures::future::BoxFuture;
use submit_limit::Cancel;
use submit_limit::Permit;
use submit_limit::Strategy;
use tower::BoxError;
use tower::Service;
use tracing::debug;

use crate::config::Admission;
use crate::error::GateError;
use crate::gate::GateMetrics;

/// Applies the gate's admission discipline in front of an async service.
///
/// The blocking wait for admission runs on tokio's blocking pool. Dropping
/// the response future while it waits cancels the wait. The admission is
/// released once the inner future completes, successfully or not.
#[derive(Debug)]
pub struct SubmitService<L, S>
where
    L: ?Sized,
{
    inner: S,
    limiter: Arc<L>,
    fail_fast: bool,
    timeout: Option<Duration>,
    instruments: GateMetrics,
}

impl<L, S> Clone for SubmitService<L, S>
where
    L: ?Sized,
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            limiter: Arc::clone(&self.limiter),
            fail_fast: self.fail_fast,
            timeout: self.timeout,
            instruments: self.instruments.clone(),
        }
    }
}

impl<L, S> SubmitService<L, S>
where
    L: ?Sized,
{
    pub fn new(inner: S, limiter: Arc<L>) -> Self {
        Self {
            inner,
            limiter,
            fail_fast: false,
            timeout: None,
            instruments: GateMetrics::new("submit_service"),
        }
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_admission(mut self, admission: Admission) -> Self {
        (self.fail_fast, self.timeout) = match admission {
            Admission::Wait => (false, None),
            Admission::WaitAtMost(timeout) => (false, Some(timeout)),
            Admission::Refuse => (true, None),
        };
        self
    }
}

impl<L, S, Req> Service<Req> for SubmitService<L, S>
where
    L: Strategy + ?Sized + 'static,
    S: Service<Req, Error = BoxError> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<S::Response, BoxError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        // The ready clone stays with the future; this service keeps a fresh one.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let limiter = Arc::clone(&self.limiter);
        let fail_fast = self.fail_fast;
        let timeout = self.timeout;
        let instruments = self.instruments.clone();

        Box::pin(async move {
            let admitted = if fail_fast {
                Permit::try_acquire(&limiter)
            } else {
                let cancel = Cancel::new();
                let guard = cancel.clone().drop_guard();
                let waiting = Arc::clone(&limiter);
                let admitted = tokio::task::spawn_blocking(move || {
                    Permit::acquire(&waiting, &cancel, timeout)
                })
                .await?;
                let _ = guard.disarm();
                admitted
            };

            let permit = match admitted {
                Ok(permit) => permit,
                Err(reason) => {
                    debug!(%reason, "admission not granted");
                    instruments.record_denied(&reason);
                    return Err(Box::new(GateError::from(reason)) as BoxError);
                }
            };

            instruments.admitted.add(1, &[]);
            let result = inner.call(req).await;
            drop(permit);

            if result.is_err() {
                instruments.transport_errors.add(1, &[]);
            }
            result
        })
    }
}
