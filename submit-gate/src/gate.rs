use std::sync::Arc;
use std::time::Duration;

use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use submit_limit::Cancel;
use submit_limit::Permit;
use submit_limit::Reason;
use submit_limit::Strategy;
use tracing::debug;

use crate::config::Admission;
use crate::error::GateError;
use crate::transport::Encoder;
use crate::transport::JsonEncoder;
use crate::transport::SubmitResponse;
use crate::transport::Transport;

#[derive(Clone, Debug)]
pub(crate) struct GateMetrics {
    pub(crate) admitted: Counter<u64>,
    pub(crate) denied: Counter<u64>,
    pub(crate) transport_errors: Counter<u64>,
}

impl GateMetrics {
    pub(crate) fn new(scope: &'static str) -> Self {
        let meter = global::meter(scope);
        Self {
            admitted: meter.u64_counter("submit_admitted").build(),
            denied: meter.u64_counter("submit_denied").build(),
            transport_errors: meter.u64_counter("submit_transport_errors").build(),
        }
    }

    pub(crate) fn record_denied(&self, reason: &Reason) {
        let kind = match reason {
            Reason::Overloaded { .. } => "overloaded",
            Reason::TimedOut => "timed_out",
            Reason::Cancelled => "cancelled",
        };
        self.denied.add(1, &[KeyValue::new("reason", kind)]);
    }
}

/// Applies admission control to document submission.
///
/// Every call to [`SubmissionGate::submit`] takes one admission from the
/// limiter before the document is encoded and sent, and gives it back once
/// the transport returns, whatever the outcome.
#[derive(Debug)]
pub struct SubmissionGate<L, T, E = JsonEncoder>
where
    L: ?Sized,
{
    limiter: Arc<L>,
    transport: T,
    encoder: E,
    fail_fast: bool,
    timeout: Option<Duration>,
    instruments: GateMetrics,
}

impl<L, T> SubmissionGate<L, T>
where
    L: Strategy + ?Sized,
    T: Transport,
{
    pub fn new(limiter: Arc<L>, transport: T) -> Self {
        Self {
            limiter,
            transport,
            encoder: JsonEncoder,
            fail_fast: false,
            timeout: None,
            instruments: GateMetrics::new("submission_gate"),
        }
    }
}

impl<L, T, E> SubmissionGate<L, T, E>
where
    L: Strategy + ?Sized,
    T: Transport,
{
    /// Replace the encoder used to turn documents into request bodies.
    pub fn with_encoder<E2>(self, encoder: E2) -> SubmissionGate<L, T, E2> {
        SubmissionGate {
            limiter: self.limiter,
            transport: self.transport,
            encoder,
            fail_fast: self.fail_fast,
            timeout: self.timeout,
            instruments: self.instruments,
        }
    }

    /// Set whether [`SubmissionGate::submit`] should fail immediately when
    /// the window is exhausted instead of waiting for it to roll over.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Bound the time spent waiting for admission.
    ///
    /// Only the wait is bounded; the transport owns its own timeouts.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Apply a configured [`Admission`] policy.
    pub fn with_admission(mut self, admission: Admission) -> Self {
        (self.fail_fast, self.timeout) = match admission {
            Admission::Wait => (false, None),
            Admission::WaitAtMost(timeout) => (false, Some(timeout)),
            Admission::Refuse => (true, None),
        };
        self
    }

    pub fn limiter(&self) -> &Arc<L> {
        &self.limiter
    }

    /// Submits `document`, waiting for admission if the window is exhausted.
    ///
    /// # Errors
    ///
    /// * `GateError::AdmissionDenied` if fail-fast is set and the window is
    ///   exhausted, or if the gate's wait timeout elapses.
    /// * `GateError::Transport` if encoding or sending fails.
    pub fn submit<D>(&self, document: &D, signature: &str) -> Result<SubmitResponse, GateError>
    where
        D: ?Sized,
        E: Encoder<D>,
    {
        if self.fail_fast {
            self.try_submit(document, signature)
        } else {
            self.submit_with(document, signature, &Cancel::new())
        }
    }

    /// Like [`SubmissionGate::submit`], but the wait for admission ends with
    /// `GateError::Cancelled` as soon as `cancel` fires.
    pub fn submit_with<D>(
        &self,
        document: &D,
        signature: &str,
        cancel: &Cancel,
    ) -> Result<SubmitResponse, GateError>
    where
        D: ?Sized,
        E: Encoder<D>,
    {
        let permit = Permit::acquire(&self.limiter, cancel, self.timeout)
            .map_err(|reason| self.denied(reason))?;
        self.deliver(permit, document, signature)
    }

    /// Submits `document` only if the window has capacity right now.
    pub fn try_submit<D>(&self, document: &D, signature: &str) -> Result<SubmitResponse, GateError>
    where
        D: ?Sized,
        E: Encoder<D>,
    {
        let permit = Permit::try_acquire(&self.limiter).map_err(|reason| self.denied(reason))?;
        self.deliver(permit, document, signature)
    }

    fn denied(&self, reason: Reason) -> GateError {
        debug!(%reason, "admission not granted");
        self.instruments.record_denied(&reason);
        GateError::from(reason)
    }

    fn deliver<D>(
        &self,
        permit: Permit<L>,
        document: &D,
        signature: &str,
    ) -> Result<SubmitResponse, GateError>
    where
        D: ?Sized,
        E: Encoder<D>,
    {
        self.instruments.admitted.add(1, &[]);

        let result = self
            .encoder
            .encode(document)
            .and_then(|body| self.transport.send(body, signature));

        // Released before the caller sees the outcome.
        drop(permit);

        match result {
            Ok(response) => {
                debug!(status = response.status, "document accepted");
                Ok(response)
            }
            Err(e) => {
                debug!(error = %e, "document submission failed");
                self.instruments.transport_errors.add(1, &[]);
                Err(GateError::Transport(e))
            }
        }
    }
}
