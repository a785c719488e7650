use std::time::Duration;

use submit_limit::Reason;

/// Errors produced when submitting through a [`crate::SubmissionGate`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum GateError {
    /// No admission was granted.
    ///
    /// Raised when the window is exhausted and the caller asked not to wait
    /// (`retry_after` is set), or when the wait exceeded the gate's timeout
    /// (`retry_after` is `None`). Nothing was sent.
    #[error("Admission denied; retry after {retry_after:?}")]
    AdmissionDenied {
        /// Time until the current window rolls over, when known.
        retry_after: Option<Duration>,
    },

    /// The wait for admission was cancelled. Nothing was sent and no
    /// capacity was consumed.
    #[error("Wait for admission was cancelled")]
    Cancelled,

    /// The document was admitted but could not be delivered.
    ///
    /// Reported after the admission has been released.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<Reason> for GateError {
    fn from(reason: Reason) -> Self {
        match reason {
            Reason::Overloaded { retry_after } => Self::AdmissionDenied {
                retry_after: Some(retry_after),
            },
            Reason::TimedOut => Self::AdmissionDenied { retry_after: None },
            Reason::Cancelled => Self::Cancelled,
        }
    }
}

/// Failures reported by the encode and send collaborators.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to encode document: {0}")]
    Encode(String),

    #[error("Request failed: {0}")]
    Network(String),

    /// The endpoint answered with a non-success status.
    #[error("Endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Configuration problems detected before a gate is built.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("max_per_window must be positive")]
    ZeroQuota,

    #[error("Invalid endpoint {0:?}")]
    InvalidEndpoint(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_maps_limiter_reasons() {
        assert!(matches!(
            GateError::from(Reason::Overloaded {
                retry_after: Duration::from_secs(2)
            }),
            GateError::AdmissionDenied {
                retry_after: Some(d)
            } if d == Duration::from_secs(2)
        ));
        assert!(matches!(
            GateError::from(Reason::TimedOut),
            GateError::AdmissionDenied { retry_after: None }
        ));
        assert!(matches!(
            GateError::from(Reason::Cancelled),
            GateError::Cancelled
        ));
    }

    #[test]
    fn test_transport_errors_display_verbatim() {
        let err = GateError::from(TransportError::Status {
            status: 503,
            body: "busy".to_string(),
        });
        assert_eq!(err.to_string(), "Endpoint returned 503: busy");
    }
}
