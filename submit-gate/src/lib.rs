//! # Submit Gate
//!
//! `submit-gate` puts a [`submit_limit::Strategy`] in front of a remote
//! document creation endpoint, so that no more than a fixed number of
//! documents are sent per window no matter how many threads are submitting.
//!
//! ## The Gate
//! [`SubmissionGate::submit`] performs three steps:
//!
//! 1. **Admission**: Waits on the limiter until the current window has
//!    capacity. The wait can be bounded (`with_timeout`), skipped
//!    (`with_fail_fast`, `try_submit`) or cancelled (`submit_with`).
//! 2. **Delivery**: Encodes the document with an [`Encoder`] and hands the
//!    bytes and signature to a [`Transport`]. Nothing is retried.
//! 3. **Release**: The admission is released exactly once, before the
//!    outcome is returned, on success, error and panic alike.
//!
//! Failures are reported as [`GateError`].
//!
//! ## Async services
//! [`SubmitLayer`] applies the same discipline to any `tower` service. Build
//! it from a [`GateConfig`] with [`SubmitLayer::from_config`], or from an
//! existing limiter and an [`Admission`] policy.

mod config;
mod document;
mod error;
mod gate;
mod layer;
mod service;
mod transport;


pub use config::Admission;
pub use config::GateConfig;
pub use config::WindowUnit;
pub use document::Description;
pub use document::Document;
pub use document::Product;
pub use error::ConfigError;
pub use error::GateError;
pub use error::TransportError;
pub use gate::SubmissionGate;
pub use layer::SubmitLayer;
pub use service::SubmitService;
pub use transport::DEFAULT_ENDPOINT;
pub use transport::Encoder;
pub use transport::HttpTransport;
pub use transport::JsonEncoder;
pub use transport::SIGNATURE_HEADER;
pub use transport::SubmitResponse;
pub use transport::Transport;
