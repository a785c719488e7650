use std::sync::Arc;

use submit_limit::FixedWindow;
use tower::Layer;

use crate::config::Admission;
use crate::config::GateConfig;
use crate::error::ConfigError;
use crate::service::SubmitService;

/// Puts a submission window in front of `tower` services.
///
/// Every service this layer wraps, and every clone of those services, draws
/// from the same limiter. The window's quota therefore holds across all of
/// them together, not per service. How a request behaves when the window is
/// exhausted is set by its [`Admission`].
#[derive(Debug)]
pub struct SubmitLayer<L: ?Sized> {
    limiter: Arc<L>,
    admission: Admission,
}

impl<L: ?Sized> Clone for SubmitLayer<L> {
    fn clone(&self) -> Self {
        Self {
            limiter: Arc::clone(&self.limiter),
            admission: self.admission,
        }
    }
}

impl SubmitLayer<FixedWindow> {
    /// Builds the window described by `config` and waits the way it asks.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `config` does not validate.
    pub fn from_config(config: &GateConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(Arc::new(config.limiter()?)).with_admission(config.admission()))
    }
}

impl<L: ?Sized> SubmitLayer<L> {
    /// Requests wrapped by this layer wait as long as it takes by default.
    pub fn new(limiter: Arc<L>) -> Self {
        Self {
            limiter,
            admission: Admission::default(),
        }
    }

    pub fn with_admission(mut self, admission: Admission) -> Self {
        self.admission = admission;
        self
    }

    pub fn admission(&self) -> Admission {
        self.admission
    }

    pub fn limiter(&self) -> &Arc<L> {
        &self.limiter
    }
}

impl<L: ?Sized, S> Layer<S> for SubmitLayer<L> {
    type Service = SubmitService<L, S>;

    fn layer(&self, inner: S) -> Self::Service {
        SubmitService::new(inner, Arc::clone(&self.limiter)).with_admission(self.admission)
    }
}
