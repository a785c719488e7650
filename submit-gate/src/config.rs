//! Construction-time configuration for a submission gate.

use std::num::NonZeroUsize;
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use serde::Serialize;
use submit_limit::FixedWindow;

use crate::error::ConfigError;
use crate::transport::DEFAULT_ENDPOINT;

/// The length of one counting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WindowUnit {
    Second,
    Minute,
    Hour,
    Day,
}

impl WindowUnit {
    pub fn duration(self) -> Duration {
        match self {
            Self::Second => Duration::from_secs(1),
            Self::Minute => Duration::from_secs(60),
            Self::Hour => Duration::from_secs(60 * 60),
            Self::Day => Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// What a caller does when the window is exhausted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Admission {
    /// Park until the window rolls over.
    #[default]
    Wait,
    /// Park, but give up with `GateError::AdmissionDenied` after this long.
    WaitAtMost(Duration),
    /// Never park. Refuse at once with the time left in the window.
    Refuse,
}

/// Settings for a gate in front of the submission endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Window length (default: second)
    #[serde(default = "default_window")]
    pub window: WindowUnit,

    /// Admissions per window (default: 10)
    #[serde(default = "default_max_per_window")]
    pub max_per_window: usize,

    /// Longest wait for admission, e.g. "1500ms" (default: wait indefinitely)
    #[serde(default, with = "humantime_opt")]
    pub wait_timeout: Option<Duration>,

    /// Reject instead of waiting when the window is exhausted (default: false)
    #[serde(default)]
    pub fail_fast: bool,

    /// Document creation endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

fn default_window() -> WindowUnit {
    WindowUnit::Second
}

fn default_max_per_window() -> usize {
    10
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            max_per_window: default_max_per_window(),
            wait_timeout: None,
            fail_fast: false,
            endpoint: default_endpoint(),
        }
    }
}

impl GateConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_per_window == 0 {
            return Err(ConfigError::ZeroQuota);
        }
        self.endpoint_url()?;
        Ok(())
    }

    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.endpoint).map_err(|_| ConfigError::InvalidEndpoint(self.endpoint.clone()))
    }

    /// The waiting behaviour asked for; `fail_fast` overrides `wait_timeout`.
    pub fn admission(&self) -> Admission {
        match (self.fail_fast, self.wait_timeout) {
            (true, _) => Admission::Refuse,
            (false, Some(timeout)) => Admission::WaitAtMost(timeout),
            (false, None) => Admission::Wait,
        }
    }

    /// Build the limiter described by this configuration.
    pub fn limiter(&self) -> Result<FixedWindow, ConfigError> {
        let capacity = NonZeroUsize::new(self.max_per_window).ok_or(ConfigError::ZeroQuota)?;
        Ok(FixedWindow::new(capacity, self.window.duration()))
    }
}

mod humantime_opt {
    use std::time::Duration;

    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    pub(super) fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(d) => serializer.serialize_str(&humantime::format_duration(*d).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_fills_defaults() {
        let config: GateConfig = serde_json::from_str("{}").unwrap();

        assert_eq!(config.window, WindowUnit::Second);
        assert_eq!(config.max_per_window, 10);
        assert_eq!(config.wait_timeout, None);
        assert!(!config.fail_fast);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        config.validate().unwrap();
    }

    #[test]
    fn test_parses_units_and_timeouts() {
        let config: GateConfig = serde_json::from_str(
            r#"{"window": "minute", "max_per_window": 3, "wait_timeout": "1s 500ms"}"#,
        )
        .unwrap();

        assert_eq!(config.window.duration(), Duration::from_secs(60));
        assert_eq!(config.wait_timeout, Some(Duration::from_millis(1500)));

        let limiter = config.limiter().unwrap();
        assert_eq!(limiter.capacity(), 3);
        assert_eq!(limiter.interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_admission_follows_flags() {
        let mut config = GateConfig::default();
        assert_eq!(config.admission(), Admission::Wait);

        config.wait_timeout = Some(Duration::from_secs(2));
        assert_eq!(
            config.admission(),
            Admission::WaitAtMost(Duration::from_secs(2))
        );

        config.fail_fast = true;
        assert_eq!(config.admission(), Admission::Refuse);
    }

    #[test]
    fn test_accepts_timeouts_longer_than_any_clock() {
        let config: GateConfig =
            serde_json::from_str(r#"{"wait_timeout": "1000years"}"#).unwrap();

        config.validate().unwrap();
        assert!(matches!(config.admission(), Admission::WaitAtMost(_)));
    }

    #[test]
    fn test_timeout_survives_serialization() {
        let config = GateConfig {
            wait_timeout: Some(Duration::from_millis(250)),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: GateConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.wait_timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_rejects_bad_values() {
        let zero = GateConfig {
            max_per_window: 0,
            ..Default::default()
        };
        assert_eq!(zero.validate(), Err(ConfigError::ZeroQuota));
        assert!(zero.limiter().is_err());

        let bad = GateConfig {
            endpoint: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(ConfigError::InvalidEndpoint(_))
        ));

        assert!(serde_json::from_str::<GateConfig>(r#"{"window": "fortnight"}"#).is_err());
        assert!(serde_json::from_str::<GateConfig>(r#"{"wait_timeout": "soon"}"#).is_err());
    }
}
