//! Configuration for the cluster synchronization pipeline
//!
//! Pipelines are configured either through a preset ([`SyncProfile`]) or a
//! fully custom [`PipelineConfig`], which can also be loaded from JSON.

use crate::core::constants::{
    DEFAULT_MAX_ZOOM, DRILL_DOWN_STEP, FETCH_DEBOUNCE_MS, FETCH_THROTTLE_MS, IDLE_DELAY_MS,
    MIN_FETCH_ZOOM, REQUEST_TIMEOUT_MS, UI_DEBOUNCE_MS,
};
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum SyncProfile {
    /// Throttled + debounced fetching for continuous pan/zoom sessions
    Balanced,
    /// Pure trailing debounce, no throttle
    Responsive,
    Custom(PipelineConfig),
}

impl SyncProfile {
    pub fn resolve(&self) -> PipelineConfig {
        match self {
            Self::Balanced => PipelineConfig {
                scheduler: SchedulerConfig {
                    throttle_ms: Some(FETCH_THROTTLE_MS),
                    debounce_ms: FETCH_DEBOUNCE_MS,
                    max_wait_ms: None,
                    trailing_waits_for_throttle: true,
                },
                ..PipelineConfig::base()
            },
            Self::Responsive => PipelineConfig {
                scheduler: SchedulerConfig {
                    throttle_ms: None,
                    debounce_ms: UI_DEBOUNCE_MS,
                    max_wait_ms: None,
                    trailing_waits_for_throttle: false,
                },
                ..PipelineConfig::base()
            },
            Self::Custom(options) => options.clone(),
        }
    }
}

impl Default for SyncProfile {
    fn default() -> Self {
        Self::Balanced
    }
}

/// Throttle + debounce gate parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Minimum spacing between executions; `None` disables the leading edge entirely
    pub throttle_ms: Option<u64>,
    /// Quiet period before a deferred execution fires
    pub debounce_ms: u64,
    /// Upper bound on how long continuous triggers may postpone a deferred execution
    pub max_wait_ms: Option<u64>,
    /// Hold a deferred execution until the throttle interval has also elapsed
    pub trailing_waits_for_throttle: bool,
}

impl SchedulerConfig {
    pub fn throttle(&self) -> Option<Duration> {
        self.throttle_ms.map(Duration::from_millis)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        if self.debounce_ms == 0 && self.throttle_ms.is_none() {
            return Err(MapError::Config(
                "scheduler needs a debounce period or a throttle interval".to_string(),
            ));
        }
        if let Some(max_wait) = self.max_wait_ms {
            if max_wait < self.debounce_ms {
                return Err(MapError::Config(format!(
                    "max_wait_ms ({max_wait}) is shorter than debounce_ms ({})",
                    self.debounce_ms
                )));
            }
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            throttle_ms: Some(FETCH_THROTTLE_MS),
            debounce_ms: FETCH_DEBOUNCE_MS,
            max_wait_ms: None,
            trailing_waits_for_throttle: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub scheduler: SchedulerConfig,
    /// Delay after the last interaction end-event before the map counts as idle
    pub idle_delay_ms: u64,
    /// Rounded zoom below which fetching is suppressed
    pub min_fetch_zoom: u8,
    /// Highest zoom a drill-down may target
    pub max_zoom: u8,
    /// Zoom levels added on a cluster click without an expansion hint
    pub drill_down_step: u8,
    /// In-flight requests older than this fail; `None` waits forever
    pub request_timeout_ms: Option<u64>,
    /// Abort superseded in-flight tasks instead of only ignoring their results
    pub cancel_superseded: bool,
}

impl PipelineConfig {
    fn base() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            idle_delay_ms: IDLE_DELAY_MS,
            min_fetch_zoom: MIN_FETCH_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            drill_down_step: DRILL_DOWN_STEP,
            request_timeout_ms: Some(REQUEST_TIMEOUT_MS),
            cancel_superseded: false,
        }
    }

    /// Parses a (possibly partial) JSON document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn idle_delay(&self) -> Duration {
        Duration::from_millis(self.idle_delay_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate()?;
        if self.min_fetch_zoom > self.max_zoom {
            return Err(MapError::Config(format!(
                "min_fetch_zoom ({}) exceeds max_zoom ({})",
                self.min_fetch_zoom, self.max_zoom
            )));
        }
        if self.request_timeout_ms == Some(0) {
            return Err(MapError::Config("request timeout must be positive".to_string()));
        }
        if self.drill_down_step == 0 {
            return Err(MapError::Config("drill_down_step must be positive".to_string()));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        SyncProfile::default().resolve()
    }
}

/// Connection settings for the HTTP clustering service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL, without the `/api` suffix
    pub base_url: String,
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl ServiceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Joins an API path onto the base URL
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/api/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_ms: REQUEST_TIMEOUT_MS,
            user_agent: concat!("clusterlet/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_resolve() {
        let balanced = SyncProfile::Balanced.resolve();
        assert_eq!(balanced.scheduler.throttle_ms, Some(2_000));
        assert_eq!(balanced.scheduler.debounce_ms, 800);
        assert_eq!(balanced.min_fetch_zoom, 2);

        let responsive = SyncProfile::Responsive.resolve();
        assert_eq!(responsive.scheduler.throttle_ms, None);
        assert_eq!(responsive.scheduler.debounce_ms, 300);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = PipelineConfig::from_json_str(r#"{"min_fetch_zoom": 3, "max_zoom": 18}"#)
            .unwrap();

        assert_eq!(config.min_fetch_zoom, 3);
        assert_eq!(config.max_zoom, 18);
        assert_eq!(config.idle_delay_ms, 500);
        assert_eq!(config.scheduler, SchedulerConfig::default());
    }

    #[test]
    fn test_invalid_configs_rejected() {
        assert!(PipelineConfig::from_json_str(r#"{"min_fetch_zoom": 20}"#).is_err());
        assert!(PipelineConfig::from_json_str(r#"{"request_timeout_ms": 0}"#).is_err());
        assert!(PipelineConfig::from_json_str(
            r#"{"scheduler": {"throttle_ms": null, "debounce_ms": 0}}"#
        )
        .is_err());
        assert!(PipelineConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_service_endpoint() {
        let config = ServiceConfig::new("https://clusters.example.org/");
        assert_eq!(
            config.endpoint("getClusters"),
            "https://clusters.example.org/api/getClusters"
        );
    }
}
