//! Client side of the remote clustering service.

use crate::core::viewport::Viewport;
use crate::data::filters::FilterSet;
use crate::data::geojson::FeatureCollection;
use crate::FetchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(not(target_arch = "wasm32"))]
use crate::{core::config::ServiceConfig, data::filters::FilterCatalogue, Result};

/// Body of a `getClusters` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterQuery {
    /// `[west, south, east, north]`
    pub bbox: [f64; 4],
    pub zoom: u8,
    pub filters: FilterSet,
}

impl ClusterQuery {
    pub fn new(viewport: &Viewport, filters: &FilterSet) -> Self {
        Self {
            bbox: viewport.bbox(),
            zoom: viewport.zoom,
            filters: filters.clone(),
        }
    }
}

/// Anything that can answer a cluster query.
///
/// Implementations must not assume responses are consumed in request order.
#[async_trait]
pub trait ClusterService: Send + Sync {
    async fn get_clusters(&self, query: &ClusterQuery) -> std::result::Result<FeatureCollection, FetchError>;
}

/// Index cache statistics reported by the service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cached_indexes: u64,
    /// Hit ratio formatted by the service, `"N/A"` before the first request
    pub cache_ratio: String,
    pub current_memory_mb: String,
    pub memory_history: Vec<Value>,
}

/// [`ClusterService`] over the JSON HTTP API.
///
/// Native targets only: reqwest's browser futures are not `Send`, so wasm
/// hosts bridge their own fetch into a [`ClusterService`].
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone)]
pub struct HttpClusterService {
    client: reqwest::Client,
    config: ServiceConfig,
}

#[cfg(not(target_arch = "wasm32"))]
impl HttpClusterService {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Filter keys the service understands
    pub async fn available_filters(&self) -> Result<FilterCatalogue> {
        let document: Value = self
            .client
            .get(self.config.endpoint("availableFilters"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        FilterCatalogue::from_available_filters(&document)
    }

    pub async fn stats(&self) -> Result<ServiceStats> {
        let stats = self
            .client
            .get(self.config.endpoint("stats"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(stats)
    }

    /// Drops the service's per-filter index cache
    pub async fn clear_cache(&self) -> Result<()> {
        self.client
            .post(self.config.endpoint("clearCache"))
            .send()
            .await?
            .error_for_status()?;
        log::info!("clustering service cache cleared");
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[async_trait]
impl ClusterService for HttpClusterService {
    async fn get_clusters(&self, query: &ClusterQuery) -> std::result::Result<FeatureCollection, FetchError> {
        let response = self
            .client
            .post(self.config.endpoint("getClusters"))
            .json(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await?;
        FeatureCollection::from_response(&body)
    }
}
