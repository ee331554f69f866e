use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

pub type NetworkServerResult<T> = Result<T, NetworkServerError>;

/// Failures from the network-control plane. Callers branch on `NotFound` (the
/// object is missing upstream); everything else is an upstream failure with
/// the payload preserved for diagnostics.
#[derive(Debug, Error)]
pub enum NetworkServerError {
    #[error("object does not exist: {0}")]
    NotFound(String),

    #[error("network server api error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("network server request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl NetworkServerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, NetworkServerError::NotFound(_))
    }
}

/// Gateway record as the network-control plane sees it. Ownership metadata
/// travels in `tags`; the control plane itself has no organization concept.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkServerGateway {
    pub gateway_id: String,
    pub name: String,
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub tenant_id: String,
    pub stats_interval_secs: u32,
    pub tags: HashMap<String, String>,
}

/// Detail read: the record plus server-side timestamps
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkServerGatewayDetails {
    pub gateway: NetworkServerGateway,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// One page of the external gateway listing
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkServerGatewayPage {
    pub total_count: i64,
    pub result: Vec<NetworkServerGatewayListItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkServerGatewayListItem {
    pub gateway_id: String,
    pub name: String,
    pub tenant_id: String,
    pub last_seen_at: Option<DateTime<Utc>>,
}

/// Metric aggregation buckets supported by the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricAggregation {
    Hour,
    Day,
    Month,
}

impl MetricAggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricAggregation::Hour => "HOUR",
            MetricAggregation::Day => "DAY",
            MetricAggregation::Month => "MONTH",
        }
    }
}

/// One labeled value series inside a metric response
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDataset {
    pub label: String,
    pub data: Vec<f64>,
}

/// A metric response series: timestamps indexed in parallel with each dataset
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetricSeries {
    pub timestamps: Vec<DateTime<Utc>>,
    pub datasets: Vec<MetricDataset>,
}

/// Receive and transmit packet series for one gateway
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GatewayMetrics {
    pub rx_packets: MetricSeries,
    pub tx_packets: MetricSeries,
}

/// Client for the network-control plane. Implementations normalize gateway
/// ids to lowercase at this boundary and bound every call with a deadline.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait NetworkServerClient: Send + Sync {
    /// Register a gateway on the control plane
    async fn create_gateway(&self, gateway: &NetworkServerGateway) -> NetworkServerResult<()>;

    /// Fetch a single gateway record
    async fn get_gateway(&self, gateway_id: &str)
        -> NetworkServerResult<NetworkServerGatewayDetails>;

    /// Replace a gateway record
    async fn update_gateway(&self, gateway: &NetworkServerGateway) -> NetworkServerResult<()>;

    /// Remove a gateway from the control plane
    async fn delete_gateway(&self, gateway_id: &str) -> NetworkServerResult<()>;

    /// Page through all gateways known to the control plane
    async fn list_gateways(
        &self,
        limit: i64,
        offset: i64,
    ) -> NetworkServerResult<NetworkServerGatewayPage>;

    /// Fetch aggregated packet metrics for a gateway over a window
    async fn get_gateway_metrics(
        &self,
        gateway_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        aggregation: MetricAggregation,
    ) -> NetworkServerResult<GatewayMetrics>;
}
