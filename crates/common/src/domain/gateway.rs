use crate::domain::network_server::NetworkServerError;
use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Gateway entity: the local half of the dual-plane record. Radio-plane state
/// lives on the network server; this row carries ownership, alarm
/// configuration and usage counters, with the owning organization eager-joined
/// for listing and notifications.
#[derive(Debug, Clone, PartialEq)]
pub struct Gateway {
    /// 16 lowercase hex characters (EUI-64), immutable after create
    pub gateway_id: String,
    pub organization_id: String,
    pub organization_name: String,
    pub name: String,
    pub description: Option<String>,
    pub model_name: Option<String>,
    pub placement: Option<String>,
    pub antenna_type: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    /// Counters refreshed from the control plane, never by user writes
    pub rx_packets_received: i64,
    pub tx_packets_emitted: i64,
    pub notify_offline: bool,
    pub offline_alarm_threshold_minutes: Option<i64>,
    pub notify_unusual_packages: bool,
    pub minimum_packages: Option<i64>,
    pub maximum_packages: Option<i64>,
    pub alarm_mail: Option<String>,
    /// Hysteresis latch for the offline alarm
    pub has_sent_offline_notification: bool,
    pub last_seen_at: Option<DateTime<Utc>>,
    /// Client-supplied annotations, reserved keys stripped
    pub tags: HashMap<String, String>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// External input for creating a gateway
#[derive(Debug, Clone, PartialEq)]
pub struct CreateGatewayInput {
    pub gateway_id: String,
    pub organization_id: String,
    /// Tenant on the network server; falls back to the configured default
    pub tenant_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub model_name: Option<String>,
    pub placement: Option<String>,
    pub antenna_type: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub notify_offline: bool,
    pub offline_alarm_threshold_minutes: Option<i64>,
    pub notify_unusual_packages: bool,
    pub minimum_packages: Option<i64>,
    pub maximum_packages: Option<i64>,
    pub alarm_mail: Option<String>,
    pub tags: HashMap<String, String>,
}

/// External input for updating a gateway; replaces the full contents.
/// Ownership moves through `change_organization`, never through update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateGatewayInput {
    pub name: String,
    pub description: Option<String>,
    pub model_name: Option<String>,
    pub placement: Option<String>,
    pub antenna_type: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub notify_offline: bool,
    pub offline_alarm_threshold_minutes: Option<i64>,
    pub notify_unusual_packages: bool,
    pub minimum_packages: Option<i64>,
    pub maximum_packages: Option<i64>,
    pub alarm_mail: Option<String>,
    pub tags: HashMap<String, String>,
}

/// Internal input for the repository insert, with audit fields stamped
#[derive(Debug, Clone, PartialEq)]
pub struct CreateGatewayRecord {
    pub gateway_id: String,
    pub organization_id: String,
    pub name: String,
    pub description: Option<String>,
    pub model_name: Option<String>,
    pub placement: Option<String>,
    pub antenna_type: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub notify_offline: bool,
    pub offline_alarm_threshold_minutes: Option<i64>,
    pub notify_unusual_packages: bool,
    pub minimum_packages: Option<i64>,
    pub maximum_packages: Option<i64>,
    pub alarm_mail: Option<String>,
    pub tags: HashMap<String, String>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
}

/// Internal input for the repository update, with the updater stamped
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateGatewayRecord {
    pub gateway_id: String,
    pub name: String,
    pub description: Option<String>,
    pub model_name: Option<String>,
    pub placement: Option<String>,
    pub antenna_type: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub notify_offline: bool,
    pub offline_alarm_threshold_minutes: Option<i64>,
    pub notify_unusual_packages: bool,
    pub minimum_packages: Option<i64>,
    pub maximum_packages: Option<i64>,
    pub alarm_mail: Option<String>,
    pub tags: HashMap<String, String>,
    pub updated_by: Option<String>,
}

/// Sort direction for listings. Nulls sort as the smallest value in both
/// directions, so gateways that never reported come first ascending and last
/// descending when ordering by liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Input for the paged gateway listing
#[derive(Debug, Clone, PartialEq)]
pub struct ListGatewaysInput {
    pub organization_id: Option<String>,
    pub limit: i64,
    pub offset: i64,
    /// Client-facing sort key; aliases map onto columns
    pub order_on: Option<String>,
    pub sort: SortDirection,
}

impl Default for ListGatewaysInput {
    fn default() -> Self {
        Self {
            organization_id: None,
            limit: 100,
            offset: 0,
            order_on: None,
            sort: SortDirection::Asc,
        }
    }
}

/// One page of gateways plus the unpaged total
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayPage {
    pub gateways: Vec<Gateway>,
    pub total_count: i64,
}

/// Asynchronous counter refresh from the control plane
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateGatewayStatsInput {
    pub gateway_id: String,
    pub rx_packets_received: i64,
    pub tx_packets_emitted: i64,
    pub last_seen_at: Option<DateTime<Utc>>,
}

/// Append-only status log entry written by the stats refresh job
#[derive(Debug, Clone, PartialEq)]
pub struct RecordGatewayStatusInput {
    pub gateway_id: String,
    pub was_online: bool,
    pub last_seen_at: Option<DateTime<Utc>>,
}

/// Outcome of a delete. The local row is always gone once this is returned;
/// the control-plane half may have survived if the external call failed, and
/// that divergence is reported rather than rolled back.
#[derive(Debug)]
pub enum DeleteGatewayOutcome {
    Deleted,
    LocalOnly { source: NetworkServerError },
}

impl DeleteGatewayOutcome {
    pub fn is_fully_deleted(&self) -> bool {
        matches!(self, DeleteGatewayOutcome::Deleted)
    }
}

/// Repository trait for gateway persistence operations
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait GatewayRepository: Send + Sync {
    /// Insert a new gateway row
    async fn create_gateway(&self, input: CreateGatewayRecord) -> DomainResult<Gateway>;

    /// Get a gateway by ID with its organization joined
    async fn get_gateway(&self, gateway_id: &str) -> DomainResult<Option<Gateway>>;

    /// Replace a gateway's contents
    async fn update_gateway(&self, input: UpdateGatewayRecord) -> DomainResult<Gateway>;

    /// Delete a gateway row; dependent status history goes with it
    async fn delete_gateway(&self, gateway_id: &str) -> DomainResult<()>;

    /// Paged listing with optional organization filter and sorting
    async fn list_gateways(&self, input: ListGatewaysInput) -> DomainResult<GatewayPage>;

    /// All gateways with the offline alarm enabled
    async fn list_offline_alarm_gateways(&self) -> DomainResult<Vec<Gateway>>;

    /// All gateways with the unusual-traffic alarm enabled
    async fn list_traffic_alarm_gateways(&self) -> DomainResult<Vec<Gateway>>;

    /// Refresh liveness and usage counters
    async fn update_gateway_stats(&self, input: UpdateGatewayStatsInput) -> DomainResult<()>;

    /// Persist the offline alarm latch
    async fn set_offline_notification_sent(&self, gateway_id: &str, sent: bool)
        -> DomainResult<()>;

    /// Reassign a gateway to another organization
    async fn update_gateway_organization(
        &self,
        gateway_id: &str,
        organization_id: &str,
    ) -> DomainResult<Gateway>;

    /// Append a status log row
    async fn record_gateway_status(&self, input: RecordGatewayStatusInput) -> DomainResult<()>;
}
