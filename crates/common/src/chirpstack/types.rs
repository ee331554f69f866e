use crate::domain::{
    GatewayMetrics, MetricDataset, MetricSeries, NetworkServerGateway,
    NetworkServerGatewayDetails, NetworkServerGatewayListItem, NetworkServerGatewayPage,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Gateway resource as the ChirpStack REST bridge renders it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiGateway {
    pub gateway_id: String,
    pub name: String,
    pub description: String,
    pub location: ApiLocation,
    pub tenant_id: String,
    pub tags: HashMap<String, String>,
    pub stats_interval: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub source: String,
    pub accuracy: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateGatewayRequest {
    pub gateway: ApiGateway,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateGatewayRequest {
    pub gateway: ApiGateway,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetGatewayResponse {
    pub gateway: ApiGateway,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_seen_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiGatewayListItem {
    pub gateway_id: String,
    pub name: String,
    pub tenant_id: String,
    pub last_seen_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListGatewaysResponse {
    pub total_count: i64,
    pub result: Vec<ApiGatewayListItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiMetricDataset {
    pub label: String,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiMetric {
    pub timestamps: Vec<DateTime<Utc>>,
    pub datasets: Vec<ApiMetricDataset>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetGatewayMetricsResponse {
    pub rx_packets: ApiMetric,
    pub tx_packets: ApiMetric,
}

impl From<&NetworkServerGateway> for ApiGateway {
    fn from(gateway: &NetworkServerGateway) -> Self {
        ApiGateway {
            // The bridge rejects uppercase EUIs
            gateway_id: gateway.gateway_id.to_lowercase(),
            name: gateway.name.clone(),
            description: gateway.description.clone().unwrap_or_default(),
            location: ApiLocation {
                latitude: gateway.latitude,
                longitude: gateway.longitude,
                altitude: gateway.altitude.unwrap_or_default(),
                source: "UNKNOWN".to_string(),
                accuracy: 0.0,
            },
            tenant_id: gateway.tenant_id.clone(),
            tags: gateway.tags.clone(),
            stats_interval: gateway.stats_interval_secs,
        }
    }
}

impl From<ApiGateway> for NetworkServerGateway {
    fn from(gateway: ApiGateway) -> Self {
        NetworkServerGateway {
            gateway_id: gateway.gateway_id,
            name: gateway.name,
            description: if gateway.description.is_empty() {
                None
            } else {
                Some(gateway.description)
            },
            latitude: gateway.location.latitude,
            longitude: gateway.location.longitude,
            altitude: Some(gateway.location.altitude),
            tenant_id: gateway.tenant_id,
            stats_interval_secs: gateway.stats_interval,
            tags: gateway.tags,
        }
    }
}

impl From<GetGatewayResponse> for NetworkServerGatewayDetails {
    fn from(response: GetGatewayResponse) -> Self {
        NetworkServerGatewayDetails {
            gateway: response.gateway.into(),
            created_at: response.created_at,
            updated_at: response.updated_at,
            last_seen_at: response.last_seen_at,
        }
    }
}

impl From<ApiGatewayListItem> for NetworkServerGatewayListItem {
    fn from(item: ApiGatewayListItem) -> Self {
        NetworkServerGatewayListItem {
            gateway_id: item.gateway_id,
            name: item.name,
            tenant_id: item.tenant_id,
            last_seen_at: item.last_seen_at,
        }
    }
}

impl From<ListGatewaysResponse> for NetworkServerGatewayPage {
    fn from(response: ListGatewaysResponse) -> Self {
        NetworkServerGatewayPage {
            total_count: response.total_count,
            result: response.result.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<ApiMetricDataset> for MetricDataset {
    fn from(dataset: ApiMetricDataset) -> Self {
        MetricDataset {
            label: dataset.label,
            data: dataset.data,
        }
    }
}

impl From<ApiMetric> for MetricSeries {
    fn from(metric: ApiMetric) -> Self {
        MetricSeries {
            timestamps: metric.timestamps,
            datasets: metric.datasets.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<GetGatewayMetricsResponse> for GatewayMetrics {
    fn from(response: GetGatewayMetricsResponse) -> Self {
        GatewayMetrics {
            rx_packets: response.rx_packets.into(),
            tx_packets: response.tx_packets.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_gateway_response_parses_bridge_payload() {
        let body = r#"{
            "gateway": {
                "gatewayId": "0016c001f153a14c",
                "name": "rooftop-a",
                "description": "",
                "location": {"latitude": 55.6, "longitude": 12.5, "altitude": 20.0},
                "tenantId": "52f14cd4-c6f1-4fbd-8f87-4025e1d49242",
                "tags": {"site": "rooftop-a"},
                "statsInterval": 30
            },
            "createdAt": "2026-03-10T09:00:00Z",
            "updatedAt": "2026-03-12T10:30:00Z",
            "lastSeenAt": null
        }"#;

        let response: GetGatewayResponse = serde_json::from_str(body).unwrap();
        let details = NetworkServerGatewayDetails::from(response);

        assert_eq!(details.gateway.gateway_id, "0016c001f153a14c");
        assert_eq!(details.gateway.description, None);
        assert_eq!(details.gateway.altitude, Some(20.0));
        assert_eq!(
            details.gateway.tags.get("site").map(String::as_str),
            Some("rooftop-a")
        );
        assert!(details.created_at.is_some());
        assert!(details.last_seen_at.is_none());
    }

    #[test]
    fn metrics_response_parses_labeled_datasets() {
        let body = r#"{
            "rxPackets": {
                "timestamps": ["2026-03-14T01:00:00Z", "2026-03-14T02:00:00Z"],
                "datasets": [{"label": "rx_count", "data": [5, 7]}]
            },
            "txPackets": {
                "timestamps": ["2026-03-14T01:00:00Z"],
                "datasets": [{"label": "tx_count", "data": [2]}]
            }
        }"#;

        let response: GetGatewayMetricsResponse = serde_json::from_str(body).unwrap();
        let metrics = GatewayMetrics::from(response);

        assert_eq!(metrics.rx_packets.timestamps.len(), 2);
        assert_eq!(metrics.rx_packets.datasets[0].label, "rx_count");
        assert_eq!(metrics.rx_packets.datasets[0].data, vec![5.0, 7.0]);
        assert_eq!(metrics.tx_packets.datasets[0].data, vec![2.0]);
    }

    #[test]
    fn missing_metric_fields_default_to_empty() {
        let response: GetGatewayMetricsResponse = serde_json::from_str("{}").unwrap();

        assert!(response.rx_packets.timestamps.is_empty());
        assert!(response.tx_packets.datasets.is_empty());
    }

    #[test]
    fn create_request_serializes_camel_case() {
        let gateway = NetworkServerGateway {
            gateway_id: "0016C001F153A14C".to_string(),
            name: "rooftop-a".to_string(),
            description: None,
            latitude: 55.6,
            longitude: 12.5,
            altitude: None,
            tenant_id: "52f14cd4-c6f1-4fbd-8f87-4025e1d49242".to_string(),
            stats_interval_secs: 30,
            tags: HashMap::new(),
        };

        let request = CreateGatewayRequest {
            gateway: ApiGateway::from(&gateway),
        };
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["gateway"]["gatewayId"], "0016c001f153a14c");
        assert_eq!(body["gateway"]["tenantId"], "52f14cd4-c6f1-4fbd-8f87-4025e1d49242");
        assert_eq!(body["gateway"]["statsInterval"], 30);
        assert_eq!(body["gateway"]["location"]["latitude"], 55.6);
    }

    #[test]
    fn list_response_parses_partial_items() {
        let body = r#"{
            "totalCount": 2,
            "result": [
                {"gatewayId": "0016c001f153a14c", "name": "rooftop-a", "tenantId": "t-1"},
                {"gatewayId": "00800000a0001a2b", "name": "basement", "tenantId": "t-1",
                 "lastSeenAt": "2026-03-14T02:00:00Z"}
            ]
        }"#;

        let response: ListGatewaysResponse = serde_json::from_str(body).unwrap();
        let page = NetworkServerGatewayPage::from(response);

        assert_eq!(page.total_count, 2);
        assert_eq!(page.result.len(), 2);
        assert!(page.result[0].last_seen_at.is_none());
        assert!(page.result[1].last_seen_at.is_some());
    }
}
