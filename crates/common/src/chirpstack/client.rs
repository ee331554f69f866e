use crate::chirpstack::types::{
    ApiGateway, CreateGatewayRequest, GetGatewayMetricsResponse, GetGatewayResponse,
    ListGatewaysResponse, UpdateGatewayRequest,
};
use crate::domain::{
    GatewayMetrics, MetricAggregation, NetworkServerClient, NetworkServerError,
    NetworkServerGateway, NetworkServerGatewayDetails, NetworkServerGatewayPage,
    NetworkServerResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Header the REST bridge reads the API token from. The bridge forwards it to
/// the gRPC backend as call metadata.
const AUTHORIZATION_HEADER: &str = "Grpc-Metadata-Authorization";

/// ChirpStack REST bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChirpstackConfig {
    pub api_url: String,
    pub api_token: String,
    pub request_timeout_secs: u64,
}

impl Default for ChirpstackConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8090".to_string(),
            api_token: String::new(),
            request_timeout_secs: 30,
        }
    }
}

/// Gateway client for the ChirpStack REST bridge
#[derive(Clone)]
pub struct ChirpstackClient {
    client: Client,
    config: ChirpstackConfig,
}

impl ChirpstackClient {
    pub fn new(config: ChirpstackConfig) -> NetworkServerResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    fn gateways_url(&self) -> String {
        format!("{}/api/gateways", self.config.api_url)
    }

    fn gateway_url(&self, gateway_id: &str) -> String {
        format!("{}/api/gateways/{}", self.config.api_url, gateway_id)
    }

    fn auth_value(&self) -> String {
        format!("Bearer {}", self.config.api_token)
    }

    /// Maps non-success responses into the error taxonomy. 404 stays
    /// distinguishable so callers can react to a missing gateway.
    async fn check_response(object: &str, response: Response) -> NetworkServerResult<Response> {
        if response.status() == StatusCode::NOT_FOUND {
            return Err(NetworkServerError::NotFound(object.to_string()));
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(NetworkServerError::Api { status, body });
        }

        Ok(response)
    }
}

#[async_trait]
impl NetworkServerClient for ChirpstackClient {
    async fn create_gateway(&self, gateway: &NetworkServerGateway) -> NetworkServerResult<()> {
        debug!(gateway_id = %gateway.gateway_id, "Creating gateway on network server");

        let request = CreateGatewayRequest {
            gateway: ApiGateway::from(gateway),
        };

        let response = self
            .client
            .post(self.gateways_url())
            .header(AUTHORIZATION_HEADER, self.auth_value())
            .json(&request)
            .send()
            .await?;

        Self::check_response("gateway", response).await?;
        Ok(())
    }

    async fn get_gateway(
        &self,
        gateway_id: &str,
    ) -> NetworkServerResult<NetworkServerGatewayDetails> {
        debug!(gateway_id = %gateway_id, "Getting gateway from network server");

        let response = self
            .client
            .get(self.gateway_url(&gateway_id.to_lowercase()))
            .header(AUTHORIZATION_HEADER, self.auth_value())
            .send()
            .await?;

        let response = Self::check_response("gateway", response).await?;
        let body: GetGatewayResponse = response.json().await?;

        Ok(body.into())
    }

    async fn update_gateway(&self, gateway: &NetworkServerGateway) -> NetworkServerResult<()> {
        debug!(gateway_id = %gateway.gateway_id, "Updating gateway on network server");

        let request = UpdateGatewayRequest {
            gateway: ApiGateway::from(gateway),
        };

        let response = self
            .client
            .put(self.gateway_url(&gateway.gateway_id.to_lowercase()))
            .header(AUTHORIZATION_HEADER, self.auth_value())
            .json(&request)
            .send()
            .await?;

        Self::check_response("gateway", response).await?;
        Ok(())
    }

    async fn delete_gateway(&self, gateway_id: &str) -> NetworkServerResult<()> {
        debug!(gateway_id = %gateway_id, "Deleting gateway from network server");

        let response = self
            .client
            .delete(self.gateway_url(&gateway_id.to_lowercase()))
            .header(AUTHORIZATION_HEADER, self.auth_value())
            .send()
            .await?;

        Self::check_response("gateway", response).await?;
        Ok(())
    }

    async fn list_gateways(
        &self,
        limit: i64,
        offset: i64,
    ) -> NetworkServerResult<NetworkServerGatewayPage> {
        debug!(limit, offset, "Listing gateways from network server");

        let response = self
            .client
            .get(self.gateways_url())
            .header(AUTHORIZATION_HEADER, self.auth_value())
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .await?;

        let response = Self::check_response("gateways", response).await?;
        let body: ListGatewaysResponse = response.json().await?;

        Ok(body.into())
    }

    async fn get_gateway_metrics(
        &self,
        gateway_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        aggregation: MetricAggregation,
    ) -> NetworkServerResult<GatewayMetrics> {
        debug!(
            gateway_id = %gateway_id,
            aggregation = aggregation.as_str(),
            "Getting gateway metrics from network server"
        );

        let url = format!("{}/metrics", self.gateway_url(&gateway_id.to_lowercase()));

        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION_HEADER, self.auth_value())
            .query(&[
                ("start", from.to_rfc3339()),
                ("end", to.to_rfc3339()),
                ("aggregation", aggregation.as_str().to_string()),
            ])
            .send()
            .await?;

        let response = Self::check_response("gateway metrics", response).await?;
        let body: GetGatewayMetricsResponse = response.json().await?;

        Ok(body.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_url_joins_base_and_id() {
        let client = ChirpstackClient::new(ChirpstackConfig {
            api_url: "http://chirpstack:8090".to_string(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(
            client.gateway_url("0016c001f153a14c"),
            "http://chirpstack:8090/api/gateways/0016c001f153a14c"
        );
    }

    #[test]
    fn auth_value_is_a_bearer_token() {
        let client = ChirpstackClient::new(ChirpstackConfig {
            api_token: "secret".to_string(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(client.auth_value(), "Bearer secret");
    }
}
