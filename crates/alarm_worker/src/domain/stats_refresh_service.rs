use chrono::{Duration, Utc};
use common::domain::{
    DomainResult, GatewayRepository, MetricAggregation, NetworkServerClient,
    NetworkServerGatewayListItem, RecordGatewayStatusInput, UpdateGatewayStatsInput,
    collect_gateway_stats, sum_packet_samples,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// A gateway that reported within this many minutes logs as online
pub const ONLINE_GRACE_MINUTES: i64 = 10;

/// Hours of hourly buckets summed into the usage counters
const STATS_LOOKBACK_HOURS: i64 = 24;

#[derive(Debug, Clone)]
pub struct StatsRefreshConfig {
    /// Page size for the external gateway listing
    pub page_size: i64,
}

impl Default for StatsRefreshConfig {
    fn default() -> Self {
        Self { page_size: 1000 }
    }
}

/// Walks the control plane's gateway list and refreshes local liveness and
/// usage counters, appending one status log row per known gateway as it goes.
pub struct StatsRefreshService {
    gateway_repository: Arc<dyn GatewayRepository>,
    network_server: Arc<dyn NetworkServerClient>,
    config: StatsRefreshConfig,
}

impl StatsRefreshService {
    pub fn new(
        gateway_repository: Arc<dyn GatewayRepository>,
        network_server: Arc<dyn NetworkServerClient>,
        config: StatsRefreshConfig,
    ) -> Self {
        Self {
            gateway_repository,
            network_server,
            config,
        }
    }

    /// One refresh sweep over the whole fleet. Items that fail are logged and
    /// skipped; a listing failure aborts the sweep.
    pub async fn refresh_all(&self) -> DomainResult<()> {
        let mut offset = 0;
        let mut refreshed = 0usize;

        loop {
            let page = self
                .network_server
                .list_gateways(self.config.page_size, offset)
                .await?;
            if page.result.is_empty() {
                break;
            }

            for item in &page.result {
                match self.refresh_one(item).await {
                    Ok(true) => refreshed += 1,
                    Ok(false) => {}
                    Err(error) => {
                        warn!(
                            gateway_id = %item.gateway_id,
                            error = %error,
                            "Skipping gateway stats refresh"
                        );
                    }
                }
            }

            offset += page.result.len() as i64;
            if offset >= page.total_count {
                break;
            }
        }

        debug!(refreshed, "Refreshed gateway stats");
        Ok(())
    }

    /// Returns whether the item matched a local record
    async fn refresh_one(&self, item: &NetworkServerGatewayListItem) -> DomainResult<bool> {
        let gateway_id = item.gateway_id.to_lowercase();
        if self
            .gateway_repository
            .get_gateway(&gateway_id)
            .await?
            .is_none()
        {
            // The control plane may track tenants outside this fleet
            debug!(gateway_id = %gateway_id, "No local record, skipping");
            return Ok(false);
        }

        let now = Utc::now();
        let samples = collect_gateway_stats(
            self.network_server.as_ref(),
            &gateway_id,
            now - Duration::hours(STATS_LOOKBACK_HOURS),
            now,
            MetricAggregation::Hour,
        )
        .await?;
        let (rx_packets_received, tx_packets_emitted) = sum_packet_samples(&samples);

        self.gateway_repository
            .update_gateway_stats(UpdateGatewayStatsInput {
                gateway_id: gateway_id.clone(),
                rx_packets_received,
                tx_packets_emitted,
                last_seen_at: item.last_seen_at,
            })
            .await?;

        let was_online = item
            .last_seen_at
            .map(|seen_at| now - seen_at <= Duration::minutes(ONLINE_GRACE_MINUTES))
            .unwrap_or(false);
        self.gateway_repository
            .record_gateway_status(RecordGatewayStatusInput {
                gateway_id,
                was_online,
                last_seen_at: item.last_seen_at,
            })
            .await?;

        Ok(true)
    }
}
