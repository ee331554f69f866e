use crate::domain::gateway::Gateway;
use crate::domain::network_server::{
    GatewayMetrics, MetricAggregation, MetricSeries, NetworkServerClient, NetworkServerError,
};
use crate::domain::result::{DomainError, DomainResult};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Dataset label the network server uses for received packet counts
pub const RX_COUNT_LABEL: &str = "rx_count";
/// Dataset label the network server uses for transmitted packet counts
pub const TX_COUNT_LABEL: &str = "tx_count";

/// One point of merged gateway traffic
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayStatsSample {
    pub timestamp: DateTime<Utc>,
    pub rx_packets_received: i64,
    pub tx_packets_emitted: i64,
}

/// A gateway together with its recent traffic history
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayWithStats {
    pub gateway: Gateway,
    pub stats: Vec<GatewayStatsSample>,
}

/// Extract (timestamp, count) pairs for one labeled dataset of a series.
/// Timestamps without a data point and series without the label yield nothing.
fn labeled_points(series: &MetricSeries, label: &str) -> Vec<(DateTime<Utc>, i64)> {
    let Some(dataset) = series.datasets.iter().find(|d| d.label == label) else {
        return Vec::new();
    };

    series
        .timestamps
        .iter()
        .zip(dataset.data.iter())
        .map(|(ts, v)| (*ts, *v as i64))
        .collect()
}

/// Merge the rx and tx packet series of a metrics response into one timeline.
/// Sample order follows first appearance across rx then tx; a timestamp
/// present in only one series gets zero for the other direction.
pub fn fold_packet_series(metrics: &GatewayMetrics) -> Vec<GatewayStatsSample> {
    let mut samples: Vec<GatewayStatsSample> = Vec::new();
    let mut index: HashMap<DateTime<Utc>, usize> = HashMap::new();

    for (timestamp, rx) in labeled_points(&metrics.rx_packets, RX_COUNT_LABEL) {
        match index.get(&timestamp) {
            Some(at) => samples[*at].rx_packets_received = rx,
            None => {
                index.insert(timestamp, samples.len());
                samples.push(GatewayStatsSample {
                    timestamp,
                    rx_packets_received: rx,
                    tx_packets_emitted: 0,
                });
            }
        }
    }

    for (timestamp, tx) in labeled_points(&metrics.tx_packets, TX_COUNT_LABEL) {
        match index.get(&timestamp) {
            Some(at) => samples[*at].tx_packets_emitted = tx,
            None => {
                index.insert(timestamp, samples.len());
                samples.push(GatewayStatsSample {
                    timestamp,
                    rx_packets_received: 0,
                    tx_packets_emitted: tx,
                });
            }
        }
    }

    samples
}

/// Map a metrics fetch failure into the domain taxonomy. A missing gateway on
/// the control plane surfaces as not found rather than a generic API error.
pub fn stats_fetch_error(gateway_id: &str, source: NetworkServerError) -> DomainError {
    if source.is_not_found() {
        DomainError::GatewayNotFound(gateway_id.to_string())
    } else {
        DomainError::NetworkServer(source)
    }
}

/// Fetch a gateway's packet metrics from the control plane and fold them into
/// a single timeline.
pub async fn collect_gateway_stats(
    client: &dyn NetworkServerClient,
    gateway_id: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    aggregation: MetricAggregation,
) -> DomainResult<Vec<GatewayStatsSample>> {
    let metrics = client
        .get_gateway_metrics(gateway_id, from, to, aggregation)
        .await
        .map_err(|source| stats_fetch_error(gateway_id, source))?;

    Ok(fold_packet_series(&metrics))
}

/// Sum a merged timeline into totals
pub fn sum_packet_samples(samples: &[GatewayStatsSample]) -> (i64, i64) {
    samples.iter().fold((0, 0), |(rx, tx), s| {
        (rx + s.rx_packets_received, tx + s.tx_packets_emitted)
    })
}

impl GatewayWithStats {
    pub fn new(gateway: Gateway, stats: Vec<GatewayStatsSample>) -> Self {
        Self { gateway, stats }
    }
}
