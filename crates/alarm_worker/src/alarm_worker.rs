use crate::domain::{AlarmService, StatsRefreshService};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct AlarmWorkerConfig {
    pub alarm_interval_secs: u64,
    pub stats_interval_secs: u64,
}

impl Default for AlarmWorkerConfig {
    fn default() -> Self {
        Self {
            alarm_interval_secs: 60,
            stats_interval_secs: 300,
        }
    }
}

/// Background half of the fleet manager: the alarm sweep and the stats
/// refresh, each on its own interval.
pub struct AlarmWorker {
    alarm_service: Arc<AlarmService>,
    stats_service: Arc<StatsRefreshService>,
    config: AlarmWorkerConfig,
}

impl AlarmWorker {
    pub fn new(
        alarm_service: Arc<AlarmService>,
        stats_service: Arc<StatsRefreshService>,
        config: AlarmWorkerConfig,
    ) -> Self {
        Self {
            alarm_service,
            stats_service,
            config,
        }
    }

    #[allow(clippy::type_complexity)]
    pub fn into_runner_processes(
        self,
    ) -> Vec<
        Box<
            dyn FnOnce(
                    CancellationToken,
                ) -> std::pin::Pin<
                    Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
                > + Send,
        >,
    > {
        let alarm_interval = Duration::from_secs(self.config.alarm_interval_secs);
        let stats_interval = Duration::from_secs(self.config.stats_interval_secs);

        vec![
            // Alarm sweep
            Box::new({
                let service = self.alarm_service;
                move |ctx| {
                    Box::pin(async move { run_alarm_loop(service, alarm_interval, ctx).await })
                }
            }),
            // Stats refresh
            Box::new({
                let service = self.stats_service;
                move |ctx| {
                    Box::pin(async move { run_stats_loop(service, stats_interval, ctx).await })
                }
            }),
        ]
    }
}

async fn run_alarm_loop(
    service: Arc<AlarmService>,
    period: Duration,
    ctx: CancellationToken,
) -> anyhow::Result<()> {
    info!(period_secs = period.as_secs(), "Alarm loop started");
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                info!("Alarm loop stopping");
                return Ok(());
            }
            _ = ticker.tick() => {
                if let Err(error) = service.run_alarm_tick().await {
                    error!(error = %error, "Alarm tick failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }
}

async fn run_stats_loop(
    service: Arc<StatsRefreshService>,
    period: Duration,
    ctx: CancellationToken,
) -> anyhow::Result<()> {
    info!(period_secs = period.as_secs(), "Stats refresh loop started");
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                info!("Stats refresh loop stopping");
                return Ok(());
            }
            _ = ticker.tick() => {
                if let Err(error) = service.refresh_all().await {
                    error!(error = %error, "Stats refresh failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AlarmServiceConfig, StatsRefreshConfig};
    use common::domain::{MockGatewayRepository, MockMailSender, MockNetworkServerClient};

    fn worker() -> AlarmWorker {
        let alarm_service = AlarmService::new(
            Arc::new(MockGatewayRepository::new()),
            Arc::new(MockNetworkServerClient::new()),
            Arc::new(MockMailSender::new()),
            AlarmServiceConfig {
                frontend_base_url: "https://fleet.example.com".to_string(),
            },
        );
        let stats_service = StatsRefreshService::new(
            Arc::new(MockGatewayRepository::new()),
            Arc::new(MockNetworkServerClient::new()),
            StatsRefreshConfig::default(),
        );

        AlarmWorker::new(
            Arc::new(alarm_service),
            Arc::new(stats_service),
            AlarmWorkerConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_worker_exposes_both_processes() {
        assert_eq!(worker().into_runner_processes().len(), 2);
    }

    #[tokio::test]
    async fn test_processes_stop_on_cancellation() {
        // Mocks carry no expectations; a tick before shutdown would panic
        let token = CancellationToken::new();
        token.cancel();

        for process in worker().into_runner_processes() {
            process(token.clone()).await.unwrap();
        }
    }
}
