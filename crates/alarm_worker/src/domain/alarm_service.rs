use crate::domain::{
    OfflineAlarmState, OfflineTransition, back_online_mail, evaluate_offline_transition,
    offline_mail, unusual_traffic_mail,
};
use chrono::{DateTime, Duration, Utc};
use common::domain::{
    DomainResult, Gateway, GatewayRepository, MailSender, MetricAggregation, NetworkServerClient,
    collect_gateway_stats,
};
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Debug, Clone)]
pub struct AlarmServiceConfig {
    /// Base URL of the fleet frontend, used for links in notification mails
    pub frontend_base_url: String,
}

/// Watches the fleet and mails the configured contact when a gateway goes
/// quiet, comes back, or moves an unusual amount of traffic.
pub struct AlarmService {
    gateway_repository: Arc<dyn GatewayRepository>,
    network_server: Arc<dyn NetworkServerClient>,
    mail_sender: Arc<dyn MailSender>,
    config: AlarmServiceConfig,
}

impl AlarmService {
    pub fn new(
        gateway_repository: Arc<dyn GatewayRepository>,
        network_server: Arc<dyn NetworkServerClient>,
        mail_sender: Arc<dyn MailSender>,
        config: AlarmServiceConfig,
    ) -> Self {
        Self {
            gateway_repository,
            network_server,
            mail_sender,
            config,
        }
    }

    /// One alarm sweep: the offline pass, then the traffic pass
    pub async fn run_alarm_tick(&self) -> DomainResult<()> {
        self.run_offline_pass().await?;
        self.run_traffic_pass().await?;
        Ok(())
    }

    /// Check every gateway with the offline alarm enabled. A failing gateway
    /// is logged and skipped so one bad record cannot silence the rest.
    pub async fn run_offline_pass(&self) -> DomainResult<()> {
        let gateways = self
            .gateway_repository
            .list_offline_alarm_gateways()
            .await?;
        debug!(count = gateways.len(), "Checking offline alarms");

        let now = Utc::now();
        for gateway in gateways {
            if let Err(error) = self.evaluate_offline(&gateway, now).await {
                error!(
                    gateway_id = %gateway.gateway_id,
                    error = %error,
                    "Offline alarm evaluation failed"
                );
            }
        }
        Ok(())
    }

    /// Check every gateway with the unusual-traffic alarm enabled
    pub async fn run_traffic_pass(&self) -> DomainResult<()> {
        let gateways = self
            .gateway_repository
            .list_traffic_alarm_gateways()
            .await?;
        debug!(count = gateways.len(), "Checking traffic alarms");

        let now = Utc::now();
        for gateway in gateways {
            if let Err(error) = self.evaluate_traffic(&gateway, now).await {
                error!(
                    gateway_id = %gateway.gateway_id,
                    error = %error,
                    "Traffic alarm evaluation failed"
                );
            }
        }
        Ok(())
    }

    async fn evaluate_offline(&self, gateway: &Gateway, now: DateTime<Utc>) -> DomainResult<()> {
        let Some(last_seen_at) = gateway.last_seen_at else {
            return Ok(());
        };
        let Some(threshold_minutes) = gateway.offline_alarm_threshold_minutes else {
            return Ok(());
        };
        let Some(alarm_mail) = gateway.alarm_mail.as_deref() else {
            return Ok(());
        };

        let state = OfflineAlarmState::from_latch(gateway.has_sent_offline_notification);
        match evaluate_offline_transition(state, now - last_seen_at, threshold_minutes) {
            Some(OfflineTransition::RaiseAlarm) => {
                info!(
                    gateway_id = %gateway.gateway_id,
                    "Gateway crossed its offline threshold, notifying"
                );
                self.mail_sender
                    .send_mail(offline_mail(
                        alarm_mail,
                        gateway,
                        &self.config.frontend_base_url,
                    ))
                    .await?;
                // Latch only after the mail went out; a failed send retries
                // on the next tick
                self.gateway_repository
                    .set_offline_notification_sent(&gateway.gateway_id, true)
                    .await?;
            }
            Some(OfflineTransition::ClearAlarm) => {
                info!(gateway_id = %gateway.gateway_id, "Gateway is back online, notifying");
                self.mail_sender
                    .send_mail(back_online_mail(
                        alarm_mail,
                        gateway,
                        last_seen_at,
                        &self.config.frontend_base_url,
                    ))
                    .await?;
                self.gateway_repository
                    .set_offline_notification_sent(&gateway.gateway_id, false)
                    .await?;
            }
            None => {}
        }
        Ok(())
    }

    async fn evaluate_traffic(&self, gateway: &Gateway, now: DateTime<Utc>) -> DomainResult<()> {
        if gateway.last_seen_at.is_none() {
            return Ok(());
        }
        let (Some(minimum), Some(maximum)) = (gateway.minimum_packages, gateway.maximum_packages)
        else {
            return Ok(());
        };
        let Some(alarm_mail) = gateway.alarm_mail.as_deref() else {
            return Ok(());
        };

        // One daily bucket, queried as a point window at this time yesterday
        let yesterday = now - Duration::days(1);
        let samples = collect_gateway_stats(
            self.network_server.as_ref(),
            &gateway.gateway_id,
            yesterday,
            yesterday,
            MetricAggregation::Day,
        )
        .await?;
        // A gateway the control plane has no bucket for received nothing
        let received = samples
            .first()
            .map(|sample| sample.rx_packets_received)
            .unwrap_or(0);

        if minimum <= received && received <= maximum {
            return Ok(());
        }

        info!(
            gateway_id = %gateway.gateway_id,
            received,
            minimum,
            maximum,
            "Gateway packet count outside its configured range, notifying"
        );
        // No latch here: the notice repeats every tick until the count is
        // back in range
        self.mail_sender
            .send_mail(unusual_traffic_mail(
                alarm_mail,
                gateway,
                received,
                minimum,
                maximum,
                &self.config.frontend_base_url,
            ))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::{
        DomainError, GatewayMetrics, MetricDataset, MetricSeries, MockGatewayRepository,
        MockMailSender, MockNetworkServerClient, NetworkServerError, RX_COUNT_LABEL,
    };
    use std::collections::HashMap;

    const GATEWAY_ID: &str = "0016c001f153a14c";

    fn service(
        gateway_repo: MockGatewayRepository,
        network_server: MockNetworkServerClient,
        mail_sender: MockMailSender,
    ) -> AlarmService {
        AlarmService::new(
            Arc::new(gateway_repo),
            Arc::new(network_server),
            Arc::new(mail_sender),
            AlarmServiceConfig {
                frontend_base_url: "https://fleet.example.com".to_string(),
            },
        )
    }

    fn gateway(gateway_id: &str) -> Gateway {
        Gateway {
            gateway_id: gateway_id.to_string(),
            organization_id: "org-001".to_string(),
            organization_name: "Test Org".to_string(),
            name: "rooftop-a".to_string(),
            description: None,
            model_name: None,
            placement: None,
            antenna_type: None,
            latitude: 57.04,
            longitude: 9.92,
            altitude: None,
            rx_packets_received: 0,
            tx_packets_emitted: 0,
            notify_offline: true,
            offline_alarm_threshold_minutes: Some(10),
            notify_unusual_packages: false,
            minimum_packages: None,
            maximum_packages: None,
            alarm_mail: Some("noc@example.com".to_string()),
            has_sent_offline_notification: false,
            last_seen_at: Some(Utc::now()),
            tags: HashMap::new(),
            created_by: None,
            updated_by: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn silent_gateway(minutes: i64) -> Gateway {
        let mut gateway = gateway(GATEWAY_ID);
        gateway.last_seen_at = Some(Utc::now() - Duration::minutes(minutes));
        gateway
    }

    fn traffic_gateway(minimum: i64, maximum: i64) -> Gateway {
        let mut gateway = gateway(GATEWAY_ID);
        gateway.notify_unusual_packages = true;
        gateway.minimum_packages = Some(minimum);
        gateway.maximum_packages = Some(maximum);
        gateway
    }

    fn daily_metrics(rx_count: f64) -> GatewayMetrics {
        GatewayMetrics {
            rx_packets: MetricSeries {
                timestamps: vec![Utc::now() - Duration::days(1)],
                datasets: vec![MetricDataset {
                    label: RX_COUNT_LABEL.to_string(),
                    data: vec![rx_count],
                }],
            },
            tx_packets: MetricSeries::default(),
        }
    }

    #[tokio::test]
    async fn test_offline_alarm_sends_and_latches() {
        let mut gateway_repo = MockGatewayRepository::new();
        let mut mail_sender = MockMailSender::new();

        gateway_repo
            .expect_list_offline_alarm_gateways()
            .times(1)
            .return_once(|| Ok(vec![silent_gateway(15)]));
        mail_sender
            .expect_send_mail()
            .withf(|message| {
                message.to == "noc@example.com" && message.subject.contains("is offline")
            })
            .times(1)
            .return_once(|_| Ok(()));
        gateway_repo
            .expect_set_offline_notification_sent()
            .withf(|gateway_id: &str, sent: &bool| gateway_id == GATEWAY_ID && *sent)
            .times(1)
            .return_once(|_, _| Ok(()));

        let service = service(gateway_repo, MockNetworkServerClient::new(), mail_sender);

        service.run_offline_pass().await.unwrap();
    }

    #[tokio::test]
    async fn test_offline_alarm_not_resent_while_latched() {
        let mut gateway_repo = MockGatewayRepository::new();

        gateway_repo
            .expect_list_offline_alarm_gateways()
            .times(1)
            .return_once(|| {
                let mut latched = silent_gateway(45);
                latched.has_sent_offline_notification = true;
                Ok(vec![latched])
            });

        // No mail expectation: a send would fail the test
        let service = service(
            gateway_repo,
            MockNetworkServerClient::new(),
            MockMailSender::new(),
        );

        service.run_offline_pass().await.unwrap();
    }

    #[tokio::test]
    async fn test_offline_recovery_sends_and_unlatches() {
        let mut gateway_repo = MockGatewayRepository::new();
        let mut mail_sender = MockMailSender::new();

        gateway_repo
            .expect_list_offline_alarm_gateways()
            .times(1)
            .return_once(|| {
                let mut recovered = silent_gateway(1);
                recovered.has_sent_offline_notification = true;
                Ok(vec![recovered])
            });
        mail_sender
            .expect_send_mail()
            .withf(|message| message.subject.contains("back online"))
            .times(1)
            .return_once(|_| Ok(()));
        gateway_repo
            .expect_set_offline_notification_sent()
            .withf(|gateway_id: &str, sent: &bool| gateway_id == GATEWAY_ID && !*sent)
            .times(1)
            .return_once(|_, _| Ok(()));

        let service = service(gateway_repo, MockNetworkServerClient::new(), mail_sender);

        service.run_offline_pass().await.unwrap();
    }

    #[tokio::test]
    async fn test_offline_pass_skips_unreported_gateways() {
        let mut gateway_repo = MockGatewayRepository::new();

        gateway_repo
            .expect_list_offline_alarm_gateways()
            .times(1)
            .return_once(|| {
                let mut never_seen = gateway(GATEWAY_ID);
                never_seen.last_seen_at = None;
                Ok(vec![never_seen])
            });

        let service = service(
            gateway_repo,
            MockNetworkServerClient::new(),
            MockMailSender::new(),
        );

        service.run_offline_pass().await.unwrap();
    }

    #[tokio::test]
    async fn test_offline_pass_skips_gateways_without_mail() {
        let mut gateway_repo = MockGatewayRepository::new();

        gateway_repo
            .expect_list_offline_alarm_gateways()
            .times(1)
            .return_once(|| {
                let mut no_mail = silent_gateway(15);
                no_mail.alarm_mail = None;
                Ok(vec![no_mail])
            });

        let service = service(
            gateway_repo,
            MockNetworkServerClient::new(),
            MockMailSender::new(),
        );

        service.run_offline_pass().await.unwrap();
    }

    #[tokio::test]
    async fn test_offline_latch_kept_when_mail_fails() {
        let mut gateway_repo = MockGatewayRepository::new();
        let mut mail_sender = MockMailSender::new();

        gateway_repo
            .expect_list_offline_alarm_gateways()
            .times(1)
            .return_once(|| Ok(vec![silent_gateway(15)]));
        mail_sender
            .expect_send_mail()
            .times(1)
            .return_once(|_| Err(DomainError::MailDelivery("relay down".to_string())));

        // No latch expectation: the latch must stay untouched so the next
        // tick retries the send
        let service = service(gateway_repo, MockNetworkServerClient::new(), mail_sender);

        service.run_offline_pass().await.unwrap();
    }

    #[tokio::test]
    async fn test_offline_failure_does_not_stop_later_gateways() {
        let mut gateway_repo = MockGatewayRepository::new();
        let mut mail_sender = MockMailSender::new();

        gateway_repo
            .expect_list_offline_alarm_gateways()
            .times(1)
            .return_once(|| {
                let first = silent_gateway(15);
                let mut second = silent_gateway(20);
                second.gateway_id = "00aabbccddeeff11".to_string();
                second.alarm_mail = Some("second@example.com".to_string());
                Ok(vec![first, second])
            });
        mail_sender.expect_send_mail().times(2).returning(|message| {
            if message.to == "noc@example.com" {
                Err(DomainError::MailDelivery("relay down".to_string()))
            } else {
                Ok(())
            }
        });
        gateway_repo
            .expect_set_offline_notification_sent()
            .withf(|gateway_id: &str, _| gateway_id == "00aabbccddeeff11")
            .times(1)
            .return_once(|_, _| Ok(()));

        let service = service(gateway_repo, MockNetworkServerClient::new(), mail_sender);

        service.run_offline_pass().await.unwrap();
    }

    #[tokio::test]
    async fn test_traffic_alarm_mails_when_below_minimum() {
        let mut gateway_repo = MockGatewayRepository::new();
        let mut network_server = MockNetworkServerClient::new();
        let mut mail_sender = MockMailSender::new();

        gateway_repo
            .expect_list_traffic_alarm_gateways()
            .times(1)
            .return_once(|| Ok(vec![traffic_gateway(10, 100)]));
        network_server
            .expect_get_gateway_metrics()
            .withf(|gateway_id: &str, from, to, aggregation| {
                gateway_id == GATEWAY_ID && from == to && *aggregation == MetricAggregation::Day
            })
            .times(1)
            .return_once(|_, _, _, _| Ok(daily_metrics(3.0)));
        mail_sender
            .expect_send_mail()
            .withf(|message| message.subject.contains("unusual packet pattern"))
            .times(1)
            .return_once(|_| Ok(()));

        let service = service(gateway_repo, network_server, mail_sender);

        service.run_traffic_pass().await.unwrap();
    }

    #[tokio::test]
    async fn test_traffic_alarm_quiet_inside_range() {
        let mut gateway_repo = MockGatewayRepository::new();
        let mut network_server = MockNetworkServerClient::new();

        gateway_repo
            .expect_list_traffic_alarm_gateways()
            .times(1)
            .return_once(|| Ok(vec![traffic_gateway(10, 100)]));
        network_server
            .expect_get_gateway_metrics()
            .times(1)
            .return_once(|_, _, _, _| Ok(daily_metrics(50.0)));

        let service = service(gateway_repo, network_server, MockMailSender::new());

        service.run_traffic_pass().await.unwrap();
    }

    #[tokio::test]
    async fn test_traffic_alarm_bounds_are_inclusive() {
        let mut gateway_repo = MockGatewayRepository::new();
        let mut network_server = MockNetworkServerClient::new();

        gateway_repo
            .expect_list_traffic_alarm_gateways()
            .times(1)
            .return_once(|| Ok(vec![traffic_gateway(10, 100)]));
        network_server
            .expect_get_gateway_metrics()
            .times(1)
            .return_once(|_, _, _, _| Ok(daily_metrics(100.0)));

        let service = service(gateway_repo, network_server, MockMailSender::new());

        service.run_traffic_pass().await.unwrap();
    }

    #[tokio::test]
    async fn test_traffic_alarm_counts_missing_bucket_as_zero() {
        let mut gateway_repo = MockGatewayRepository::new();
        let mut network_server = MockNetworkServerClient::new();
        let mut mail_sender = MockMailSender::new();

        gateway_repo
            .expect_list_traffic_alarm_gateways()
            .times(1)
            .return_once(|| Ok(vec![traffic_gateway(10, 100)]));
        network_server
            .expect_get_gateway_metrics()
            .times(1)
            .return_once(|_, _, _, _| Ok(GatewayMetrics::default()));
        mail_sender
            .expect_send_mail()
            .withf(|message| message.html_body.contains("last day: 0"))
            .times(1)
            .return_once(|_| Ok(()));

        let service = service(gateway_repo, network_server, mail_sender);

        service.run_traffic_pass().await.unwrap();
    }

    #[tokio::test]
    async fn test_traffic_alarm_skips_partial_configuration() {
        let mut gateway_repo = MockGatewayRepository::new();

        gateway_repo
            .expect_list_traffic_alarm_gateways()
            .times(1)
            .return_once(|| {
                let mut partial = traffic_gateway(10, 100);
                partial.maximum_packages = None;
                Ok(vec![partial])
            });

        // No metrics expectation: the control plane must not be queried
        let service = service(
            gateway_repo,
            MockNetworkServerClient::new(),
            MockMailSender::new(),
        );

        service.run_traffic_pass().await.unwrap();
    }

    #[tokio::test]
    async fn test_traffic_alarm_skips_unreported_gateways() {
        let mut gateway_repo = MockGatewayRepository::new();

        gateway_repo
            .expect_list_traffic_alarm_gateways()
            .times(1)
            .return_once(|| {
                let mut never_seen = traffic_gateway(10, 100);
                never_seen.last_seen_at = None;
                Ok(vec![never_seen])
            });

        let service = service(
            gateway_repo,
            MockNetworkServerClient::new(),
            MockMailSender::new(),
        );

        service.run_traffic_pass().await.unwrap();
    }

    #[tokio::test]
    async fn test_traffic_alarm_repeats_every_tick() {
        let mut gateway_repo = MockGatewayRepository::new();
        let mut network_server = MockNetworkServerClient::new();
        let mut mail_sender = MockMailSender::new();

        gateway_repo
            .expect_list_traffic_alarm_gateways()
            .times(2)
            .returning(|| Ok(vec![traffic_gateway(10, 100)]));
        network_server
            .expect_get_gateway_metrics()
            .times(2)
            .returning(|_, _, _, _| Ok(daily_metrics(500.0)));
        mail_sender
            .expect_send_mail()
            .times(2)
            .returning(|_| Ok(()));

        let service = service(gateway_repo, network_server, mail_sender);

        service.run_traffic_pass().await.unwrap();
        service.run_traffic_pass().await.unwrap();
    }

    #[tokio::test]
    async fn test_traffic_metrics_failure_does_not_stop_later_gateways() {
        let mut gateway_repo = MockGatewayRepository::new();
        let mut network_server = MockNetworkServerClient::new();
        let mut mail_sender = MockMailSender::new();

        gateway_repo
            .expect_list_traffic_alarm_gateways()
            .times(1)
            .return_once(|| {
                let first = traffic_gateway(10, 100);
                let mut second = traffic_gateway(10, 100);
                second.gateway_id = "00aabbccddeeff11".to_string();
                Ok(vec![first, second])
            });
        network_server
            .expect_get_gateway_metrics()
            .times(2)
            .returning(|gateway_id, _, _, _| {
                if gateway_id == GATEWAY_ID {
                    Err(NetworkServerError::Api {
                        status: 500,
                        body: "boom".to_string(),
                    })
                } else {
                    Ok(daily_metrics(500.0))
                }
            });
        mail_sender
            .expect_send_mail()
            .times(1)
            .return_once(|_| Ok(()));

        let service = service(gateway_repo, network_server, mail_sender);

        service.run_traffic_pass().await.unwrap();
    }

    #[tokio::test]
    async fn test_alarm_tick_runs_both_passes() {
        let mut gateway_repo = MockGatewayRepository::new();
        let mut network_server = MockNetworkServerClient::new();
        let mut mail_sender = MockMailSender::new();

        gateway_repo
            .expect_list_offline_alarm_gateways()
            .times(1)
            .return_once(|| Ok(vec![silent_gateway(15)]));
        gateway_repo
            .expect_set_offline_notification_sent()
            .times(1)
            .return_once(|_, _| Ok(()));
        gateway_repo
            .expect_list_traffic_alarm_gateways()
            .times(1)
            .return_once(|| Ok(vec![traffic_gateway(10, 100)]));
        network_server
            .expect_get_gateway_metrics()
            .times(1)
            .return_once(|_, _, _, _| Ok(daily_metrics(500.0)));
        mail_sender
            .expect_send_mail()
            .times(2)
            .returning(|_| Ok(()));

        let service = service(gateway_repo, network_server, mail_sender);

        service.run_alarm_tick().await.unwrap();
    }
}
