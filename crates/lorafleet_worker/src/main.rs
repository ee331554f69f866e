mod config;

use alarm_worker::alarm_worker::{AlarmWorker, AlarmWorkerConfig};
use alarm_worker::domain::{
    AlarmService, AlarmServiceConfig, StatsRefreshConfig, StatsRefreshService,
};
use common::chirpstack::{ChirpstackClient, ChirpstackConfig};
use common::mail::{HttpMailSender, MailConfig};
use common::postgres::{
    PostgresClient, PostgresConfig, PostgresGatewayRepository, apply_migrations,
};
use common::telemetry::{TelemetryConfig, init_telemetry};
use config::ServiceConfig;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// A long-running worker process. Takes a cancellation token and runs until
/// cancelled or failed.
type WorkerProcess = Box<
    dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
        + Send,
>;

#[tokio::main]
async fn main() {
    // Initialize configuration and tracing
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_telemetry(&TelemetryConfig {
        service_name: "lorafleet-worker".to_string(),
        log_level: config.log_level.clone(),
    }) {
        eprintln!("Failed to initialize telemetry: {}", e);
        std::process::exit(1);
    }

    info!("Starting lorafleet-worker service");
    debug!("Configuration: {:?}", config);

    // Initialize shared dependencies
    let (postgres_client, gateway_repository, network_server, mail_sender) =
        match initialize_shared_dependencies(&config).await {
            Ok(deps) => deps,
            Err(e) => {
                error!("Failed to initialize shared dependencies: {:#}", e);
                std::process::exit(1);
            }
        };

    // Initialize domain services
    let alarm_service = Arc::new(AlarmService::new(
        gateway_repository.clone(),
        network_server.clone(),
        mail_sender,
        AlarmServiceConfig {
            frontend_base_url: config.frontend_base_url.clone(),
        },
    ));
    let stats_service = Arc::new(StatsRefreshService::new(
        gateway_repository,
        network_server,
        StatsRefreshConfig {
            page_size: config.stats_page_size,
        },
    ));

    let worker = AlarmWorker::new(
        alarm_service,
        stats_service,
        AlarmWorkerConfig {
            alarm_interval_secs: config.alarm_check_interval_secs,
            stats_interval_secs: config.stats_refresh_interval_secs,
        },
    );

    let exit_code = run_processes(worker.into_runner_processes()).await;

    postgres_client.close();
    info!("Shutdown complete");

    std::process::exit(exit_code);
}

async fn initialize_shared_dependencies(
    config: &ServiceConfig,
) -> anyhow::Result<(
    PostgresClient,
    Arc<PostgresGatewayRepository>,
    Arc<ChirpstackClient>,
    Arc<HttpMailSender>,
)> {
    // PostgreSQL initialization
    info!("Initializing PostgreSQL...");
    let postgres_client = PostgresClient::new(&PostgresConfig {
        host: config.postgres_host.clone(),
        port: config.postgres_port,
        database: config.postgres_database.clone(),
        username: config.postgres_username.clone(),
        password: config.postgres_password.clone(),
        max_pool_size: config.postgres_max_pool_size,
    })?;
    postgres_client.ping().await?;
    apply_migrations(&postgres_client).await?;

    let gateway_repository = Arc::new(PostgresGatewayRepository::new(postgres_client.clone()));

    // ChirpStack initialization
    info!("Initializing ChirpStack client...");
    let network_server = Arc::new(ChirpstackClient::new(ChirpstackConfig {
        api_url: config.chirpstack_api_url.clone(),
        api_token: config.chirpstack_api_token.clone(),
        request_timeout_secs: config.chirpstack_request_timeout_secs,
    })?);

    // Mail relay initialization
    info!("Initializing mail sender...");
    let mail_sender = Arc::new(HttpMailSender::new(MailConfig {
        relay_url: config.mail_relay_url.clone(),
        from_address: config.mail_from_address.clone(),
        request_timeout_secs: config.mail_request_timeout_secs,
    })?);

    Ok((postgres_client, gateway_repository, network_server, mail_sender))
}

/// Runs all worker processes concurrently until one fails or a shutdown
/// signal arrives, then cancels the rest and waits for them to stop.
/// Returns the process exit code.
async fn run_processes(processes: Vec<WorkerProcess>) -> i32 {
    let token = CancellationToken::new();
    let mut join_set = JoinSet::new();

    for process in processes {
        let process_token = token.clone();
        join_set.spawn(async move { process(process_token).await });
    }

    spawn_signal_watchers(&token);

    let mut first_error = None;
    while let Some(result) = join_set.join_next().await {
        match result {
            Ok(Ok(())) => {
                debug!("Worker process stopped");
            }
            Ok(Err(e)) => {
                if !token.is_cancelled() {
                    error!("Worker process failed: {:#}", e);
                    first_error = Some(e);
                    token.cancel();
                }
            }
            Err(e) => {
                error!("Worker process panicked: {}", e);
                if !token.is_cancelled() {
                    token.cancel();
                }
            }
        }

        if token.is_cancelled() {
            break;
        }
    }

    // Give remaining processes a chance to observe the cancellation
    join_set.shutdown().await;

    if first_error.is_some() { 1 } else { 0 }
}

fn spawn_signal_watchers(token: &CancellationToken) {
    let interrupt_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received interrupt, shutting down");
                interrupt_token.cancel();
            }
            Err(e) => {
                error!("Error setting up interrupt handler: {}", e);
            }
        }
    });

    #[cfg(unix)]
    {
        let sigterm_token = token.clone();
        tokio::spawn(async move {
            use tokio::signal::unix::{SignalKind, signal};

            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                    info!("Received SIGTERM, shutting down");
                    sigterm_token.cancel();
                }
                Err(e) => {
                    error!("Error setting up SIGTERM handler: {}", e);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_processes_returns_zero_when_all_stop_cleanly() {
        let first: WorkerProcess = Box::new(|_ctx: CancellationToken| Box::pin(async { Ok(()) }));

        let second: WorkerProcess = Box::new(|_ctx: CancellationToken| {
            Box::pin(async {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                Ok(())
            })
        });

        let exit_code = run_processes(vec![first, second]).await;

        assert_eq!(exit_code, 0);
    }

    #[tokio::test]
    async fn test_run_processes_returns_one_when_a_process_fails() {
        let failing: WorkerProcess = Box::new(|_ctx: CancellationToken| {
            Box::pin(async { Err(anyhow::anyhow!("worker broke")) })
        });

        let running: WorkerProcess = Box::new(|ctx: CancellationToken| {
            Box::pin(async move {
                ctx.cancelled().await;
                Ok(())
            })
        });

        let exit_code = run_processes(vec![failing, running]).await;

        assert_eq!(exit_code, 1);
    }
}
