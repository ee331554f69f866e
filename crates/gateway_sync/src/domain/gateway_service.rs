use chrono::{Duration, Utc};
use common::domain::{
    CreateGatewayInput, CreateGatewayRecord, DeleteGatewayOutcome, DomainError, DomainResult,
    Gateway, GatewayAnnotations, GatewayPage, GatewayRepository, GatewayWithStats,
    ListGatewaysInput, MetricAggregation, NetworkServerClient, NetworkServerGateway,
    OrganizationAccessChecker, OrganizationRepository, UpdateGatewayInput, UpdateGatewayRecord,
    collect_gateway_stats, encode_tags, require_gateway_write_access, validate_user_tags,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Days of daily packet history attached to a gateway read
pub const GATEWAY_STATS_INTERVAL_DAYS: i64 = 29;

/// Reporting interval pushed to the network server on every write
pub const NETWORK_SERVER_STATS_INTERVAL_SECS: u32 = 30;

#[derive(Debug, Clone)]
pub struct GatewayServiceConfig {
    /// Tenant used on the network server when the caller does not name one
    pub network_server_tenant_id: String,
}

/// Keeps gateway records consistent across the local store and the network
/// server. Each write follows a fixed order between the two planes so that a
/// failure leaves at most one plane stale, never both half-written.
pub struct GatewayService {
    gateway_repository: Arc<dyn GatewayRepository>,
    organization_repository: Arc<dyn OrganizationRepository>,
    network_server: Arc<dyn NetworkServerClient>,
    access_checker: Arc<dyn OrganizationAccessChecker>,
    config: GatewayServiceConfig,
}

impl GatewayService {
    pub fn new(
        gateway_repository: Arc<dyn GatewayRepository>,
        organization_repository: Arc<dyn OrganizationRepository>,
        network_server: Arc<dyn NetworkServerClient>,
        access_checker: Arc<dyn OrganizationAccessChecker>,
        config: GatewayServiceConfig,
    ) -> Self {
        Self {
            gateway_repository,
            organization_repository,
            network_server,
            access_checker,
            config,
        }
    }

    /// Create a gateway on both planes: network server first, then the local
    /// store. A failed external create leaves nothing behind locally.
    #[instrument(
        skip(self, input),
        fields(gateway_id = %input.gateway_id, organization_id = %input.organization_id)
    )]
    pub async fn create_gateway(
        &self,
        input: CreateGatewayInput,
        actor_id: &str,
    ) -> DomainResult<Gateway> {
        let gateway_id = validate_new_gateway_id(&input.gateway_id)?;
        debug!(
            gateway_id = %gateway_id,
            organization_id = %input.organization_id,
            "Creating gateway"
        );

        validate_alarm_thresholds(input.minimum_packages, input.maximum_packages)?;
        validate_user_tags(&input.tags)?;

        let organization = self
            .organization_repository
            .get_organization(&input.organization_id)
            .await?
            .ok_or_else(|| DomainError::OrganizationNotFound(input.organization_id.clone()))?;

        // Probe the control plane so a duplicate EUI fails before anything is
        // written on either side.
        match self.network_server.get_gateway(&gateway_id).await {
            Ok(_) => return Err(DomainError::GatewayAlreadyExists(gateway_id)),
            Err(source) if source.is_not_found() => {}
            Err(source) => return Err(source.into()),
        }

        let annotations = GatewayAnnotations {
            organization_id: Some(organization.id.clone()),
            created_by: Some(actor_id.to_string()),
            updated_by: Some(actor_id.to_string()),
        };
        let external = self.external_record_for_create(
            &gateway_id,
            &input,
            encode_tags(&input.tags, &annotations),
        );

        self.network_server.create_gateway(&external).await?;

        let record = CreateGatewayRecord {
            gateway_id: gateway_id.clone(),
            organization_id: organization.id,
            name: input.name,
            description: input.description,
            model_name: input.model_name,
            placement: input.placement,
            antenna_type: input.antenna_type,
            latitude: input.latitude,
            longitude: input.longitude,
            altitude: input.altitude,
            notify_offline: input.notify_offline,
            offline_alarm_threshold_minutes: input.offline_alarm_threshold_minutes,
            notify_unusual_packages: input.notify_unusual_packages,
            minimum_packages: input.minimum_packages,
            maximum_packages: input.maximum_packages,
            alarm_mail: input.alarm_mail,
            tags: input.tags,
            created_by: Some(actor_id.to_string()),
            updated_by: Some(actor_id.to_string()),
        };

        let gateway = self.gateway_repository.create_gateway(record).await?;

        info!(gateway_id = %gateway.gateway_id, "Gateway created");
        Ok(gateway)
    }

    /// Replace a gateway's contents. The local row is written first: it is
    /// the ownership authority, and a failed external push leaves a stale
    /// radio plane rather than a lost user edit.
    #[instrument(skip(self, input), fields(gateway_id = %gateway_id))]
    pub async fn update_gateway(
        &self,
        gateway_id: &str,
        input: UpdateGatewayInput,
        actor_id: &str,
    ) -> DomainResult<Gateway> {
        let gateway_id = normalize_gateway_id(gateway_id)?;
        debug!(gateway_id = %gateway_id, "Updating gateway");

        let current = self
            .gateway_repository
            .get_gateway(&gateway_id)
            .await?
            .ok_or_else(|| DomainError::GatewayNotFound(gateway_id.clone()))?;

        require_gateway_write_access(
            self.access_checker.as_ref(),
            actor_id,
            &current.organization_id,
        )
        .await?;

        validate_alarm_thresholds(input.minimum_packages, input.maximum_packages)?;
        validate_user_tags(&input.tags)?;

        let record = UpdateGatewayRecord {
            gateway_id: gateway_id.clone(),
            name: input.name.clone(),
            description: input.description.clone(),
            model_name: input.model_name.clone(),
            placement: input.placement.clone(),
            antenna_type: input.antenna_type.clone(),
            latitude: input.latitude,
            longitude: input.longitude,
            altitude: input.altitude,
            notify_offline: input.notify_offline,
            offline_alarm_threshold_minutes: input.offline_alarm_threshold_minutes,
            notify_unusual_packages: input.notify_unusual_packages,
            minimum_packages: input.minimum_packages,
            maximum_packages: input.maximum_packages,
            alarm_mail: input.alarm_mail.clone(),
            tags: input.tags.clone(),
            updated_by: Some(actor_id.to_string()),
        };

        let gateway = self.gateway_repository.update_gateway(record).await?;

        let annotations = GatewayAnnotations {
            organization_id: Some(current.organization_id.clone()),
            created_by: current.created_by.clone(),
            updated_by: Some(actor_id.to_string()),
        };
        let external = self.external_record_for_update(
            &gateway_id,
            &input,
            encode_tags(&input.tags, &annotations),
        );

        if let Err(source) = self.network_server.update_gateway(&external).await {
            if source.is_not_found() {
                // The record fell out of the control plane; recreate it from
                // the update payload instead of failing the edit.
                warn!(gateway_id = %gateway_id, "Gateway missing on network server, recreating");
                self.network_server.create_gateway(&external).await?;
            } else {
                return Err(source.into());
            }
        }

        info!(gateway_id = %gateway.gateway_id, "Gateway updated");
        Ok(gateway)
    }

    /// Remove a gateway from both planes, local store first. The local
    /// deletion stands even when the external one fails; the outcome reports
    /// whether the control plane kept its half.
    #[instrument(skip(self), fields(gateway_id = %gateway_id))]
    pub async fn delete_gateway(&self, gateway_id: &str) -> DomainResult<DeleteGatewayOutcome> {
        let gateway_id = normalize_gateway_id(gateway_id)?;
        debug!(gateway_id = %gateway_id, "Deleting gateway");

        self.gateway_repository.delete_gateway(&gateway_id).await?;

        match self.network_server.delete_gateway(&gateway_id).await {
            Ok(()) => {
                info!(gateway_id = %gateway_id, "Gateway deleted");
                Ok(DeleteGatewayOutcome::Deleted)
            }
            // Already absent upstream: both planes now agree the record is gone
            Err(source) if source.is_not_found() => {
                info!(gateway_id = %gateway_id, "Gateway deleted");
                Ok(DeleteGatewayOutcome::Deleted)
            }
            Err(source) => {
                warn!(
                    gateway_id = %gateway_id,
                    error = %source,
                    "Gateway removed locally but the network server delete failed"
                );
                Ok(DeleteGatewayOutcome::LocalOnly { source })
            }
        }
    }

    /// Get a gateway with its recent daily packet history overlaid from the
    /// control plane
    #[instrument(skip(self), fields(gateway_id = %gateway_id))]
    pub async fn get_gateway(&self, gateway_id: &str) -> DomainResult<GatewayWithStats> {
        let gateway_id = normalize_gateway_id(gateway_id)?;
        debug!(gateway_id = %gateway_id, "Getting gateway");

        let gateway = self
            .gateway_repository
            .get_gateway(&gateway_id)
            .await?
            .ok_or_else(|| DomainError::GatewayNotFound(gateway_id.clone()))?;

        let to = Utc::now();
        let from = to - Duration::days(GATEWAY_STATS_INTERVAL_DAYS);
        let stats = collect_gateway_stats(
            self.network_server.as_ref(),
            &gateway_id,
            from,
            to,
            MetricAggregation::Day,
        )
        .await?;

        Ok(GatewayWithStats::new(gateway, stats))
    }

    /// List gateways from the local store
    #[instrument(skip(self))]
    pub async fn list_gateways(&self, input: ListGatewaysInput) -> DomainResult<GatewayPage> {
        debug!(
            organization_id = ?input.organization_id,
            limit = input.limit,
            offset = input.offset,
            "Listing gateways"
        );

        self.gateway_repository.list_gateways(input).await
    }

    /// Move a gateway to another organization. The network server keeps its
    /// tenant assignment; the ownership tag upstream catches up on the next
    /// update.
    #[instrument(skip(self), fields(gateway_id = %gateway_id, organization_id = %organization_id))]
    pub async fn change_organization(
        &self,
        gateway_id: &str,
        organization_id: &str,
    ) -> DomainResult<Gateway> {
        let gateway_id = normalize_gateway_id(gateway_id)?;
        debug!(
            gateway_id = %gateway_id,
            organization_id = %organization_id,
            "Changing gateway organization"
        );

        self.gateway_repository
            .get_gateway(&gateway_id)
            .await?
            .ok_or_else(|| DomainError::GatewayNotFound(gateway_id.clone()))?;

        let organization = self
            .organization_repository
            .get_organization(organization_id)
            .await?
            .ok_or_else(|| DomainError::OrganizationNotFound(organization_id.to_string()))?;

        let gateway = self
            .gateway_repository
            .update_gateway_organization(&gateway_id, &organization.id)
            .await?;

        info!(
            gateway_id = %gateway.gateway_id,
            organization_id = %gateway.organization_id,
            "Gateway moved to organization"
        );
        Ok(gateway)
    }

    fn external_record_for_create(
        &self,
        gateway_id: &str,
        input: &CreateGatewayInput,
        tags: HashMap<String, String>,
    ) -> NetworkServerGateway {
        NetworkServerGateway {
            gateway_id: gateway_id.to_string(),
            name: input.name.clone(),
            description: input.description.clone(),
            latitude: input.latitude,
            longitude: input.longitude,
            altitude: input.altitude,
            tenant_id: input
                .tenant_id
                .clone()
                .unwrap_or_else(|| self.config.network_server_tenant_id.clone()),
            stats_interval_secs: NETWORK_SERVER_STATS_INTERVAL_SECS,
            tags,
        }
    }

    fn external_record_for_update(
        &self,
        gateway_id: &str,
        input: &UpdateGatewayInput,
        tags: HashMap<String, String>,
    ) -> NetworkServerGateway {
        NetworkServerGateway {
            gateway_id: gateway_id.to_string(),
            name: input.name.clone(),
            description: input.description.clone(),
            latitude: input.latitude,
            longitude: input.longitude,
            altitude: input.altitude,
            tenant_id: self.config.network_server_tenant_id.clone(),
            stats_interval_secs: NETWORK_SERVER_STATS_INTERVAL_SECS,
            tags,
        }
    }
}

/// Gateway ids are EUI-64s printed as 16 hex characters; comparisons are done
/// lowercase everywhere.
fn normalize_gateway_id(gateway_id: &str) -> DomainResult<String> {
    if gateway_id.len() != 16 {
        return Err(DomainError::InvalidGatewayId(format!(
            "Gateway ID must be 16 characters: {}",
            gateway_id
        )));
    }
    Ok(gateway_id.to_lowercase())
}

fn validate_new_gateway_id(gateway_id: &str) -> DomainResult<String> {
    let gateway_id = normalize_gateway_id(gateway_id)?;
    if !gateway_id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(DomainError::InvalidGatewayId(format!(
            "Gateway ID must be hexadecimal: {}",
            gateway_id
        )));
    }
    Ok(gateway_id)
}

fn validate_alarm_thresholds(minimum: Option<i64>, maximum: Option<i64>) -> DomainResult<()> {
    if let (Some(minimum), Some(maximum)) = (minimum, maximum) {
        if minimum > maximum {
            return Err(DomainError::InvalidAlarmThresholds { minimum, maximum });
        }
    }
    Ok(())
}
