use crate::domain::{
    CreateGatewayRecord, DomainError, DomainResult, Gateway, GatewayPage, GatewayRepository,
    ListGatewaysInput, RecordGatewayStatusInput, SortDirection, UpdateGatewayRecord,
    UpdateGatewayStatsInput,
};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio_postgres::Row;
use tracing::{debug, info, warn};

/// Columns selected for every gateway read, with the owning organization
/// joined in for its name
const GATEWAY_COLUMNS: &str = "g.gateway_id, g.organization_id, o.name AS organization_name, \
     g.name, g.description, g.model_name, g.placement, g.antenna_type, \
     g.latitude, g.longitude, g.altitude, \
     g.rx_packets_received, g.tx_packets_emitted, \
     g.notify_offline, g.offline_alarm_threshold_minutes, \
     g.notify_unusual_packages, g.minimum_packages, g.maximum_packages, g.alarm_mail, \
     g.has_sent_offline_notification, g.last_seen_at, g.tags, \
     g.created_by, g.updated_by, g.created_at, g.updated_at";

/// Gateway row for PostgreSQL storage with timestamp metadata
#[derive(Debug, Clone)]
pub struct GatewayRow {
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
    pub rx_packets_received: i64,
    pub tx_packets_emitted: i64,
    pub notify_offline: bool,
    pub offline_alarm_threshold_minutes: Option<i64>,
    pub notify_unusual_packages: bool,
    pub minimum_packages: Option<i64>,
    pub maximum_packages: Option<i64>,
    pub alarm_mail: Option<String>,
    pub has_sent_offline_notification: bool,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub tags: serde_json::Value,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GatewayRow {
    fn from_row(row: &Row) -> Self {
        Self {
            gateway_id: row.get("gateway_id"),
            organization_id: row.get("organization_id"),
            organization_name: row.get("organization_name"),
            name: row.get("name"),
            description: row.get("description"),
            model_name: row.get("model_name"),
            placement: row.get("placement"),
            antenna_type: row.get("antenna_type"),
            latitude: row.get("latitude"),
            longitude: row.get("longitude"),
            altitude: row.get("altitude"),
            rx_packets_received: row.get("rx_packets_received"),
            tx_packets_emitted: row.get("tx_packets_emitted"),
            notify_offline: row.get("notify_offline"),
            offline_alarm_threshold_minutes: row.get("offline_alarm_threshold_minutes"),
            notify_unusual_packages: row.get("notify_unusual_packages"),
            minimum_packages: row.get("minimum_packages"),
            maximum_packages: row.get("maximum_packages"),
            alarm_mail: row.get("alarm_mail"),
            has_sent_offline_notification: row.get("has_sent_offline_notification"),
            last_seen_at: row.get("last_seen_at"),
            tags: row.get("tags"),
            created_by: row.get("created_by"),
            updated_by: row.get("updated_by"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

/// Convert database GatewayRow to domain Gateway
impl From<GatewayRow> for Gateway {
    fn from(row: GatewayRow) -> Self {
        // Convert stored JSON tags to the domain map
        let tags = json_to_tags(&row.tags);

        Gateway {
            gateway_id: row.gateway_id,
            organization_id: row.organization_id,
            organization_name: row.organization_name,
            name: row.name,
            description: row.description,
            model_name: row.model_name,
            placement: row.placement,
            antenna_type: row.antenna_type,
            latitude: row.latitude,
            longitude: row.longitude,
            altitude: row.altitude,
            rx_packets_received: row.rx_packets_received,
            tx_packets_emitted: row.tx_packets_emitted,
            notify_offline: row.notify_offline,
            offline_alarm_threshold_minutes: row.offline_alarm_threshold_minutes,
            notify_unusual_packages: row.notify_unusual_packages,
            minimum_packages: row.minimum_packages,
            maximum_packages: row.maximum_packages,
            alarm_mail: row.alarm_mail,
            has_sent_offline_notification: row.has_sent_offline_notification,
            last_seen_at: row.last_seen_at,
            tags,
            created_by: row.created_by,
            updated_by: row.updated_by,
            created_at: Some(row.created_at),
            updated_at: Some(row.updated_at),
        }
    }
}

/// Convert a domain tag map to JSON for storage
pub fn tags_to_json(tags: &HashMap<String, String>) -> serde_json::Value {
    serde_json::Value::Object(
        tags.iter()
            .map(|(key, value)| (key.clone(), serde_json::Value::String(value.clone())))
            .collect(),
    )
}

/// Convert stored JSON back to a domain tag map, dropping non-string values
fn json_to_tags(json: &serde_json::Value) -> HashMap<String, String> {
    json.as_object()
        .map(|map| {
            map.iter()
                .filter_map(|(key, value)| value.as_str().map(|s| (key.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// Maps a client-facing sort key onto an order-by clause. Nulls sort as the
/// smallest value in both directions.
fn order_by_clause(order_on: Option<&str>, sort: SortDirection) -> String {
    let column = match order_on {
        None => "g.gateway_id",
        Some("gatewayId" | "gateway_id") => "g.gateway_id",
        Some("name") => "g.name",
        Some("organizationName" | "organization_name") => "o.name",
        Some("status" | "lastSeenAt" | "last_seen_at") => "g.last_seen_at",
        Some("createdAt" | "created_at") => "g.created_at",
        Some("updatedAt" | "updated_at") => "g.updated_at",
        Some(other) => {
            warn!(order_on = %other, "Unknown sort key, ordering by gateway_id");
            "g.gateway_id"
        }
    };

    let direction = match sort {
        SortDirection::Asc => "ASC NULLS FIRST",
        SortDirection::Desc => "DESC NULLS LAST",
    };

    format!("{} {}", column, direction)
}

#[derive(Clone)]
pub struct PostgresGatewayRepository {
    client: PostgresClient,
}

impl PostgresGatewayRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }

    async fn read_gateway(
        &self,
        conn: &deadpool_postgres::Client,
        gateway_id: &str,
    ) -> DomainResult<Option<Gateway>> {
        let row = conn
            .query_opt(
                &format!(
                    "SELECT {}
                     FROM gateways g
                     JOIN organizations o ON o.id = g.organization_id
                     WHERE g.gateway_id = $1",
                    GATEWAY_COLUMNS
                ),
                &[&gateway_id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.map(|row| GatewayRow::from_row(&row).into()))
    }
}

#[async_trait]
impl GatewayRepository for PostgresGatewayRepository {
    async fn create_gateway(&self, input: CreateGatewayRecord) -> DomainResult<Gateway> {
        debug!(gateway_id = %input.gateway_id, "Creating gateway in database");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let now = Utc::now();
        let tags_json = tags_to_json(&input.tags);

        let result = conn
            .execute(
                "INSERT INTO gateways (gateway_id, organization_id, name, description, \
                     model_name, placement, antenna_type, latitude, longitude, altitude, \
                     notify_offline, offline_alarm_threshold_minutes, notify_unusual_packages, \
                     minimum_packages, maximum_packages, alarm_mail, tags, created_by, \
                     updated_by, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, \
                     $16, $17, $18, $19, $20, $21)",
                &[
                    &input.gateway_id,
                    &input.organization_id,
                    &input.name,
                    &input.description,
                    &input.model_name,
                    &input.placement,
                    &input.antenna_type,
                    &input.latitude,
                    &input.longitude,
                    &input.altitude,
                    &input.notify_offline,
                    &input.offline_alarm_threshold_minutes,
                    &input.notify_unusual_packages,
                    &input.minimum_packages,
                    &input.maximum_packages,
                    &input.alarm_mail,
                    &tags_json,
                    &input.created_by,
                    &input.updated_by,
                    &now,
                    &now,
                ],
            )
            .await;

        if let Err(e) = result {
            if let Some(db_err) = e.as_db_error() {
                if db_err.code().code() == "23505" {
                    return Err(DomainError::GatewayAlreadyExists(input.gateway_id));
                }
                if db_err.code().code() == "23503" {
                    return Err(DomainError::OrganizationNotFound(input.organization_id));
                }
            }
            return Err(DomainError::RepositoryError(e.into()));
        }

        info!(gateway_id = %input.gateway_id, "Gateway created in database");

        match self.read_gateway(&conn, &input.gateway_id).await? {
            Some(gateway) => Ok(gateway),
            None => Err(DomainError::GatewayNotFound(input.gateway_id)),
        }
    }

    async fn get_gateway(&self, gateway_id: &str) -> DomainResult<Option<Gateway>> {
        debug!(gateway_id = %gateway_id, "Getting gateway from database");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        self.read_gateway(&conn, gateway_id).await
    }

    async fn update_gateway(&self, input: UpdateGatewayRecord) -> DomainResult<Gateway> {
        debug!(gateway_id = %input.gateway_id, "Updating gateway in database");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let now = Utc::now();
        let tags_json = tags_to_json(&input.tags);

        let rows_affected = conn
            .execute(
                "UPDATE gateways
                 SET name = $1, description = $2, model_name = $3, placement = $4, \
                     antenna_type = $5, latitude = $6, longitude = $7, altitude = $8, \
                     notify_offline = $9, offline_alarm_threshold_minutes = $10, \
                     notify_unusual_packages = $11, minimum_packages = $12, \
                     maximum_packages = $13, alarm_mail = $14, tags = $15, \
                     updated_by = $16, updated_at = $17
                 WHERE gateway_id = $18",
                &[
                    &input.name,
                    &input.description,
                    &input.model_name,
                    &input.placement,
                    &input.antenna_type,
                    &input.latitude,
                    &input.longitude,
                    &input.altitude,
                    &input.notify_offline,
                    &input.offline_alarm_threshold_minutes,
                    &input.notify_unusual_packages,
                    &input.minimum_packages,
                    &input.maximum_packages,
                    &input.alarm_mail,
                    &tags_json,
                    &input.updated_by,
                    &now,
                    &input.gateway_id,
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        if rows_affected == 0 {
            return Err(DomainError::GatewayNotFound(input.gateway_id));
        }

        info!(gateway_id = %input.gateway_id, "Gateway updated in database");

        match self.read_gateway(&conn, &input.gateway_id).await? {
            Some(gateway) => Ok(gateway),
            None => Err(DomainError::GatewayNotFound(input.gateway_id)),
        }
    }

    async fn delete_gateway(&self, gateway_id: &str) -> DomainResult<()> {
        debug!(gateway_id = %gateway_id, "Deleting gateway from database");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows_affected = conn
            .execute("DELETE FROM gateways WHERE gateway_id = $1", &[&gateway_id])
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        if rows_affected == 0 {
            return Err(DomainError::GatewayNotFound(gateway_id.to_string()));
        }

        info!(gateway_id = %gateway_id, "Gateway deleted from database");
        Ok(())
    }

    async fn list_gateways(&self, input: ListGatewaysInput) -> DomainResult<GatewayPage> {
        debug!(
            organization_id = ?input.organization_id,
            limit = input.limit,
            offset = input.offset,
            "Listing gateways from database"
        );

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let order_by = order_by_clause(input.order_on.as_deref(), input.sort);

        let (rows, total_count) = match &input.organization_id {
            Some(organization_id) => {
                let rows = conn
                    .query(
                        &format!(
                            "SELECT {}
                             FROM gateways g
                             JOIN organizations o ON o.id = g.organization_id
                             WHERE g.organization_id = $1
                             ORDER BY {}
                             LIMIT $2 OFFSET $3",
                            GATEWAY_COLUMNS, order_by
                        ),
                        &[organization_id, &input.limit, &input.offset],
                    )
                    .await
                    .map_err(|e| DomainError::RepositoryError(e.into()))?;

                let total_row = conn
                    .query_one(
                        "SELECT COUNT(*) FROM gateways WHERE organization_id = $1",
                        &[organization_id],
                    )
                    .await
                    .map_err(|e| DomainError::RepositoryError(e.into()))?;

                (rows, total_row.get::<_, i64>(0))
            }
            None => {
                let rows = conn
                    .query(
                        &format!(
                            "SELECT {}
                             FROM gateways g
                             JOIN organizations o ON o.id = g.organization_id
                             ORDER BY {}
                             LIMIT $1 OFFSET $2",
                            GATEWAY_COLUMNS, order_by
                        ),
                        &[&input.limit, &input.offset],
                    )
                    .await
                    .map_err(|e| DomainError::RepositoryError(e.into()))?;

                let total_row = conn
                    .query_one("SELECT COUNT(*) FROM gateways", &[])
                    .await
                    .map_err(|e| DomainError::RepositoryError(e.into()))?;

                (rows, total_row.get::<_, i64>(0))
            }
        };

        let gateways: Vec<Gateway> = rows
            .into_iter()
            .map(|row| GatewayRow::from_row(&row).into())
            .collect();

        info!(count = gateways.len(), total_count, "Listed gateways from database");

        Ok(GatewayPage {
            gateways,
            total_count,
        })
    }

    async fn list_offline_alarm_gateways(&self) -> DomainResult<Vec<Gateway>> {
        debug!("Listing gateways with offline alarms enabled");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows = conn
            .query(
                &format!(
                    "SELECT {}
                     FROM gateways g
                     JOIN organizations o ON o.id = g.organization_id
                     WHERE g.notify_offline
                     ORDER BY g.gateway_id",
                    GATEWAY_COLUMNS
                ),
                &[],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(rows
            .into_iter()
            .map(|row| GatewayRow::from_row(&row).into())
            .collect())
    }

    async fn list_traffic_alarm_gateways(&self) -> DomainResult<Vec<Gateway>> {
        debug!("Listing gateways with traffic alarms enabled");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows = conn
            .query(
                &format!(
                    "SELECT {}
                     FROM gateways g
                     JOIN organizations o ON o.id = g.organization_id
                     WHERE g.notify_unusual_packages
                     ORDER BY g.gateway_id",
                    GATEWAY_COLUMNS
                ),
                &[],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(rows
            .into_iter()
            .map(|row| GatewayRow::from_row(&row).into())
            .collect())
    }

    async fn update_gateway_stats(&self, input: UpdateGatewayStatsInput) -> DomainResult<()> {
        debug!(gateway_id = %input.gateway_id, "Updating gateway stats in database");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        // updated_at stays untouched so it keeps marking configuration edits
        let rows_affected = conn
            .execute(
                "UPDATE gateways
                 SET rx_packets_received = $1, tx_packets_emitted = $2, last_seen_at = $3
                 WHERE gateway_id = $4",
                &[
                    &input.rx_packets_received,
                    &input.tx_packets_emitted,
                    &input.last_seen_at,
                    &input.gateway_id,
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        if rows_affected == 0 {
            return Err(DomainError::GatewayNotFound(input.gateway_id));
        }

        Ok(())
    }

    async fn set_offline_notification_sent(
        &self,
        gateway_id: &str,
        sent: bool,
    ) -> DomainResult<()> {
        debug!(gateway_id = %gateway_id, sent, "Setting offline notification latch");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows_affected = conn
            .execute(
                "UPDATE gateways SET has_sent_offline_notification = $1 WHERE gateway_id = $2",
                &[&sent, &gateway_id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        if rows_affected == 0 {
            return Err(DomainError::GatewayNotFound(gateway_id.to_string()));
        }

        Ok(())
    }

    async fn update_gateway_organization(
        &self,
        gateway_id: &str,
        organization_id: &str,
    ) -> DomainResult<Gateway> {
        debug!(
            gateway_id = %gateway_id,
            organization_id = %organization_id,
            "Moving gateway to organization"
        );

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let now = Utc::now();

        let result = conn
            .execute(
                "UPDATE gateways SET organization_id = $1, updated_at = $2 WHERE gateway_id = $3",
                &[&organization_id, &now, &gateway_id],
            )
            .await;

        let rows_affected = match result {
            Ok(rows_affected) => rows_affected,
            Err(e) => {
                if let Some(db_err) = e.as_db_error() {
                    if db_err.code().code() == "23503" {
                        return Err(DomainError::OrganizationNotFound(
                            organization_id.to_string(),
                        ));
                    }
                }
                return Err(DomainError::RepositoryError(e.into()));
            }
        };

        if rows_affected == 0 {
            return Err(DomainError::GatewayNotFound(gateway_id.to_string()));
        }

        info!(
            gateway_id = %gateway_id,
            organization_id = %organization_id,
            "Gateway moved to organization"
        );

        match self.read_gateway(&conn, gateway_id).await? {
            Some(gateway) => Ok(gateway),
            None => Err(DomainError::GatewayNotFound(gateway_id.to_string())),
        }
    }

    async fn record_gateway_status(&self, input: RecordGatewayStatusInput) -> DomainResult<()> {
        debug!(
            gateway_id = %input.gateway_id,
            was_online = input.was_online,
            "Recording gateway status"
        );

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let result = conn
            .execute(
                "INSERT INTO gateway_status_history (gateway_id, was_online, last_seen_at)
                 VALUES ($1, $2, $3)",
                &[&input.gateway_id, &input.was_online, &input.last_seen_at],
            )
            .await;

        if let Err(e) = result {
            if let Some(db_err) = e.as_db_error() {
                if db_err.code().code() == "23503" {
                    return Err(DomainError::GatewayNotFound(input.gateway_id));
                }
            }
            return Err(DomainError::RepositoryError(e.into()));
        }

        Ok(())
    }
}
