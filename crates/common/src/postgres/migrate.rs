use crate::postgres::PostgresClient;
use anyhow::{Context, Result};
use tracing::info;

/// Embedded schema migrations in goose format, applied in order at startup.
/// Statements are idempotent, so re-running on an existing database is safe.
const MIGRATIONS: &[(&str, &str)] = &[(
    "00001_create_gateway_tables",
    include_str!("../../../../migrations/postgres/00001_create_gateway_tables.sql"),
)];

/// Extracts the Up section of a goose-format migration file
fn up_statements(source: &str) -> &str {
    let from = source
        .find("-- +goose Up")
        .map(|at| at + "-- +goose Up".len())
        .unwrap_or(0);
    let to = source.find("-- +goose Down").unwrap_or(source.len());

    source[from..to].trim()
}

/// Applies all embedded migrations
pub async fn apply_migrations(client: &PostgresClient) -> Result<()> {
    let connection = client.get_connection().await?;

    for (name, source) in MIGRATIONS {
        connection
            .batch_execute(up_statements(source))
            .await
            .with_context(|| format!("failed to apply migration {}", name))?;

        info!(migration = name, "applied migration");
    }

    Ok(())
}
