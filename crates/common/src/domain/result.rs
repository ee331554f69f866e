use crate::domain::network_server::NetworkServerError;
use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Gateway not found: {0}")]
    GatewayNotFound(String),

    #[error("Gateway already exists: {0}")]
    GatewayAlreadyExists(String),

    #[error("Invalid gateway ID: {0}")]
    InvalidGatewayId(String),

    #[error("Invalid alarm thresholds: minimum {minimum} exceeds maximum {maximum}")]
    InvalidAlarmThresholds { minimum: i64, maximum: i64 },

    #[error("Invalid gateway tags: {0}")]
    InvalidTags(String),

    #[error("Organization not found: {0}")]
    OrganizationNotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Network server error: {0}")]
    NetworkServer(#[from] NetworkServerError),

    #[error("Mail delivery error: {0}")]
    MailDelivery(String),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}
