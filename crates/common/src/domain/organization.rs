use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Organization owning a slice of the gateway fleet
#[derive(Debug, Clone, PartialEq)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Read-only directory of organizations. Rows are provisioned by the
/// administrative surface, never by the synchronizer.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    /// Get an organization by ID
    async fn get_organization(&self, organization_id: &str) -> DomainResult<Option<Organization>>;
}
