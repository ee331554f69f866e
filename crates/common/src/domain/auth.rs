use crate::domain::result::{DomainError, DomainResult};
use async_trait::async_trait;

/// Authorization seam for gateway writes. Deployments plug their own policy
/// in; the checks stay out of the synchronizer itself.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait OrganizationAccessChecker: Send + Sync {
    async fn can_write_gateways(
        &self,
        actor_id: &str,
        organization_id: &str,
    ) -> DomainResult<bool>;
}

/// Fixed-answer checker for single-tenant deployments and tests
#[derive(Debug, Clone, Copy)]
pub struct StaticAccessChecker {
    allow: bool,
}

impl StaticAccessChecker {
    pub fn new(allow: bool) -> Self {
        Self { allow }
    }

    pub fn allow_all() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl OrganizationAccessChecker for StaticAccessChecker {
    async fn can_write_gateways(
        &self,
        _actor_id: &str,
        _organization_id: &str,
    ) -> DomainResult<bool> {
        Ok(self.allow)
    }
}

/// Run the write check and turn a refusal into a permission error
pub async fn require_gateway_write_access(
    checker: &dyn OrganizationAccessChecker,
    actor_id: &str,
    organization_id: &str,
) -> DomainResult<()> {
    if checker.can_write_gateways(actor_id, organization_id).await? {
        Ok(())
    } else {
        Err(DomainError::PermissionDenied(format!(
            "user {} may not manage gateways of organization {}",
            actor_id, organization_id
        )))
    }
}
