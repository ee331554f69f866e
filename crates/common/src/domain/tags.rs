use crate::domain::result::{DomainError, DomainResult};
use std::collections::HashMap;

/// Namespace prefix for keys the synchronizer owns on the network server.
/// Client-supplied tags may never use it.
pub const RESERVED_TAG_PREFIX: &str = "lorafleet-";

pub const ORGANIZATION_ID_TAG: &str = "lorafleet-organization-id";
pub const CREATED_BY_TAG: &str = "lorafleet-created-by";
pub const UPDATED_BY_TAG: &str = "lorafleet-updated-by";
pub const SCHEMA_VERSION_TAG: &str = "lorafleet-schema-version";

/// Current layout version of the reserved keys
pub const SCHEMA_VERSION: &str = "1";

/// Ownership and audit values carried inside the reserved tag namespace
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GatewayAnnotations {
    pub organization_id: Option<String>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
}

/// Reject user tag maps that touch the reserved namespace
pub fn validate_user_tags(tags: &HashMap<String, String>) -> DomainResult<()> {
    for key in tags.keys() {
        if key.starts_with(RESERVED_TAG_PREFIX) {
            return Err(DomainError::InvalidTags(format!(
                "tag key {} uses the reserved prefix {}",
                key, RESERVED_TAG_PREFIX
            )));
        }
    }

    Ok(())
}

/// Build the tag map sent to the network server: user tags plus the reserved
/// annotations. Reserved keys already present in the user map are dropped, so
/// the annotations always win.
pub fn encode_tags(
    user_tags: &HashMap<String, String>,
    annotations: &GatewayAnnotations,
) -> HashMap<String, String> {
    let mut encoded: HashMap<String, String> = user_tags
        .iter()
        .filter(|(key, _)| !key.starts_with(RESERVED_TAG_PREFIX))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    encoded.insert(SCHEMA_VERSION_TAG.to_string(), SCHEMA_VERSION.to_string());

    if let Some(organization_id) = &annotations.organization_id {
        encoded.insert(ORGANIZATION_ID_TAG.to_string(), organization_id.clone());
    }
    if let Some(created_by) = &annotations.created_by {
        encoded.insert(CREATED_BY_TAG.to_string(), created_by.clone());
    }
    if let Some(updated_by) = &annotations.updated_by {
        encoded.insert(UPDATED_BY_TAG.to_string(), updated_by.clone());
    }

    encoded
}

/// Split a network-server tag map back into annotations and user tags.
/// A reserved map written with a different layout version is rejected rather
/// than misread.
pub fn decode_tags(
    tags: &HashMap<String, String>,
) -> DomainResult<(GatewayAnnotations, HashMap<String, String>)> {
    if let Some(version) = tags.get(SCHEMA_VERSION_TAG) {
        if version != SCHEMA_VERSION {
            return Err(DomainError::InvalidTags(format!(
                "unsupported tag schema version {}",
                version
            )));
        }
    }

    let annotations = GatewayAnnotations {
        organization_id: tags.get(ORGANIZATION_ID_TAG).cloned(),
        created_by: tags.get(CREATED_BY_TAG).cloned(),
        updated_by: tags.get(UPDATED_BY_TAG).cloned(),
    };

    let user_tags = tags
        .iter()
        .filter(|(key, _)| !key.starts_with(RESERVED_TAG_PREFIX))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Ok((annotations, user_tags))
}
