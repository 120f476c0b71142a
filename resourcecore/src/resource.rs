//! The resource as callers see it.

use resourcecore_types::{
    ProviderGeneratedId, ResourceId, ResourceKind, ResourceOwner, StoredResource, Timestamp,
    UpdateEntry,
};
use serde::{Deserialize, Serialize};

/// Which optional parts of a resource to include in a response.
///
/// Both default to off so that callers interested only in the current status
/// pay neither for copying the history nor for a catalog lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IncludeFlags {
    /// Include the full update history.
    pub include_updates: bool,
    /// Include the support descriptor of the resource's product.
    pub include_support: bool,
}

impl IncludeFlags {
    /// Requests the update history.
    #[must_use]
    pub const fn with_updates(mut self) -> Self {
        self.include_updates = true;
        self
    }

    /// Requests the support descriptor.
    #[must_use]
    pub const fn with_support(mut self) -> Self {
        self.include_support = true;
        self
    }
}

/// A resource as returned by `retrieve` and `browse`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Resource<K: ResourceKind> {
    /// Resource identity.
    pub id: ResourceId,
    /// Creator and project.
    pub owner: ResourceOwner,
    /// Creation time.
    pub created_at: Timestamp,
    /// The desired state as submitted.
    pub specification: K::Specification,
    /// The current observed state.
    pub status: K::Status,
    /// Applied updates, oldest first, when requested.
    pub updates: Option<Vec<UpdateEntry<K::Update>>>,
    /// The product's support descriptor, when requested and still resolvable.
    pub support: Option<K::Support>,
    /// The provider's own id, for resources the provider registered.
    #[serde(default)]
    pub provider_generated_id: Option<ProviderGeneratedId>,
}

impl<K: ResourceKind> Resource<K> {
    pub(crate) fn from_stored(
        stored: StoredResource<K>,
        flags: IncludeFlags,
        support: Option<K::Support>,
    ) -> Self {
        let status = stored.status().clone();
        let updates = flags
            .include_updates
            .then(|| stored.history.entries().to_vec());

        Self {
            id: stored.id,
            owner: stored.owner,
            created_at: stored.created_at,
            specification: stored.specification,
            status,
            updates,
            support,
            provider_generated_id: stored.provider_generated_id,
        }
    }

    /// The lifecycle state of the current status.
    pub fn state(&self) -> K::State {
        K::state(&self.status)
    }
}
