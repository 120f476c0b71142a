//! Persistence contract for resources and the types it exchanges.

use crate::history::{History, SequenceRegression, UpdateEntry};
use crate::ids::{
    CatalogName, ProviderGeneratedId, ResourceId, ResourceOwner, SequenceNumber, Timestamp,
    Workspace,
};
use crate::kind::ResourceKind;
use nutype::nutype;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

/// Maximum number of live resources of one kind per workspace.
#[nutype(
    validate(greater_or_equal = 1),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Display,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct QuotaLimit(usize);

/// A resource as persisted: identity, specification, history and tombstone.
///
/// The status is not stored separately; it lives inside `history`, which
/// derives it from the recorded updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StoredResource<K: ResourceKind> {
    /// Resource identity.
    pub id: ResourceId,
    /// Creator and project.
    pub owner: ResourceOwner,
    /// Creation time.
    pub created_at: Timestamp,
    /// The immutable desired state.
    pub specification: K::Specification,
    /// Applied updates and the derived status.
    pub history: History<K>,
    /// Set once the resource has been deleted.
    pub deleted_at: Option<Timestamp>,
    /// Identifier the provider chose, for resources the provider registered.
    #[serde(default)]
    pub provider_generated_id: Option<ProviderGeneratedId>,
}

impl<K: ResourceKind> StoredResource<K> {
    /// A freshly created resource in the kind's initial status.
    pub fn new(id: ResourceId, owner: ResourceOwner, specification: K::Specification) -> Self {
        Self {
            id,
            owner,
            created_at: Timestamp::now(),
            specification,
            history: History::new(),
            deleted_at: None,
            provider_generated_id: None,
        }
    }

    /// Marks the resource as registered by its provider under `id`.
    #[must_use]
    pub fn with_provider_generated_id(mut self, id: ProviderGeneratedId) -> Self {
        self.provider_generated_id = Some(id);
        self
    }

    /// The current status.
    pub const fn status(&self) -> &K::Status {
        self.history.status()
    }

    /// Whether the resource has not been deleted.
    pub const fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Position of this resource in creation order.
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.created_at, self.id.clone())
    }

    /// The workspace the resource counts against.
    pub fn workspace(&self) -> Workspace {
        self.owner.workspace()
    }

    /// The kind-specific uniqueness key, if the kind declares one.
    pub fn unique_key(&self) -> Option<String> {
        K::unique_key(&self.specification)
    }

    /// The key registrations are matched on, for provider-registered resources.
    pub fn provider_key(&self) -> Option<ProviderKey> {
        self.provider_generated_id.clone().map(|id| ProviderKey {
            provider: K::product(&self.specification).provider.clone(),
            id,
        })
    }
}

/// A provider together with an id it generated. Unique among live resources.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProviderKey {
    /// The registering provider.
    pub provider: CatalogName,
    /// The id it chose.
    pub id: ProviderGeneratedId,
}

impl std::fmt::Display for ProviderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.id, self.provider)
    }
}

/// Outcome of [`ResourceStore::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// No live resource held the provider key; a new one was stored.
    Inserted(ResourceId),
    /// The live resource holding the provider key took the new owner and
    /// specification.
    Replaced(ResourceId),
}

impl Registration {
    /// Id of the stored resource.
    pub const fn id(&self) -> &ResourceId {
        match self {
            Self::Inserted(id) | Self::Replaced(id) => id,
        }
    }
}

/// Position in the creation-time ordering of resources.
///
/// Ordered by creation time, ties broken by id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor {
    /// Creation time of the resource at this position.
    pub created_at: Timestamp,
    /// Id of the resource at this position.
    pub id: ResourceId,
}

/// Returned when a page token cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed page token '{0}'")]
pub struct CursorError(pub String);

impl Cursor {
    /// Creates a cursor.
    pub const fn new(created_at: Timestamp, id: ResourceId) -> Self {
        Self { created_at, id }
    }

    /// Encodes the cursor as an opaque token.
    pub fn to_token(&self) -> String {
        format!("{}:{}", self.created_at.as_micros(), self.id)
    }

    /// Decodes a token produced by [`Cursor::to_token`].
    pub fn parse(token: &str) -> Result<Self, CursorError> {
        let malformed = || CursorError(token.to_string());
        let (micros, id) = token.split_once(':').ok_or_else(malformed)?;
        let created_at = micros
            .parse::<i64>()
            .ok()
            .and_then(Timestamp::from_micros)
            .ok_or_else(malformed)?;
        let id = ResourceId::try_new(id).map_err(|_| malformed())?;
        Ok(Self::new(created_at, id))
    }
}

/// Order in which scans visit resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    /// Oldest first.
    Ascending,
    /// Newest first.
    #[default]
    Descending,
}

/// Parameters of one page-sized scan over live resources.
pub struct ScanRequest<'a, K: ResourceKind> {
    /// Resume strictly after this position, in scan direction.
    pub after: Option<Cursor>,
    /// Scan order.
    pub direction: SortDirection,
    /// Maximum number of resources returned.
    pub limit: usize,
    /// Only resources for which this returns true are returned.
    pub filter: &'a (dyn Fn(&StoredResource<K>) -> bool + Send + Sync),
}

impl<'a, K: ResourceKind> ScanRequest<'a, K> {
    /// A scan from the start in the default (newest first) order.
    pub fn new(
        limit: usize,
        filter: &'a (dyn Fn(&StoredResource<K>) -> bool + Send + Sync),
    ) -> Self {
        Self {
            after: None,
            direction: SortDirection::default(),
            limit,
            filter,
        }
    }

    /// Resumes after a cursor.
    #[must_use]
    pub fn after(mut self, cursor: Option<Cursor>) -> Self {
        self.after = cursor;
        self
    }

    /// Sets the scan order.
    #[must_use]
    pub fn direction(mut self, direction: SortDirection) -> Self {
        self.direction = direction;
        self
    }
}

/// Trait defining the contract for resource store implementations.
///
/// Every mutating operation is a single atomic step: either its full effect is
/// visible afterwards or none of it is. Stores never fold updates themselves
/// beyond delegating to [`History::record`].
///
/// Implementations include:
/// - `resourcecore-memory`: in-process backend for tests and single-node use
pub trait ResourceStore<K: ResourceKind> {
    /// Atomically persists a batch of new resources.
    ///
    /// Fails without persisting anything when an id already exists, a unique
    /// key is held by a live resource, or a workspace would exceed `quota`.
    fn insert(
        &self,
        resources: Vec<StoredResource<K>>,
        quota: Option<QuotaLimit>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Stores a provider-registered resource, upserting on its provider key.
    ///
    /// When a live resource already holds `resource`'s provider key, that
    /// resource keeps its id, creation time and history and takes the new
    /// owner and specification. Otherwise `resource` is inserted as by
    /// [`insert`](Self::insert). Unique keys and `quota` are checked either
    /// way; a resource that keeps its workspace never counts twice.
    fn register(
        &self,
        resource: StoredResource<K>,
        quota: Option<QuotaLimit>,
    ) -> impl Future<Output = Result<Registration, StoreError>> + Send;

    /// Loads a resource, including deleted ones.
    fn load(
        &self,
        id: &ResourceId,
    ) -> impl Future<Output = Result<Option<StoredResource<K>>, StoreError>> + Send;

    /// Appends one update if the resource's last sequence equals `expected`.
    ///
    /// Returns the status after folding the update.
    fn append_update(
        &self,
        id: &ResourceId,
        expected: SequenceNumber,
        entry: UpdateEntry<K::Update>,
    ) -> impl Future<Output = Result<K::Status, StoreError>> + Send;

    /// Tombstones a resource if its last sequence equals `expected`.
    fn mark_deleted(
        &self,
        id: &ResourceId,
        expected: SequenceNumber,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Returns up to `limit` live resources in cursor order, read from one snapshot.
    fn scan(
        &self,
        request: ScanRequest<'_, K>,
    ) -> impl Future<Output = Result<Vec<StoredResource<K>>, StoreError>> + Send;
}

/// Identifies the store operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Inserting new resources.
    Insert,
    /// Registering a provider-owned resource.
    Register,
    /// Loading one resource.
    Load,
    /// Appending an update.
    AppendUpdate,
    /// Tombstoning a resource.
    MarkDeleted,
    /// Scanning resources.
    Scan,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Insert => write!(f, "insert"),
            Self::Register => write!(f, "register"),
            Self::Load => write!(f, "load"),
            Self::AppendUpdate => write!(f, "append_update"),
            Self::MarkDeleted => write!(f, "mark_deleted"),
            Self::Scan => write!(f, "scan"),
        }
    }
}

/// Error type returned by resource store operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Infrastructure failure in the backing store.
    #[error("{operation} operation failed")]
    StoreFailure {
        /// The failing operation.
        operation: Operation,
    },

    /// The resource changed since the caller read it.
    #[error("version conflict on resource {id}: expected {expected}, current is {current}")]
    VersionConflict {
        /// The contended resource.
        id: ResourceId,
        /// Sequence the caller expected.
        expected: SequenceNumber,
        /// Sequence actually stored.
        current: SequenceNumber,
    },

    /// An inserted id already exists.
    #[error("resource {0} already exists")]
    DuplicateResource(ResourceId),

    /// A unique key is already held by a live resource.
    #[error("'{key}' is already held by resource {holder}")]
    UniqueKeyTaken {
        /// The contested key.
        key: String,
        /// The live resource holding it.
        holder: ResourceId,
    },

    /// Inserting would exceed the workspace quota.
    #[error("quota of {limit} exceeded in workspace {workspace}")]
    QuotaExceeded {
        /// The workspace at its limit.
        workspace: Workspace,
        /// The configured limit.
        limit: QuotaLimit,
    },

    /// The resource does not exist.
    #[error("resource {0} does not exist")]
    Missing(ResourceId),

    /// The resource has been deleted.
    #[error("resource {0} has been deleted")]
    Deleted(ResourceId),

    /// An update did not advance the history.
    #[error(transparent)]
    SequenceRegression(#[from] SequenceRegression),
}

/// Allows passing both owned and borrowed stores to the manager.
impl<K: ResourceKind, T: ResourceStore<K> + Sync> ResourceStore<K> for &T {
    async fn insert(
        &self,
        resources: Vec<StoredResource<K>>,
        quota: Option<QuotaLimit>,
    ) -> Result<(), StoreError> {
        (*self).insert(resources, quota).await
    }

    async fn register(
        &self,
        resource: StoredResource<K>,
        quota: Option<QuotaLimit>,
    ) -> Result<Registration, StoreError> {
        (*self).register(resource, quota).await
    }

    async fn load(&self, id: &ResourceId) -> Result<Option<StoredResource<K>>, StoreError> {
        (*self).load(id).await
    }

    async fn append_update(
        &self,
        id: &ResourceId,
        expected: SequenceNumber,
        entry: UpdateEntry<K::Update>,
    ) -> Result<K::Status, StoreError> {
        (*self).append_update(id, expected, entry).await
    }

    async fn mark_deleted(
        &self,
        id: &ResourceId,
        expected: SequenceNumber,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        (*self).mark_deleted(id, expected, at).await
    }

    async fn scan(
        &self,
        request: ScanRequest<'_, K>,
    ) -> Result<Vec<StoredResource<K>>, StoreError> {
        (*self).scan(request).await
    }
}

/// Lets one store be shared between a manager and other owners.
impl<K: ResourceKind, T: ResourceStore<K> + Send + Sync> ResourceStore<K> for Arc<T> {
    async fn insert(
        &self,
        resources: Vec<StoredResource<K>>,
        quota: Option<QuotaLimit>,
    ) -> Result<(), StoreError> {
        self.as_ref().insert(resources, quota).await
    }

    async fn register(
        &self,
        resource: StoredResource<K>,
        quota: Option<QuotaLimit>,
    ) -> Result<Registration, StoreError> {
        self.as_ref().register(resource, quota).await
    }

    async fn load(&self, id: &ResourceId) -> Result<Option<StoredResource<K>>, StoreError> {
        self.as_ref().load(id).await
    }

    async fn append_update(
        &self,
        id: &ResourceId,
        expected: SequenceNumber,
        entry: UpdateEntry<K::Update>,
    ) -> Result<K::Status, StoreError> {
        self.as_ref().append_update(id, expected, entry).await
    }

    async fn mark_deleted(
        &self,
        id: &ResourceId,
        expected: SequenceNumber,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        self.as_ref().mark_deleted(id, expected, at).await
    }

    async fn scan(
        &self,
        request: ScanRequest<'_, K>,
    ) -> Result<Vec<StoredResource<K>>, StoreError> {
        self.as_ref().scan(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(micros: i64, id: &str) -> Cursor {
        Cursor::new(
            Timestamp::from_micros(micros).unwrap(),
            ResourceId::try_new(id).unwrap(),
        )
    }

    #[test]
    fn cursor_token_roundtrip() {
        let original = cursor(1_700_000_000_123_456, "0190a1b2-c3d4-7e5f-8a9b-0c1d2e3f4a5b");

        let parsed = Cursor::parse(&original.to_token()).unwrap();

        assert_eq!(parsed, original);
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert!(Cursor::parse("").is_err());
        assert!(Cursor::parse("no-separator").is_err());
        assert!(Cursor::parse("abc:id").is_err());
        assert!(Cursor::parse("12:").is_err());
    }

    #[test]
    fn cursors_order_by_time_then_id() {
        let early = cursor(10, "b");
        let late = cursor(20, "a");
        let tie = cursor(10, "c");

        assert!(early < late);
        assert!(early < tie);
        assert!(tie < late);
    }

    #[test]
    fn provider_keys_name_the_provider_of_the_product() {
        let id = ProviderGeneratedId::try_new("pod-17").unwrap();
        let key = ProviderKey {
            provider: CatalogName::try_new("ucloud").unwrap(),
            id,
        };

        assert_eq!(key.to_string(), "pod-17@ucloud");
    }

    #[test]
    fn quota_limit_rejects_zero() {
        assert!(QuotaLimit::try_new(0).is_err());
        assert!(QuotaLimit::try_new(1).is_ok());
    }

    #[test]
    fn operation_names_are_snake_case() {
        let error = StoreError::StoreFailure {
            operation: Operation::AppendUpdate,
        };

        assert_eq!(error.to_string(), "append_update operation failed");
    }
}
