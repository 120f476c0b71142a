//! In-memory adapter for the `ResourceCore` lifecycle library
//!
//! This crate provides an in-process implementation of the `ResourceStore`
//! trait, useful for tests, development and single-node deployments where
//! durability is not required.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::{Arc, RwLock};

use resourcecore_types::{
    Cursor, Operation, ProviderKey, QuotaLimit, Registration, ResourceId, ResourceKind,
    ResourceStore, ScanRequest, SequenceNumber, SortDirection, StoreError, StoredResource,
    Timestamp, UpdateEntry, Workspace,
};

struct StoreState<K: ResourceKind> {
    resources: HashMap<ResourceId, StoredResource<K>>,
    // Creation-time index over live resources only
    order: BTreeSet<Cursor>,
    unique_keys: HashMap<String, ResourceId>,
    provider_keys: HashMap<ProviderKey, ResourceId>,
    live_per_workspace: HashMap<Workspace, usize>,
}

fn within_quota(live: usize, added: usize, limit: QuotaLimit) -> bool {
    live + added <= limit.into_inner()
}

impl<K: ResourceKind> StoreState<K> {
    fn new() -> Self {
        Self {
            resources: HashMap::new(),
            order: BTreeSet::new(),
            unique_keys: HashMap::new(),
            provider_keys: HashMap::new(),
            live_per_workspace: HashMap::new(),
        }
    }

    fn live_in(&self, workspace: &Workspace) -> usize {
        self.live_per_workspace
            .get(workspace)
            .copied()
            .unwrap_or_default()
    }

    fn check_insert(
        &self,
        batch: &[StoredResource<K>],
        quota: Option<QuotaLimit>,
    ) -> Result<(), StoreError> {
        let mut ids = HashMap::new();
        let mut keys = HashMap::new();
        let mut provider_keys = HashMap::new();
        let mut added: HashMap<Workspace, usize> = HashMap::new();

        for resource in batch {
            if self.resources.contains_key(&resource.id)
                || ids.insert(resource.id.clone(), ()).is_some()
            {
                return Err(StoreError::DuplicateResource(resource.id.clone()));
            }

            if let Some(key) = resource.unique_key() {
                let holder = self
                    .unique_keys
                    .get(&key)
                    .or_else(|| keys.get(&key))
                    .cloned();
                if let Some(holder) = holder {
                    return Err(StoreError::UniqueKeyTaken { key, holder });
                }
                let _ = keys.insert(key, resource.id.clone());
            }

            if let Some(key) = resource.provider_key() {
                let holder = self
                    .provider_keys
                    .get(&key)
                    .or_else(|| provider_keys.get(&key))
                    .cloned();
                if let Some(holder) = holder {
                    return Err(StoreError::UniqueKeyTaken {
                        key: key.to_string(),
                        holder,
                    });
                }
                let _ = provider_keys.insert(key, resource.id.clone());
            }

            *added.entry(resource.workspace()).or_default() += 1;
        }

        if let Some(limit) = quota {
            for (workspace, count) in added {
                if !within_quota(self.live_in(&workspace), count, limit) {
                    return Err(StoreError::QuotaExceeded { workspace, limit });
                }
            }
        }

        Ok(())
    }

    /// Checks that `existing` may take `replacement`'s owner and specification.
    fn check_replace(
        &self,
        existing: &StoredResource<K>,
        replacement: &StoredResource<K>,
        quota: Option<QuotaLimit>,
    ) -> Result<(), StoreError> {
        if let Some(key) = replacement.unique_key() {
            if let Some(holder) = self.unique_keys.get(&key) {
                if holder != &existing.id {
                    return Err(StoreError::UniqueKeyTaken {
                        key,
                        holder: holder.clone(),
                    });
                }
            }
        }

        let workspace = replacement.workspace();
        let moves = workspace != existing.workspace();
        if let Some(limit) = quota {
            if moves && !within_quota(self.live_in(&workspace), 1, limit) {
                return Err(StoreError::QuotaExceeded { workspace, limit });
            }
        }

        Ok(())
    }

    /// Adds a checked resource and its index entries.
    fn add(&mut self, resource: StoredResource<K>) {
        if let Some(key) = resource.unique_key() {
            let _ = self.unique_keys.insert(key, resource.id.clone());
        }
        if let Some(key) = resource.provider_key() {
            let _ = self.provider_keys.insert(key, resource.id.clone());
        }
        *self
            .live_per_workspace
            .entry(resource.workspace())
            .or_default() += 1;
        let _ = self.order.insert(resource.cursor());
        let _ = self.resources.insert(resource.id.clone(), resource);
    }

    /// Drops a live resource's unique key and workspace count.
    fn release(&mut self, id: &ResourceId, key: Option<String>, workspace: &Workspace) {
        if let Some(key) = key {
            if self.unique_keys.get(&key) == Some(id) {
                let _ = self.unique_keys.remove(&key);
            }
        }
        if let Some(count) = self.live_per_workspace.get_mut(workspace) {
            *count = count.saturating_sub(1);
        }
    }

    fn live_mut(&mut self, id: &ResourceId) -> Result<&mut StoredResource<K>, StoreError> {
        let resource = self
            .resources
            .get_mut(id)
            .ok_or_else(|| StoreError::Missing(id.clone()))?;
        if !resource.is_live() {
            return Err(StoreError::Deleted(id.clone()));
        }
        Ok(resource)
    }
}

fn expect_sequence(
    id: &ResourceId,
    expected: SequenceNumber,
    current: SequenceNumber,
) -> Result<(), StoreError> {
    if current == expected {
        Ok(())
    } else {
        Err(StoreError::VersionConflict {
            id: id.clone(),
            expected,
            current,
        })
    }
}

/// Thread-safe in-memory resource store.
///
/// Every operation runs inside one critical section of a `std::sync::RwLock`,
/// which makes each mutation atomic and each scan a consistent snapshot.
/// Clones share the same storage.
pub struct InMemoryResourceStore<K: ResourceKind> {
    state: Arc<RwLock<StoreState<K>>>,
}

impl<K: ResourceKind> InMemoryResourceStore<K> {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::new())),
        }
    }

    /// Number of resources held, including tombstoned ones.
    pub fn len(&self) -> usize {
        self.state
            .read()
            .map(|state| state.resources.len())
            .unwrap_or_default()
    }

    /// Whether the store holds no resources at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: ResourceKind> Default for InMemoryResourceStore<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ResourceKind> Clone for InMemoryResourceStore<K> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<K: ResourceKind> ResourceStore<K> for InMemoryResourceStore<K> {
    async fn insert(
        &self,
        resources: Vec<StoredResource<K>>,
        quota: Option<QuotaLimit>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::StoreFailure {
            operation: Operation::Insert,
        })?;

        // Check the whole batch before writing any of it
        state.check_insert(&resources, quota)?;

        for resource in resources {
            state.add(resource);
        }

        Ok(())
    }

    async fn register(
        &self,
        resource: StoredResource<K>,
        quota: Option<QuotaLimit>,
    ) -> Result<Registration, StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::StoreFailure {
            operation: Operation::Register,
        })?;

        let holder = resource
            .provider_key()
            .and_then(|key| state.provider_keys.get(&key).cloned());
        let Some(existing_id) = holder else {
            state.check_insert(std::slice::from_ref(&resource), quota)?;
            let id = resource.id.clone();
            state.add(resource);
            return Ok(Registration::Inserted(id));
        };

        // Provider keys only index live resources
        let existing = state
            .resources
            .get(&existing_id)
            .filter(|existing| existing.is_live())
            .ok_or_else(|| StoreError::Missing(existing_id.clone()))?;
        state.check_replace(existing, &resource, quota)?;
        let previous_key = existing.unique_key();
        let previous_workspace = existing.workspace();

        state.release(&existing_id, previous_key, &previous_workspace);
        if let Some(key) = resource.unique_key() {
            let _ = state.unique_keys.insert(key, existing_id.clone());
        }
        *state
            .live_per_workspace
            .entry(resource.workspace())
            .or_default() += 1;

        let stored = state.live_mut(&existing_id)?;
        stored.owner = resource.owner;
        stored.specification = resource.specification;

        Ok(Registration::Replaced(existing_id))
    }

    async fn load(&self, id: &ResourceId) -> Result<Option<StoredResource<K>>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::StoreFailure {
            operation: Operation::Load,
        })?;

        Ok(state.resources.get(id).cloned())
    }

    async fn append_update(
        &self,
        id: &ResourceId,
        expected: SequenceNumber,
        entry: UpdateEntry<K::Update>,
    ) -> Result<K::Status, StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::StoreFailure {
            operation: Operation::AppendUpdate,
        })?;

        let resource = state.live_mut(id)?;
        expect_sequence(id, expected, resource.history.last_sequence())?;
        let status = resource.history.record(entry)?;

        Ok(status.clone())
    }

    async fn mark_deleted(
        &self,
        id: &ResourceId,
        expected: SequenceNumber,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::StoreFailure {
            operation: Operation::MarkDeleted,
        })?;

        let resource = state.live_mut(id)?;
        expect_sequence(id, expected, resource.history.last_sequence())?;
        resource.deleted_at = Some(at);

        let cursor = resource.cursor();
        let workspace = resource.workspace();
        let key = resource.unique_key();
        let provider_key = resource.provider_key();

        let _ = state.order.remove(&cursor);
        if let Some(provider_key) = provider_key {
            let _ = state.provider_keys.remove(&provider_key);
        }
        state.release(id, key, &workspace);

        Ok(())
    }

    async fn scan(
        &self,
        request: ScanRequest<'_, K>,
    ) -> Result<Vec<StoredResource<K>>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::StoreFailure {
            operation: Operation::Scan,
        })?;

        let positions: Box<dyn Iterator<Item = &Cursor>> =
            match (request.direction, request.after.as_ref()) {
                (SortDirection::Ascending, None) => Box::new(state.order.iter()),
                (SortDirection::Ascending, Some(after)) => Box::new(
                    state
                        .order
                        .range((Bound::Excluded(after), Bound::Unbounded)),
                ),
                (SortDirection::Descending, None) => Box::new(state.order.iter().rev()),
                (SortDirection::Descending, Some(after)) => {
                    Box::new(state.order.range(..after).rev())
                }
            };

        Ok(positions
            .filter_map(|cursor| state.resources.get(&cursor.id))
            .filter(|resource| (request.filter)(resource))
            .take(request.limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resourcecore::ingress::{Ingress, IngressSpecification, IngressState, IngressUpdate};
    use resourcecore_types::{
        ProductReference, ProjectId, ProviderGeneratedId, ResourceOwner, Username,
    };

    fn product() -> ProductReference {
        ProductReference::try_from_parts("u1-publiclink", "u1-publiclink", "ucloud").unwrap()
    }

    fn ingress(domain: &str, user: &str) -> StoredResource<Ingress> {
        StoredResource::new(
            ResourceId::generate(),
            ResourceOwner::new(Username::try_new(user).unwrap(), None),
            IngressSpecification::new(domain, product()),
        )
    }

    #[tokio::test]
    async fn new_store_is_empty() {
        let store: InMemoryResourceStore<Ingress> = InMemoryResourceStore::new();

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn clone_shares_storage() {
        let first: InMemoryResourceStore<Ingress> = InMemoryResourceStore::new();
        let second = first.clone();

        assert!(Arc::ptr_eq(&first.state, &second.state));
    }

    #[tokio::test]
    async fn insert_then_load_returns_initial_status() {
        let store = InMemoryResourceStore::new();
        let resource = ingress("app-a.example.com", "alice");
        let id = resource.id.clone();

        store.insert(vec![resource], None).await.unwrap();
        let loaded = store.load(&id).await.unwrap().unwrap();

        assert_eq!(loaded.status().state, IngressState::Preparing);
        assert!(loaded.history.is_empty());
    }

    #[tokio::test]
    async fn append_update_requires_expected_sequence() {
        let store = InMemoryResourceStore::new();
        let resource = ingress("app-b.example.com", "alice");
        let id = resource.id.clone();
        store.insert(vec![resource], None).await.unwrap();

        let ready = UpdateEntry::new(
            SequenceNumber::new(1),
            IngressUpdate::state(IngressState::Ready),
        );
        let status = store
            .append_update(&id, SequenceNumber::initial(), ready.clone())
            .await
            .unwrap();
        let conflict = store
            .append_update(&id, SequenceNumber::initial(), ready)
            .await
            .unwrap_err();

        assert_eq!(status.state, IngressState::Ready);
        assert_eq!(
            conflict,
            StoreError::VersionConflict {
                id,
                expected: SequenceNumber::initial(),
                current: SequenceNumber::new(1),
            }
        );
    }

    #[tokio::test]
    async fn deleted_resources_release_their_unique_key() {
        let store = InMemoryResourceStore::new();
        let first = ingress("app-c.example.com", "alice");
        let id = first.id.clone();
        store.insert(vec![first], None).await.unwrap();

        store
            .mark_deleted(&id, SequenceNumber::initial(), Timestamp::now())
            .await
            .unwrap();
        let replacement = store
            .insert(vec![ingress("app-c.example.com", "bob")], None)
            .await;

        assert!(replacement.is_ok());
        assert_eq!(store.len(), 2);
    }

    fn registered(domain: &str, user: &str, provider_id: &str) -> StoredResource<Ingress> {
        ingress(domain, user)
            .with_provider_generated_id(ProviderGeneratedId::try_new(provider_id).unwrap())
    }

    #[tokio::test]
    async fn registering_a_known_provider_id_keeps_identity_and_history() {
        let store = InMemoryResourceStore::new();
        let first = store
            .register(registered("app-d.example.com", "alice", "pod-1"), None)
            .await
            .unwrap();
        let id = first.id().clone();
        let _ = store
            .append_update(
                &id,
                SequenceNumber::initial(),
                UpdateEntry::new(SequenceNumber::new(1), IngressUpdate::state(IngressState::Ready)),
            )
            .await
            .unwrap();

        let again = store
            .register(registered("app-e.example.com", "bob", "pod-1"), None)
            .await
            .unwrap();
        let loaded = store.load(&id).await.unwrap().unwrap();

        assert_eq!(first, Registration::Inserted(id.clone()));
        assert_eq!(again, Registration::Replaced(id));
        assert_eq!(store.len(), 1);
        assert_eq!(loaded.owner.created_by.as_ref(), "bob");
        assert_eq!(loaded.specification.domain, "app-e.example.com");
        assert_eq!(loaded.status().state, IngressState::Ready);
    }

    #[tokio::test]
    async fn re_registration_moves_unique_keys_and_quota() {
        let store = InMemoryResourceStore::new();
        let quota = Some(QuotaLimit::try_new(1).unwrap());
        let _ = store
            .register(registered("app-f.example.com", "alice", "pod-2"), quota)
            .await
            .unwrap();

        let _ = store
            .register(registered("app-g.example.com", "alice", "pod-2"), quota)
            .await
            .unwrap();
        let freed = store
            .insert(vec![ingress("app-f.example.com", "carol")], quota)
            .await;
        let full = store
            .insert(vec![ingress("app-h.example.com", "alice")], quota)
            .await;

        assert!(freed.is_ok());
        assert!(matches!(full, Err(StoreError::QuotaExceeded { .. })));
    }

    #[tokio::test]
    async fn re_registration_into_a_full_workspace_changes_nothing() {
        let store = InMemoryResourceStore::new();
        let quota = Some(QuotaLimit::try_new(1).unwrap());
        let project = ResourceOwner::new(
            Username::try_new("alice").unwrap(),
            Some(ProjectId::try_new("p1").unwrap()),
        );
        let mut occupant = ingress("app-i.example.com", "alice");
        occupant.owner = project.clone();
        store.insert(vec![occupant], quota).await.unwrap();
        let personal = store
            .register(registered("app-j.example.com", "alice", "pod-3"), quota)
            .await
            .unwrap();

        let mut moved = registered("app-j.example.com", "alice", "pod-3");
        moved.owner = project;
        let error = store.register(moved, quota).await.unwrap_err();
        let loaded = store.load(personal.id()).await.unwrap().unwrap();

        assert!(matches!(error, StoreError::QuotaExceeded { .. }));
        assert_eq!(loaded.owner.project, None);
    }

    #[tokio::test]
    async fn deleted_registrations_free_the_provider_id() {
        let store = InMemoryResourceStore::new();
        let first = store
            .register(registered("app-k.example.com", "alice", "pod-4"), None)
            .await
            .unwrap();
        store
            .mark_deleted(first.id(), SequenceNumber::initial(), Timestamp::now())
            .await
            .unwrap();

        let second = store
            .register(registered("app-k.example.com", "alice", "pod-4"), None)
            .await
            .unwrap();

        assert!(matches!(second, Registration::Inserted(ref id) if id != first.id()));
    }
}
