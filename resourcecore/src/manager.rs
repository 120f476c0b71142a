//! The generic resource manager.
//!
//! One `ResourceManager` implementation serves every resource kind. It is the
//! only authority that mutates resources: callers create, browse and delete,
//! and the provisioning backend feeds sequence-numbered updates through
//! [`ResourceManager::apply_update`] or a provider feed.
//!
//! Every mutation of an existing resource runs under that resource's entry in
//! a lock table, so updates to one id are strictly ordered while different ids
//! proceed in parallel. The store's compare-and-append is the commit point.

use crate::access::{AccessPolicy, Actor, WorkspaceScoped};
use crate::config::ManagerConfig;
use crate::events::{resource_events, EventStream, ResourceEvent};
use crate::feed::{FeedSummary, ProviderEnvelope, ProviderSignal};
use crate::locks::LockTable;
use crate::query::{BrowseRequest, Page};
use crate::resource::{IncludeFlags, Resource};
use futures::stream::{self, Stream, TryStreamExt};
use resourcecore_types::{
    Cursor, ProductSupport, ProviderGeneratedId, Registration, ResourceError, ResourceId,
    ResourceKind, ResourceOwner, ResourceStore, ScanRequest, SequenceNumber, StaleReason,
    StoreError, StoredResource, SupportCatalog, Timestamp, UpdateEntry, ValidationError,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, instrument, warn, Span};

/// Attempts at appending one update before a persistent version conflict is
/// reported. Conflicts only arise when another manager shares the store.
const MAX_APPEND_ATTEMPTS: usize = 3;

fn not_found<K: ResourceKind>(id: &ResourceId) -> ResourceError {
    ResourceError::NotFound {
        kind: K::NAME,
        id: id.clone(),
    }
}

fn stale<K: ResourceKind>(
    id: &ResourceId,
    sequence: SequenceNumber,
    reason: StaleReason,
) -> ResourceError {
    warn!(%reason, "discarding stale update");
    ResourceError::StaleUpdate {
        kind: K::NAME,
        id: id.clone(),
        sequence,
        reason,
    }
}

fn store_error<K: ResourceKind>(error: StoreError) -> ResourceError {
    match error {
        StoreError::Missing(id) | StoreError::Deleted(id) => not_found::<K>(&id),
        StoreError::UniqueKeyTaken { key, .. } => ResourceError::Conflict {
            kind: K::NAME,
            reason: format!("'{key}' is already in use"),
        },
        StoreError::QuotaExceeded { workspace, limit } => ResourceError::QuotaExceeded {
            kind: K::NAME,
            workspace,
            limit,
        },
        other => ResourceError::Store(other),
    }
}

/// Generic lifecycle manager for resources of kind `K`.
///
/// `S` persists resources, `C` resolves support descriptors and `P` decides
/// visibility. Resources an actor may not access are reported as not found.
///
/// # Example
///
/// ```rust,ignore
/// let manager = ResourceManager::new(InMemoryResourceStore::new(), catalog);
/// let id = manager.create(&actor, IngressSpecification::new(domain, product)).await?;
/// let ready = IngressUpdate::state(IngressState::Ready);
/// manager.apply_update(&id, SequenceNumber::new(1), ready, None).await?;
/// ```
pub struct ResourceManager<K: ResourceKind, S, C, P = WorkspaceScoped> {
    store: S,
    catalog: C,
    policy: P,
    config: ManagerConfig,
    locks: LockTable,
    events: broadcast::Sender<ResourceEvent<K>>,
}

impl<K, S, C> ResourceManager<K, S, C, WorkspaceScoped>
where
    K: ResourceKind,
    S: ResourceStore<K>,
    C: SupportCatalog<K::Support>,
{
    /// Creates a manager with the default configuration and workspace-scoped visibility.
    pub fn new(store: S, catalog: C) -> Self {
        Self::with_config(store, catalog, ManagerConfig::default())
    }

    /// Creates a manager with workspace-scoped visibility.
    pub fn with_config(store: S, catalog: C, config: ManagerConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer.into_inner());
        Self {
            store,
            catalog,
            policy: WorkspaceScoped,
            config,
            locks: LockTable::new(),
            events,
        }
    }
}

impl<K: ResourceKind, S, C, P> ResourceManager<K, S, C, P> {
    /// Replaces the access policy.
    pub fn with_policy<Q: AccessPolicy>(self, policy: Q) -> ResourceManager<K, S, C, Q> {
        ResourceManager {
            store: self.store,
            catalog: self.catalog,
            policy,
            config: self.config,
            locks: self.locks,
            events: self.events,
        }
    }

    /// The active configuration.
    pub const fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// The backing store.
    pub const fn store(&self) -> &S {
        &self.store
    }
}

impl<K, S, C, P> ResourceManager<K, S, C, P>
where
    K: ResourceKind,
    S: ResourceStore<K> + Send + Sync,
    C: SupportCatalog<K::Support> + Send + Sync,
    P: AccessPolicy,
{
    async fn resolve_and_validate(
        &self,
        specification: &K::Specification,
    ) -> Result<K::Support, ResourceError> {
        let product = K::product(specification);
        let support = self.catalog.resolve(product).await.ok_or_else(|| {
            ValidationError::UnsupportedProduct {
                product: product.clone(),
            }
        })?;
        K::validate(specification, &support)?;
        Ok(support)
    }

    async fn load_accessible(
        &self,
        actor: &Actor,
        id: &ResourceId,
    ) -> Result<StoredResource<K>, ResourceError> {
        self.store
            .load(id)
            .await
            .map_err(store_error::<K>)?
            .filter(|resource| {
                resource.is_live() && self.policy.can_access(actor, &resource.owner)
            })
            .ok_or_else(|| not_found::<K>(id))
    }

    async fn present(&self, stored: StoredResource<K>, flags: IncludeFlags) -> Resource<K> {
        let support = if flags.include_support {
            self.catalog.resolve(K::product(&stored.specification)).await
        } else {
            None
        };
        Resource::from_stored(stored, flags, support)
    }

    /// Validates a specification and persists a new resource in its initial status.
    ///
    /// # Errors
    ///
    /// - `Validation` when the product is unknown or the specification is invalid
    /// - `QuotaExceeded` when the actor's workspace is at its limit
    /// - `Conflict` when the kind's unique key is held by a live resource
    #[instrument(
        skip_all,
        fields(resource_kind = K::NAME, resource_id = tracing::field::Empty)
    )]
    pub async fn create(
        &self,
        actor: &Actor,
        specification: K::Specification,
    ) -> Result<ResourceId, ResourceError> {
        let _support = self.resolve_and_validate(&specification).await?;

        let resource = StoredResource::new(ResourceId::generate(), actor.owner(), specification);
        let id = resource.id.clone();
        Span::current().record("resource_id", tracing::field::display(&id));

        self.store
            .insert(vec![resource], self.config.quota)
            .await
            .map_err(store_error::<K>)?;

        info!(workspace = %actor.workspace(), "resource created");
        Ok(id)
    }

    /// Creates several resources at once; either all are created or none.
    ///
    /// # Errors
    ///
    /// The first validation failure, or any error [`create`](Self::create)
    /// can return for the batch as a whole.
    #[instrument(skip_all, fields(resource_kind = K::NAME, count = specifications.len()))]
    pub async fn create_bulk(
        &self,
        actor: &Actor,
        specifications: Vec<K::Specification>,
    ) -> Result<Vec<ResourceId>, ResourceError> {
        for specification in &specifications {
            let _support = self.resolve_and_validate(specification).await?;
        }

        let owner = actor.owner();
        let resources: Vec<_> = specifications
            .into_iter()
            .map(|specification| {
                StoredResource::new(ResourceId::generate(), owner.clone(), specification)
            })
            .collect();
        let ids: Vec<_> = resources.iter().map(|resource| resource.id.clone()).collect();

        self.store
            .insert(resources, self.config.quota)
            .await
            .map_err(store_error::<K>)?;

        info!(workspace = %actor.workspace(), "resources created");
        Ok(ids)
    }

    /// Records a resource the provider created on its own, under an owner the
    /// provider names.
    ///
    /// Registration is an upsert on the product's provider and
    /// `provider_generated_id`: registering the same pair again keeps the
    /// resource's id and history and replaces its owner and specification.
    /// Returns the id of the registered resource.
    ///
    /// # Errors
    ///
    /// As [`create`](Self::create), checked against `owner`'s workspace.
    #[instrument(
        skip_all,
        fields(
            resource_kind = K::NAME,
            provider_generated_id = %provider_generated_id,
            resource_id = tracing::field::Empty
        )
    )]
    pub async fn register(
        &self,
        owner: ResourceOwner,
        provider_generated_id: ProviderGeneratedId,
        specification: K::Specification,
    ) -> Result<ResourceId, ResourceError> {
        let _support = self.resolve_and_validate(&specification).await?;

        let workspace = owner.workspace();
        let resource = StoredResource::new(ResourceId::generate(), owner, specification)
            .with_provider_generated_id(provider_generated_id);

        let registration = self
            .store
            .register(resource, self.config.quota)
            .await
            .map_err(store_error::<K>)?;
        Span::current().record("resource_id", tracing::field::display(registration.id()));

        match registration {
            Registration::Inserted(id) => {
                info!(%workspace, "resource registered");
                Ok(id)
            }
            Registration::Replaced(id) => {
                info!(%workspace, "resource re-registered");
                Ok(id)
            }
        }
    }

    /// Returns one resource visible to the actor.
    ///
    /// # Errors
    ///
    /// `NotFound` when the resource does not exist, was deleted or is not
    /// visible to the actor.
    #[instrument(skip_all, fields(resource_kind = K::NAME, resource_id = %id))]
    pub async fn retrieve(
        &self,
        actor: &Actor,
        id: &ResourceId,
        flags: IncludeFlags,
    ) -> Result<Resource<K>, ResourceError> {
        let stored = self.load_accessible(actor, id).await?;
        Ok(self.present(stored, flags).await)
    }

    /// Returns one page of live resources visible to the actor.
    ///
    /// Each page is read from a single store snapshot. Pass the returned token
    /// back in [`BrowseRequest::next`] to continue.
    ///
    /// # Errors
    ///
    /// `InvalidPageToken` when the token was not produced by `browse`.
    #[instrument(skip_all, fields(resource_kind = K::NAME))]
    pub async fn browse(
        &self,
        actor: &Actor,
        request: BrowseRequest<K>,
    ) -> Result<Page<K>, ResourceError> {
        let after = request.next.as_deref().map(Cursor::parse).transpose()?;
        let limit = request
            .page_size
            .unwrap_or(self.config.page_size)
            .into_inner();

        let filter = |resource: &StoredResource<K>| {
            self.policy.can_access(actor, &resource.owner) && request.filter.matches(resource)
        };
        // One extra row tells whether another page follows
        let scan = ScanRequest::new(limit + 1, &filter)
            .after(after)
            .direction(request.direction);
        let mut rows = self.store.scan(scan).await.map_err(store_error::<K>)?;

        let next = if rows.len() > limit {
            rows.truncate(limit);
            rows.last().map(|resource| resource.cursor().to_token())
        } else {
            None
        };

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(self.present(row, request.flags).await);
        }

        debug!(count = items.len(), has_more = next.is_some(), "page read");
        Ok(Page { items, next })
    }

    /// Returns one page of the resources a browse with `request` would return
    /// that also match a free-text `query`.
    ///
    /// For ingresses the query matches any part of the domain, ignoring case.
    /// Page tokens continue the same search.
    ///
    /// # Errors
    ///
    /// As [`browse`](Self::browse).
    #[instrument(skip_all, fields(resource_kind = K::NAME, query = %query))]
    pub async fn search(
        &self,
        actor: &Actor,
        query: &str,
        mut request: BrowseRequest<K>,
    ) -> Result<Page<K>, ResourceError> {
        request.filter = request.filter.matching(query);
        self.browse(actor, request).await
    }

    /// Lazily walks every page of a browse, starting at `request.next`.
    ///
    /// Nothing is read until the stream is polled. A failed page ends the
    /// stream after yielding the error.
    pub fn browse_all<'a>(
        &'a self,
        actor: &'a Actor,
        request: BrowseRequest<K>,
    ) -> impl Stream<Item = Result<Resource<K>, ResourceError>> + Send + 'a {
        stream::try_unfold(Some(request), move |pending| async move {
            let Some(request) = pending else {
                return Ok::<_, ResourceError>(None);
            };
            let page = self.browse(actor, request.clone()).await?;
            let following = page.next.map(|token| request.after(Some(token)));
            let items = stream::iter(page.items.into_iter().map(Ok::<_, ResourceError>));
            Ok(Some((items, following)))
        })
        .try_flatten()
    }

    /// Folds one provider update into a resource's status.
    ///
    /// The update is recorded only if `sequence` is greater than the last
    /// applied sequence; gaps are allowed. Returns the new status.
    ///
    /// # Errors
    ///
    /// - `StaleUpdate` for duplicates, reordered deliveries and deleted resources
    /// - `NotFound` when the resource never existed
    #[instrument(
        skip_all,
        fields(resource_kind = K::NAME, resource_id = %id, sequence = %sequence)
    )]
    pub async fn apply_update(
        &self,
        id: &ResourceId,
        sequence: SequenceNumber,
        update: K::Update,
        message: Option<String>,
    ) -> Result<K::Status, ResourceError> {
        let _guard = self.locks.lock(id).await;

        let mut entry = UpdateEntry::new(sequence, update);
        entry.status_message = message;

        let mut last_error = None;
        for _ in 0..MAX_APPEND_ATTEMPTS {
            let resource = self
                .store
                .load(id)
                .await
                .map_err(store_error::<K>)?
                .ok_or_else(|| not_found::<K>(id))?;

            if !resource.is_live() {
                return Err(stale::<K>(id, sequence, StaleReason::Deleted));
            }
            let last = resource.history.last_sequence();
            if sequence <= last {
                return Err(stale::<K>(id, sequence, StaleReason::AlreadyApplied { last }));
            }

            match self.store.append_update(id, last, entry.clone()).await {
                Ok(status) => {
                    debug!(state = ?K::state(&status), "update applied");
                    let _ = self.events.send(ResourceEvent::Updated {
                        id: id.clone(),
                        entry,
                        status: status.clone(),
                    });
                    return Ok(status);
                }
                Err(StoreError::Deleted(_)) => {
                    return Err(stale::<K>(id, sequence, StaleReason::Deleted));
                }
                Err(conflict @ StoreError::VersionConflict { .. }) => {
                    debug!(%conflict, "history moved underneath, reloading");
                    last_error = Some(conflict);
                }
                Err(other) => return Err(store_error::<K>(other)),
            }
        }

        Err(last_error.map_or_else(|| not_found::<K>(id), store_error::<K>))
    }

    /// Applies a batch of provider envelopes in order.
    ///
    /// Every envelope gets its own result; one failure never stops the rest.
    pub async fn apply_updates(
        &self,
        envelopes: Vec<ProviderEnvelope<K::Update>>,
    ) -> Vec<Result<K::Status, ResourceError>> {
        let mut results = Vec::with_capacity(envelopes.len());
        for envelope in envelopes {
            results.push(self.apply_signal(envelope).await);
        }
        results
    }

    /// Applies one provider signal.
    ///
    /// A transient failure is recorded as the kind's failure update with the
    /// failure detail as status message, so it surfaces as resource state
    /// rather than as an error.
    ///
    /// # Errors
    ///
    /// As [`apply_update`](Self::apply_update).
    pub async fn apply_signal(
        &self,
        envelope: ProviderEnvelope<K::Update>,
    ) -> Result<K::Status, ResourceError> {
        let ProviderEnvelope {
            id,
            sequence,
            signal,
        } = envelope;

        match signal {
            ProviderSignal::Update { update, message } => {
                self.apply_update(&id, sequence, update, message).await
            }
            ProviderSignal::TransientFailure { detail } => {
                warn!(
                    resource_kind = K::NAME,
                    resource_id = %id,
                    %detail,
                    "provider reported a transient failure"
                );
                self.apply_update(&id, sequence, K::failure_update(), Some(detail))
                    .await
            }
        }
    }

    /// Consumes a provider channel until every sender is dropped.
    ///
    /// Stale signals are dropped after their warning; other failures are
    /// logged and counted, never propagated.
    #[instrument(skip_all, fields(resource_kind = K::NAME))]
    pub async fn run_provider_feed(
        &self,
        mut signals: mpsc::Receiver<ProviderEnvelope<K::Update>>,
    ) -> FeedSummary {
        let mut summary = FeedSummary::default();

        while let Some(envelope) = signals.recv().await {
            let id = envelope.id.clone();
            match self.apply_signal(envelope).await {
                Ok(_) => summary.applied += 1,
                Err(stale) if stale.is_stale() => summary.stale += 1,
                Err(failure) => {
                    error!(resource_id = %id, error = %failure, "failed to apply provider signal");
                    summary.failed += 1;
                }
            }
        }

        info!(
            applied = summary.applied,
            stale = summary.stale,
            failed = summary.failed,
            "provider feed closed"
        );
        summary
    }

    /// Deletes a resource. Deletion is terminal; later updates are stale.
    ///
    /// # Errors
    ///
    /// - `NotFound` when the resource is absent, already deleted or not visible
    /// - `Conflict` when it is bound and its product requires unbinding first
    #[instrument(skip_all, fields(resource_kind = K::NAME, resource_id = %id))]
    pub async fn delete(&self, actor: &Actor, id: &ResourceId) -> Result<(), ResourceError> {
        let _guard = self.locks.lock(id).await;
        let resource = self.load_accessible(actor, id).await?;

        if K::is_bound(resource.status()) {
            let support = self
                .catalog
                .resolve(K::product(&resource.specification))
                .await;
            if support.is_some_and(|support| support.requires_unbind_before_delete()) {
                return Err(ResourceError::Conflict {
                    kind: K::NAME,
                    reason: format!("resource {id} is bound and must be unbound before deletion"),
                });
            }
        }

        let at = Timestamp::now();
        self.store
            .mark_deleted(id, resource.history.last_sequence(), at)
            .await
            .map_err(store_error::<K>)?;

        info!("resource deleted");
        let _ = self.events.send(ResourceEvent::Deleted { id: id.clone(), at });
        Ok(())
    }

    /// Lists the support descriptors of every product the catalog knows.
    pub async fn retrieve_products(&self) -> Vec<K::Support> {
        self.catalog.list().await
    }

    /// Streams future changes to one resource visible to the actor.
    ///
    /// The stream starts with the next committed change and ends after the
    /// resource is deleted. A subscriber that falls more than the configured
    /// buffer behind skips the missed events.
    ///
    /// # Errors
    ///
    /// `NotFound` as for [`retrieve`](Self::retrieve).
    #[instrument(skip_all, fields(resource_kind = K::NAME, resource_id = %id))]
    pub async fn subscribe(
        &self,
        actor: &Actor,
        id: &ResourceId,
    ) -> Result<EventStream<K>, ResourceError> {
        // Subscribe before checking so no change between the two is lost
        let receiver = self.events.subscribe();
        let _ = self.load_accessible(actor, id).await?;
        debug!("subscription created");
        Ok(resource_events(receiver, id.clone()))
    }
}
