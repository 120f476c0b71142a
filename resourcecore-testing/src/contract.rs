//! Behavioral contract every `ResourceStore` backend must satisfy.
//!
//! Backends opt in with one macro invocation in an integration test:
//!
//! ```ignore
//! resourcecore_testing::contract::resource_store_contract_tests! {
//!     suite = in_memory,
//!     make_store = resourcecore_memory::InMemoryResourceStore::new,
//! }
//! ```
//!
//! Each scenario is also exported as a plain async function returning
//! [`ContractTestResult`], so suites can be composed by hand.

use std::collections::HashSet;
use std::fmt;

use resourcecore_types::{
    Cursor, ProductReference, ProductSupport, ProjectId, ProviderGeneratedId, QuotaLimit,
    Registration, ResourceId, ResourceKind, ResourceOwner, ResourceStore, ScanRequest,
    SequenceNumber, SortDirection, StoreError, StoredResource, Timestamp, UpdateEntry, Username,
    ValidationError, Workspace,
};
use serde::{Deserialize, Serialize};

/// A contract scenario that did not hold.
#[derive(Debug)]
pub struct ContractTestFailure {
    scenario: &'static str,
    detail: String,
}

impl ContractTestFailure {
    fn new(scenario: &'static str, detail: impl Into<String>) -> Self {
        Self {
            scenario,
            detail: detail.into(),
        }
    }

    fn store_error(scenario: &'static str, operation: &'static str, error: StoreError) -> Self {
        Self::new(
            scenario,
            format!("{operation} operation returned unexpected error: {error}"),
        )
    }

    fn assertion(scenario: &'static str, detail: impl Into<String>) -> Self {
        Self::new(scenario, detail)
    }
}

impl fmt::Display for ContractTestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.scenario, self.detail)
    }
}

impl std::error::Error for ContractTestFailure {}

/// Outcome of one contract scenario.
pub type ContractTestResult = Result<(), ContractTestFailure>;

/// Specification of a [`ContractResource`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSpec {
    /// Requested product.
    pub product: ProductReference,
    /// Optional key that must be unique among live resources.
    pub key: Option<String>,
}

/// Status of a [`ContractResource`]: the labels of every applied update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractStatus {
    /// Applied update labels, oldest first.
    pub labels: Vec<String>,
}

/// Support descriptor of a [`ContractResource`] product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSupport {
    /// The supported product.
    pub product: ProductReference,
}

impl ProductSupport for ContractSupport {
    fn product(&self) -> &ProductReference {
        &self.product
    }
}

/// Minimal resource kind the contract scenarios persist.
///
/// Its status is the list of applied update labels, which makes lost,
/// duplicated or reordered appends visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractResource;

impl ResourceKind for ContractResource {
    const NAME: &'static str = "contract-resources";
    type Specification = ContractSpec;
    type Status = ContractStatus;
    type Update = String;
    type Support = ContractSupport;
    type State = usize;

    fn product(spec: &ContractSpec) -> &ProductReference {
        &spec.product
    }

    fn validate(_spec: &ContractSpec, _support: &ContractSupport) -> Result<(), ValidationError> {
        Ok(())
    }

    fn initial_status() -> ContractStatus {
        ContractStatus::default()
    }

    fn apply(mut status: ContractStatus, update: &String) -> ContractStatus {
        status.labels.push(update.clone());
        status
    }

    fn state(status: &ContractStatus) -> usize {
        status.labels.len()
    }

    fn failure_update() -> String {
        "failure".to_string()
    }

    fn unique_key(spec: &ContractSpec) -> Option<String> {
        spec.key.clone()
    }
}

fn contract_product() -> ProductReference {
    ProductReference::try_from_parts("contract", "contract", "contract-provider")
        .expect("valid product reference")
}

fn contract_owner(workspace: &str) -> ResourceOwner {
    ResourceOwner::new(
        Username::try_new("contract-user").expect("valid username"),
        Some(ProjectId::try_new(workspace).expect("valid project id")),
    )
}

/// A fresh resource in `workspace`, optionally holding `key`.
fn contract_resource(workspace: &str, key: Option<&str>) -> StoredResource<ContractResource> {
    StoredResource::new(
        ResourceId::generate(),
        contract_owner(workspace),
        ContractSpec {
            product: contract_product(),
            key: key.map(str::to_string),
        },
    )
}

/// Workspace and key names unique to one scenario run, for backends shared
/// between parallel tests.
fn scoped(scenario: &'static str, label: &str) -> String {
    format!("{scenario}-{label}-{}", ResourceId::generate())
}

fn seq(value: u64) -> SequenceNumber {
    SequenceNumber::new(value)
}

fn entry(sequence: u64, label: &str) -> UpdateEntry<String> {
    UpdateEntry::new(seq(sequence), label.to_string())
}

async fn load_existing<S>(
    scenario: &'static str,
    store: &S,
    id: &ResourceId,
) -> Result<StoredResource<ContractResource>, ContractTestFailure>
where
    S: ResourceStore<ContractResource>,
{
    store
        .load(id)
        .await
        .map_err(|error| ContractTestFailure::store_error(scenario, "load", error))?
        .ok_or_else(|| {
            ContractTestFailure::assertion(scenario, format!("resource {id} was not persisted"))
        })
}

async fn expect_absent<S>(
    scenario: &'static str,
    store: &S,
    ids: impl IntoIterator<Item = &ResourceId>,
) -> ContractTestResult
where
    S: ResourceStore<ContractResource>,
{
    for id in ids {
        let loaded = store
            .load(id)
            .await
            .map_err(|error| ContractTestFailure::store_error(scenario, "load", error))?;
        if loaded.is_some() {
            return Err(ContractTestFailure::assertion(
                scenario,
                format!("resource {id} from a rejected batch was persisted"),
            ));
        }
    }
    Ok(())
}

/// Inserted resources load back unchanged; unknown ids load as `None`.
pub async fn test_insert_then_load<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: ResourceStore<ContractResource> + Send + Sync + 'static,
{
    const SCENARIO: &str = "insert_then_load";

    let store = make_store();
    let resource = contract_resource(&scoped(SCENARIO, "ws"), None);

    store
        .insert(vec![resource.clone()], None)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "insert", error))?;

    let loaded = load_existing(SCENARIO, &store, &resource.id).await?;
    if loaded != resource {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("loaded resource differs from inserted one: {loaded:?}"),
        ));
    }

    let unknown = store
        .load(&ResourceId::generate())
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "load", error))?;
    if unknown.is_some() {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            "loading an unknown id returned a resource",
        ));
    }

    Ok(())
}

/// Duplicate ids are rejected, and a batch containing one persists nothing.
pub async fn test_duplicate_ids_rejected<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: ResourceStore<ContractResource> + Send + Sync + 'static,
{
    const SCENARIO: &str = "duplicate_ids_rejected";

    let store = make_store();
    let workspace = scoped(SCENARIO, "ws");
    let existing = contract_resource(&workspace, None);
    store
        .insert(vec![existing.clone()], None)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "insert", error))?;

    let fresh = contract_resource(&workspace, None);
    match store
        .insert(vec![fresh.clone(), existing.clone()], None)
        .await
    {
        Err(StoreError::DuplicateResource(id)) if id == existing.id => {}
        Err(error) => return Err(ContractTestFailure::store_error(SCENARIO, "insert", error)),
        Ok(()) => {
            return Err(ContractTestFailure::assertion(
                SCENARIO,
                "expected duplicate id to be rejected but insert succeeded",
            ))
        }
    }

    expect_absent(SCENARIO, &store, [&fresh.id]).await
}

/// Appends succeed only against the current sequence and fold into the status.
pub async fn test_compare_and_append<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: ResourceStore<ContractResource> + Send + Sync + 'static,
{
    const SCENARIO: &str = "compare_and_append";

    let store = make_store();
    let resource = contract_resource(&scoped(SCENARIO, "ws"), None);
    let id = resource.id.clone();
    store
        .insert(vec![resource], None)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "insert", error))?;

    let status = store
        .append_update(&id, SequenceNumber::initial(), entry(1, "first"))
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "append_update", error))?;
    if status.labels != ["first"] {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("append returned {status:?} instead of the folded status"),
        ));
    }

    match store
        .append_update(&id, SequenceNumber::initial(), entry(2, "lost"))
        .await
    {
        Err(StoreError::VersionConflict { current, .. }) if current == seq(1) => {}
        Err(error) => {
            return Err(ContractTestFailure::store_error(
                SCENARIO,
                "append_update",
                error,
            ))
        }
        Ok(_) => {
            return Err(ContractTestFailure::assertion(
                SCENARIO,
                "expected version conflict but append succeeded",
            ))
        }
    }

    match store.append_update(&id, seq(1), entry(1, "again")).await {
        Err(StoreError::SequenceRegression(_)) => {}
        Err(error) => {
            return Err(ContractTestFailure::store_error(
                SCENARIO,
                "append_update",
                error,
            ))
        }
        Ok(_) => {
            return Err(ContractTestFailure::assertion(
                SCENARIO,
                "expected a non-advancing sequence to be rejected",
            ))
        }
    }

    let _ = store
        .append_update(&id, seq(1), entry(7, "gap"))
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "append_update", error))?;

    let loaded = load_existing(SCENARIO, &store, &id).await?;
    if loaded.status().labels != ["first", "gap"] || loaded.history.last_sequence() != seq(7) {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!(
                "expected labels [first, gap] at sequence 7, observed {:?} at {}",
                loaded.status().labels,
                loaded.history.last_sequence()
            ),
        ));
    }
    if !loaded.history.is_consistent() {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            "stored status is not the fold of the stored history",
        ));
    }

    Ok(())
}

/// Deleted resources keep loading, refuse writes and leave scans.
pub async fn test_tombstones<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: ResourceStore<ContractResource> + Send + Sync + 'static,
{
    const SCENARIO: &str = "tombstones";

    let store = make_store();
    let workspace = scoped(SCENARIO, "ws");
    let resource = contract_resource(&workspace, None);
    let id = resource.id.clone();
    store
        .insert(vec![resource], None)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "insert", error))?;

    match store
        .mark_deleted(&id, seq(3), Timestamp::now())
        .await
    {
        Err(StoreError::VersionConflict { .. }) => {}
        Err(error) => return Err(ContractTestFailure::store_error(SCENARIO, "mark_deleted", error)),
        Ok(()) => {
            return Err(ContractTestFailure::assertion(
                SCENARIO,
                "expected delete with a wrong sequence to conflict",
            ))
        }
    }

    let deleted_at = Timestamp::now();
    store
        .mark_deleted(&id, SequenceNumber::initial(), deleted_at)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "mark_deleted", error))?;

    let loaded = load_existing(SCENARIO, &store, &id).await?;
    if loaded.deleted_at != Some(deleted_at) {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected tombstone at {deleted_at}, observed {:?}", loaded.deleted_at),
        ));
    }

    match store
        .append_update(&id, SequenceNumber::initial(), entry(1, "late"))
        .await
    {
        Err(StoreError::Deleted(deleted)) if deleted == id => {}
        Err(error) => {
            return Err(ContractTestFailure::store_error(
                SCENARIO,
                "append_update",
                error,
            ))
        }
        Ok(_) => {
            return Err(ContractTestFailure::assertion(
                SCENARIO,
                "expected append to a deleted resource to fail",
            ))
        }
    }

    match store
        .mark_deleted(&id, SequenceNumber::initial(), Timestamp::now())
        .await
    {
        Err(StoreError::Deleted(_)) => {}
        Err(error) => return Err(ContractTestFailure::store_error(SCENARIO, "mark_deleted", error)),
        Ok(()) => {
            return Err(ContractTestFailure::assertion(
                SCENARIO,
                "expected a second delete to fail",
            ))
        }
    }

    match store
        .mark_deleted(&ResourceId::generate(), SequenceNumber::initial(), Timestamp::now())
        .await
    {
        Err(StoreError::Missing(_)) => {}
        Err(error) => return Err(ContractTestFailure::store_error(SCENARIO, "mark_deleted", error)),
        Ok(()) => {
            return Err(ContractTestFailure::assertion(
                SCENARIO,
                "expected deleting an unknown id to fail",
            ))
        }
    }

    let target = Workspace::Project(ProjectId::try_new(workspace).expect("valid project id"));
    let in_workspace =
        move |resource: &StoredResource<ContractResource>| resource.workspace() == target;
    let scanned = store
        .scan(ScanRequest::new(10, &in_workspace))
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "scan", error))?;
    if !scanned.is_empty() {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            "scan returned a deleted resource",
        ));
    }

    Ok(())
}

/// Unique keys are exclusive among live resources and released on delete.
pub async fn test_unique_keys<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: ResourceStore<ContractResource> + Send + Sync + 'static,
{
    const SCENARIO: &str = "unique_keys";

    let store = make_store();
    let workspace = scoped(SCENARIO, "ws");
    let key = scoped(SCENARIO, "key");
    let holder = contract_resource(&workspace, Some(&key));
    store
        .insert(vec![holder.clone()], None)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "insert", error))?;

    let contender = contract_resource(&workspace, Some(&key));
    match store.insert(vec![contender.clone()], None).await {
        Err(StoreError::UniqueKeyTaken { key: taken, holder: owner })
            if taken == key && owner == holder.id => {}
        Err(error) => return Err(ContractTestFailure::store_error(SCENARIO, "insert", error)),
        Ok(()) => {
            return Err(ContractTestFailure::assertion(
                SCENARIO,
                "expected a taken key to be rejected",
            ))
        }
    }

    let other_key = scoped(SCENARIO, "other");
    let twins = [
        contract_resource(&workspace, Some(&other_key)),
        contract_resource(&workspace, Some(&other_key)),
    ];
    match store.insert(twins.to_vec(), None).await {
        Err(StoreError::UniqueKeyTaken { .. }) => {}
        Err(error) => return Err(ContractTestFailure::store_error(SCENARIO, "insert", error)),
        Ok(()) => {
            return Err(ContractTestFailure::assertion(
                SCENARIO,
                "expected a batch repeating one key to be rejected",
            ))
        }
    }
    expect_absent(SCENARIO, &store, twins.iter().map(|resource| &resource.id)).await?;

    store
        .mark_deleted(&holder.id, SequenceNumber::initial(), Timestamp::now())
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "mark_deleted", error))?;
    store
        .insert(vec![contender], None)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "insert", error))?;

    Ok(())
}

/// Quota checks cover the whole batch and count only live resources.
pub async fn test_quota_is_atomic<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: ResourceStore<ContractResource> + Send + Sync + 'static,
{
    const SCENARIO: &str = "quota_is_atomic";

    let store = make_store();
    let workspace = scoped(SCENARIO, "ws");
    let quota = QuotaLimit::try_new(2).expect("valid quota");

    let oversized: Vec<_> = (0..3).map(|_| contract_resource(&workspace, None)).collect();
    match store.insert(oversized.clone(), Some(quota)).await {
        Err(StoreError::QuotaExceeded { limit, .. }) if limit == quota => {}
        Err(error) => return Err(ContractTestFailure::store_error(SCENARIO, "insert", error)),
        Ok(()) => {
            return Err(ContractTestFailure::assertion(
                SCENARIO,
                "expected a batch above quota to be rejected",
            ))
        }
    }
    expect_absent(SCENARIO, &store, oversized.iter().map(|resource| &resource.id)).await?;

    let first = contract_resource(&workspace, None);
    let second = contract_resource(&workspace, None);
    store
        .insert(vec![first.clone(), second], Some(quota))
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "insert", error))?;

    let elsewhere = contract_resource(&scoped(SCENARIO, "other-ws"), None);
    store
        .insert(vec![elsewhere], Some(quota))
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "insert", error))?;

    let third = contract_resource(&workspace, None);
    if store.insert(vec![third.clone()], Some(quota)).await.is_ok() {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            "expected the workspace to be at its quota",
        ));
    }

    store
        .mark_deleted(&first.id, SequenceNumber::initial(), Timestamp::now())
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "mark_deleted", error))?;
    store
        .insert(vec![third], Some(quota))
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "insert", error))?;

    Ok(())
}

/// Scans follow cursor order in both directions, resume strictly after the
/// cursor and apply the filter before the limit.
pub async fn test_ordered_scans<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: ResourceStore<ContractResource> + Send + Sync + 'static,
{
    const SCENARIO: &str = "ordered_scans";

    let store = make_store();
    let workspace = scoped(SCENARIO, "ws");
    let base = Timestamp::now().as_micros();

    let mut resources = Vec::new();
    for offset in 0..5 {
        let mut resource = contract_resource(&workspace, None);
        resource.created_at = Timestamp::from_micros(base + offset).ok_or_else(|| {
            ContractTestFailure::assertion(SCENARIO, "timestamp out of range")
        })?;
        resources.push(resource);
    }
    store
        .insert(resources.clone(), None)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "insert", error))?;

    let ids: HashSet<ResourceId> = resources.iter().map(|resource| resource.id.clone()).collect();
    let ours = move |resource: &StoredResource<ContractResource>| ids.contains(&resource.id);
    let cursors: Vec<Cursor> = resources.iter().map(StoredResource::cursor).collect();

    let newest = store
        .scan(ScanRequest::new(2, &ours))
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "scan", error))?;
    let observed: Vec<Cursor> = newest.iter().map(StoredResource::cursor).collect();
    if observed != [cursors[4].clone(), cursors[3].clone()] {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("descending scan returned {observed:?}"),
        ));
    }

    let rest = store
        .scan(ScanRequest::new(10, &ours).after(observed.last().cloned()))
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "scan", error))?;
    let observed: Vec<Cursor> = rest.iter().map(StoredResource::cursor).collect();
    let expected: Vec<Cursor> = cursors[..3].iter().rev().cloned().collect();
    if observed != expected {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("resumed descending scan returned {observed:?}"),
        ));
    }

    let ascending = store
        .scan(
            ScanRequest::new(10, &ours)
                .direction(SortDirection::Ascending)
                .after(Some(cursors[1].clone())),
        )
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "scan", error))?;
    let observed: Vec<Cursor> = ascending.iter().map(StoredResource::cursor).collect();
    if observed != cursors[2..] {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("resumed ascending scan returned {observed:?}"),
        ));
    }

    let odd_ids: HashSet<ResourceId> = resources
        .iter()
        .skip(1)
        .step_by(2)
        .map(|resource| resource.id.clone())
        .collect();
    let odd = move |resource: &StoredResource<ContractResource>| odd_ids.contains(&resource.id);
    let filtered = store
        .scan(ScanRequest::new(1, &odd).direction(SortDirection::Ascending))
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "scan", error))?;
    if filtered.len() != 1 || filtered[0].id != resources[1].id {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            "filter was not applied before the limit",
        ));
    }

    Ok(())
}

/// Registering an already registered provider id replaces owner and
/// specification in place and keeps the history.
pub async fn test_register_upserts_on_provider_id<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: ResourceStore<ContractResource> + Send + Sync + 'static,
{
    const SCENARIO: &str = "register_upserts_on_provider_id";

    let store = make_store();
    let provider_id = ProviderGeneratedId::try_new(scoped(SCENARIO, "pod"))
        .map_err(|error| ContractTestFailure::assertion(SCENARIO, error.to_string()))?;
    let first = contract_resource(&scoped(SCENARIO, "first"), None)
        .with_provider_generated_id(provider_id.clone());
    let second = contract_resource(&scoped(SCENARIO, "second"), Some(&scoped(SCENARIO, "key")))
        .with_provider_generated_id(provider_id);

    let registered = store
        .register(first.clone(), None)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "register", error))?;
    if registered != Registration::Inserted(first.id.clone()) {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("first registration returned {registered:?}"),
        ));
    }
    let _ = store
        .append_update(&first.id, SequenceNumber::initial(), entry(1, "first"))
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "append_update", error))?;

    let replaced = store
        .register(second.clone(), None)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "register", error))?;
    if replaced != Registration::Replaced(first.id.clone()) {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("second registration returned {replaced:?}"),
        ));
    }

    let loaded = load_existing(SCENARIO, &store, &first.id).await?;
    if loaded.owner != second.owner || loaded.specification != second.specification {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("re-registration did not take the new owner and specification: {loaded:?}"),
        ));
    }
    if loaded.status().labels != ["first"] || loaded.created_at != first.created_at {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("re-registration lost history or creation time: {loaded:?}"),
        ));
    }
    expect_absent(SCENARIO, &store, [&second.id]).await?;

    let unregistered = contract_resource(&scoped(SCENARIO, "plain"), None);
    let inserted = store
        .register(unregistered.clone(), None)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "register", error))?;
    if inserted != Registration::Inserted(unregistered.id) {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            "a resource without a provider id was not inserted as new",
        ));
    }

    Ok(())
}

/// Generates one `#[tokio::test]` per contract scenario for a backend.
#[macro_export]
macro_rules! resource_store_contract_tests {
    (suite = $suite:ident, make_store = $make_store:expr $(,)?) => {
        #[allow(non_snake_case)]
        mod $suite {
            use $crate::contract::{
                test_compare_and_append, test_duplicate_ids_rejected, test_insert_then_load,
                test_ordered_scans, test_quota_is_atomic, test_register_upserts_on_provider_id,
                test_tombstones, test_unique_keys,
            };

            #[tokio::test(flavor = "multi_thread")]
            async fn insert_then_load_contract() {
                test_insert_then_load($make_store)
                    .await
                    .expect("resource store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn duplicate_ids_rejected_contract() {
                test_duplicate_ids_rejected($make_store)
                    .await
                    .expect("resource store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn compare_and_append_contract() {
                test_compare_and_append($make_store)
                    .await
                    .expect("resource store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn tombstones_contract() {
                test_tombstones($make_store)
                    .await
                    .expect("resource store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn unique_keys_contract() {
                test_unique_keys($make_store)
                    .await
                    .expect("resource store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn quota_is_atomic_contract() {
                test_quota_is_atomic($make_store)
                    .await
                    .expect("resource store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn register_upserts_on_provider_id_contract() {
                test_register_upserts_on_provider_id($make_store)
                    .await
                    .expect("resource store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn ordered_scans_contract() {
                test_ordered_scans($make_store)
                    .await
                    .expect("resource store contract failed");
            }
        }
    };
}

pub use resource_store_contract_tests;
