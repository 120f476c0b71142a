//! Failure injection for resource stores.
//!
//! Wrap any backend with [`ChaosResourceStoreExt::with_chaos`] to make a
//! configurable share of its operations fail before they reach the backend.
//! Injected failures never touch the wrapped store, so a failed call leaves
//! no partial state behind.

use std::{future::Future, sync::Mutex};

use nutype::nutype;
use rand::{random, rngs::StdRng, Rng, SeedableRng};
use resourcecore_types::{
    Operation, QuotaLimit, Registration, ResourceId, ResourceKind, ResourceStore, ScanRequest,
    SequenceNumber, StoreError, StoredResource, Timestamp, UpdateEntry,
};

/// Probability value for chaos injection rates.
///
/// A value in the range [0.0, 1.0] where 0.0 means never inject and 1.0
/// means always inject.
///
/// # Examples
///
/// ```ignore
/// use resourcecore_testing::chaos::Probability;
///
/// assert!(Probability::try_new(0.5).is_ok());
/// assert!(Probability::try_new(1.5).is_err());
/// ```
#[nutype(
    validate(greater_or_equal = 0.0, less_or_equal = 1.0),
    derive(Debug, Clone, Copy, PartialEq, PartialOrd, Display, Into)
)]
pub struct Probability(f32);

fn clamped(probability: f32) -> Probability {
    Probability::try_new(probability.clamp(0.0, 1.0)).expect("clamped value is always valid")
}

/// How often a [`ChaosResourceStore`] injects each kind of fault.
#[derive(Debug, Clone)]
pub struct ChaosConfig {
    deterministic_seed: Option<u64>,
    failure_probability: Probability,
    version_conflict_probability: Probability,
}

impl ChaosConfig {
    /// A configuration with a fixed seed, so injection decisions repeat across runs.
    pub fn deterministic() -> Self {
        Self {
            deterministic_seed: Some(0),
            ..Self::default()
        }
    }

    /// Share of operations that fail with [`StoreError::StoreFailure`].
    ///
    /// Values outside [0.0, 1.0] are clamped.
    #[must_use]
    pub fn with_failure_probability(mut self, probability: f32) -> Self {
        self.failure_probability = clamped(probability);
        self
    }

    /// Share of conditional writes that fail with [`StoreError::VersionConflict`].
    ///
    /// Applies to `append_update` and `mark_deleted`. Values outside
    /// [0.0, 1.0] are clamped.
    #[must_use]
    pub fn with_version_conflict_probability(mut self, probability: f32) -> Self {
        self.version_conflict_probability = clamped(probability);
        self
    }
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            deterministic_seed: None,
            failure_probability: clamped(0.0),
            version_conflict_probability: clamped(0.0),
        }
    }
}

/// Adds [`with_chaos`](ChaosResourceStoreExt::with_chaos) to every store.
pub trait ChaosResourceStoreExt: Sized {
    /// Wraps the store in a fault-injecting decorator.
    fn with_chaos(self, config: ChaosConfig) -> ChaosResourceStore<Self>;
}

impl<S> ChaosResourceStoreExt for S {
    fn with_chaos(self, config: ChaosConfig) -> ChaosResourceStore<Self> {
        ChaosResourceStore::new(self, config)
    }
}

/// A resource store decorator that injects faults before delegating.
pub struct ChaosResourceStore<S> {
    store: S,
    config: ChaosConfig,
    rng: Mutex<StdRng>,
}

impl<S> ChaosResourceStore<S> {
    /// Wraps `store`.
    pub fn new(store: S, config: ChaosConfig) -> Self {
        let rng = match config.deterministic_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::seed_from_u64(random()),
        };

        Self {
            store,
            config,
            rng: Mutex::new(rng),
        }
    }

    /// The wrapped store, for inspecting state behind injected failures.
    pub const fn inner(&self) -> &S {
        &self.store
    }

    fn should_inject(&self, probability: Probability) -> bool {
        let probability: f32 = probability.into();

        if probability <= 0.0 {
            return false;
        }

        if probability >= 1.0 {
            return true;
        }

        let mut rng = self
            .rng
            .lock()
            .expect("chaos RNG mutex should not be poisoned");

        rng.random_bool(f64::from(probability))
    }

    fn fail(&self, operation: Operation) -> Option<StoreError> {
        self.should_inject(self.config.failure_probability)
            .then_some(StoreError::StoreFailure { operation })
    }

    fn conflict(
        &self,
        operation: Operation,
        id: &ResourceId,
        expected: SequenceNumber,
    ) -> Option<StoreError> {
        if self.should_inject(self.config.version_conflict_probability) {
            return Some(StoreError::VersionConflict {
                id: id.clone(),
                expected,
                current: expected.next(),
            });
        }
        self.fail(operation)
    }
}

impl<K, S> ResourceStore<K> for ChaosResourceStore<S>
where
    K: ResourceKind,
    S: ResourceStore<K> + Sync,
{
    fn insert(
        &self,
        resources: Vec<StoredResource<K>>,
        quota: Option<QuotaLimit>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        let injected = self.fail(Operation::Insert);
        let store = &self.store;

        async move {
            if let Some(error) = injected {
                return Err(error);
            }

            store.insert(resources, quota).await
        }
    }

    fn register(
        &self,
        resource: StoredResource<K>,
        quota: Option<QuotaLimit>,
    ) -> impl Future<Output = Result<Registration, StoreError>> + Send {
        let injected = self.fail(Operation::Register);
        let store = &self.store;

        async move {
            if let Some(error) = injected {
                return Err(error);
            }

            store.register(resource, quota).await
        }
    }

    fn load(
        &self,
        id: &ResourceId,
    ) -> impl Future<Output = Result<Option<StoredResource<K>>, StoreError>> + Send {
        let injected = self.fail(Operation::Load);
        let store = &self.store;

        async move {
            if let Some(error) = injected {
                return Err(error);
            }

            store.load(id).await
        }
    }

    fn append_update(
        &self,
        id: &ResourceId,
        expected: SequenceNumber,
        entry: UpdateEntry<K::Update>,
    ) -> impl Future<Output = Result<K::Status, StoreError>> + Send {
        let injected = self.conflict(Operation::AppendUpdate, id, expected);
        let store = &self.store;

        async move {
            if let Some(error) = injected {
                return Err(error);
            }

            store.append_update(id, expected, entry).await
        }
    }

    fn mark_deleted(
        &self,
        id: &ResourceId,
        expected: SequenceNumber,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        let injected = self.conflict(Operation::MarkDeleted, id, expected);
        let store = &self.store;

        async move {
            if let Some(error) = injected {
                return Err(error);
            }

            store.mark_deleted(id, expected, at).await
        }
    }

    fn scan(
        &self,
        request: ScanRequest<'_, K>,
    ) -> impl Future<Output = Result<Vec<StoredResource<K>>, StoreError>> + Send {
        let injected = self.fail(Operation::Scan);
        let store = &self.store;

        async move {
            if let Some(error) = injected {
                return Err(error);
            }

            store.scan(request).await
        }
    }
}
