//! The resource-kind descriptor and the provider capability contracts.
//!
//! A `ResourceKind` bundles the shapes of one kind of resource (specification,
//! status, update, support descriptor) together with the two functions that
//! give them meaning: `validate` and `apply`. One generic manager serves every
//! kind; kinds never subclass anything.

use crate::errors::ValidationError;
use crate::ids::ProductReference;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::future::Future;

/// Capability metadata a provider advertises for one product.
pub trait ProductSupport:
    Clone + Debug + PartialEq + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// The product this descriptor applies to.
    fn product(&self) -> &ProductReference;

    /// Whether a bound resource must be unbound before it can be deleted.
    fn requires_unbind_before_delete(&self) -> bool {
        false
    }
}

/// Descriptor of one resource kind.
///
/// # Example
///
/// ```ignore
/// impl ResourceKind for Ingress {
///     const NAME: &'static str = "ingresses";
///     type Specification = IngressSpecification;
///     type Status = IngressStatus;
///     type Update = IngressUpdate;
///     type Support = IngressSupport;
///     type State = IngressState;
///
///     fn apply(status: IngressStatus, update: &IngressUpdate) -> IngressStatus {
///         status.apply(update)
///     }
///     // ...
/// }
/// ```
pub trait ResourceKind: Clone + Debug + PartialEq + Send + Sync + 'static {
    /// Plural kind name used in logs and error messages, e.g. `"ingresses"`.
    const NAME: &'static str;

    /// Immutable, user-supplied desired state.
    type Specification: Clone
        + Debug
        + PartialEq
        + Send
        + Sync
        + Serialize
        + DeserializeOwned
        + 'static;

    /// System-computed observed state; always the fold of the update history.
    type Status: Clone + Debug + PartialEq + Send + Sync + Serialize + DeserializeOwned + 'static;

    /// Partial diff emitted by the provider.
    type Update: Clone + Debug + PartialEq + Send + Sync + Serialize + DeserializeOwned + 'static;

    /// Provider capability descriptor for the kind's products.
    type Support: ProductSupport;

    /// Closed set of lifecycle states, used for browse filters.
    type State: Copy + Debug + Eq + Send + Sync + 'static;

    /// The product a specification requests.
    fn product(spec: &Self::Specification) -> &ProductReference;

    /// Checks a specification against the resolved support descriptor.
    fn validate(spec: &Self::Specification, support: &Self::Support)
        -> Result<(), ValidationError>;

    /// The status of a freshly created resource.
    fn initial_status() -> Self::Status;

    /// The transition function: folds one update into a status.
    fn apply(status: Self::Status, update: &Self::Update) -> Self::Status;

    /// The lifecycle state of a status.
    fn state(status: &Self::Status) -> Self::State;

    /// The update recorded when the provider reports a transient failure.
    fn failure_update() -> Self::Update;

    /// Whether the resource is currently bound to a workload.
    fn is_bound(_status: &Self::Status) -> bool {
        false
    }

    /// Key that must be unique among live resources of this kind, if any.
    fn unique_key(_spec: &Self::Specification) -> Option<String> {
        None
    }

    /// Whether a specification matches a free-text search query.
    ///
    /// Kinds without searchable text match every query.
    fn matches_query(_spec: &Self::Specification, _query: &str) -> bool {
        true
    }

    /// Recomputes a status from the initial status and an ordered history.
    fn fold<'a, I>(updates: I) -> Self::Status
    where
        I: IntoIterator<Item = &'a Self::Update>,
    {
        updates
            .into_iter()
            .fold(Self::initial_status(), |status, update| {
                Self::apply(status, update)
            })
    }
}

/// Resolves product references to the support descriptors providers advertise.
pub trait SupportCatalog<S: ProductSupport> {
    /// Looks up the descriptor for one product.
    fn resolve(&self, product: &ProductReference) -> impl Future<Output = Option<S>> + Send;

    /// Lists every descriptor the catalog knows.
    fn list(&self) -> impl Future<Output = Vec<S>> + Send;
}

impl<S: ProductSupport, T: SupportCatalog<S> + Sync> SupportCatalog<S> for &T {
    async fn resolve(&self, product: &ProductReference) -> Option<S> {
        (*self).resolve(product).await
    }

    async fn list(&self) -> Vec<S> {
        (*self).list().await
    }
}
