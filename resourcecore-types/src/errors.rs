//! Error taxonomy for resource lifecycle operations.
//!
//! - **ValidationError**: the specification does not satisfy its support descriptor
//! - **ResourceError**: what callers of the manager observe
//! - **StoreError** (in `store`): persistence failures, mapped into `ResourceError`

use crate::ids::{ProductReference, ResourceId, SequenceNumber, Workspace};
use crate::store::{CursorError, QuotaLimit, StoreError};
use thiserror::Error;

/// A specification was rejected before anything was persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The requested domain is not a syntactically valid hostname.
    #[error("domain '{domain}' is not a valid hostname: {reason}")]
    InvalidDomain {
        /// The rejected domain.
        domain: String,
        /// Which hostname rule was violated.
        reason: String,
    },

    /// The domain lies outside the namespace the provider allocates from.
    #[error("domain '{domain}' must have the form '{prefix}<name>{suffix}'")]
    DomainNotInNamespace {
        /// The rejected domain.
        domain: String,
        /// Provider-advertised prefix.
        prefix: String,
        /// Provider-advertised suffix.
        suffix: String,
    },

    /// No support descriptor resolves for the requested product.
    #[error("product {product} is not supported by any provider")]
    UnsupportedProduct {
        /// The requested product.
        product: ProductReference,
    },
}

/// Why an update was discarded as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// The sequence number is not greater than the last applied one.
    AlreadyApplied {
        /// The last sequence number folded into the status.
        last: SequenceNumber,
    },
    /// The resource has been deleted; no further updates are accepted.
    Deleted,
}

impl std::fmt::Display for StaleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyApplied { last } => {
                write!(f, "sequence is not greater than last applied {last}")
            }
            Self::Deleted => write!(f, "resource has been deleted"),
        }
    }
}

/// Errors surfaced by resource manager operations.
///
/// # Error Handling Strategy
///
/// - **Validation**: fix the specification and retry
/// - **NotFound**: the resource is absent, deleted or not visible to the caller
/// - **Conflict**: the resource state forbids the operation (for example an active binding)
/// - **QuotaExceeded**: delete resources in the workspace first
/// - **StaleUpdate**: duplicate or reordered provider delivery; log and drop
/// - **InvalidPageToken**: restart browsing from the first page
/// - **Store**: infrastructure failure, retry may succeed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResourceError {
    /// The specification failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The resource does not exist or is not visible to the caller.
    #[error("{kind} resource {id} not found")]
    NotFound {
        /// Resource kind name.
        kind: &'static str,
        /// The requested id.
        id: ResourceId,
    },

    /// The operation conflicts with the current resource state.
    #[error("conflict on {kind} resource: {reason}")]
    Conflict {
        /// Resource kind name.
        kind: &'static str,
        /// What blocked the operation.
        reason: String,
    },

    /// Creating the resource would exceed the workspace quota.
    #[error("quota of {limit} {kind} exceeded in workspace {workspace}")]
    QuotaExceeded {
        /// Resource kind name.
        kind: &'static str,
        /// The workspace at its limit.
        workspace: Workspace,
        /// The configured limit.
        limit: QuotaLimit,
    },

    /// The update was discarded without changing the status.
    #[error("stale update {sequence} for {kind} resource {id}: {reason}")]
    StaleUpdate {
        /// Resource kind name.
        kind: &'static str,
        /// The addressed resource.
        id: ResourceId,
        /// Sequence number carried by the discarded update.
        sequence: SequenceNumber,
        /// Why it was discarded.
        reason: StaleReason,
    },

    /// A browse request carried a page token this store never issued.
    #[error(transparent)]
    InvalidPageToken(#[from] CursorError),

    /// The backing store failed.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl ResourceError {
    /// Whether this error reports a discarded duplicate or late update.
    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::StaleUpdate { .. })
    }
}
