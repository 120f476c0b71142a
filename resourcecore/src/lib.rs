//! `ResourceCore` - lifecycle management for provider-backed cloud resources
//!
//! A control plane creates resources from user specifications, while the
//! provider that actually allocates them reports progress asynchronously as
//! sequence-numbered updates. This library keeps the two consistent: every
//! resource's status is the fold of its recorded updates, duplicate and
//! reordered deliveries are rejected as stale, and deletion is terminal.
//!
//! One generic [`ResourceManager`] serves every resource kind described by a
//! [`ResourceKind`]. The [`ingress`] module defines the ingress kind: a public
//! network entry point bound to a domain.
//!
//! # Example
//!
//! ```rust,ignore
//! use resourcecore::{Actor, IncludeFlags, Ingress, IngressSpecification, ResourceManager};
//! use resourcecore_memory::InMemoryResourceStore;
//!
//! let manager = ResourceManager::<Ingress, _, _>::new(InMemoryResourceStore::new(), catalog);
//! let spec = IngressSpecification::new("app-demo.example.com", product);
//! let id = manager.create(&actor, spec).await?;
//! let ingress = manager.retrieve(&actor, &id, IncludeFlags::default()).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod access;
pub mod catalog;
pub mod config;
pub mod domain;
mod events;
mod feed;
pub mod ingress;
mod locks;
mod manager;
mod query;
mod resource;

pub use access::{AccessPolicy, Actor, WorkspaceScoped};
pub use catalog::StaticCatalog;
pub use config::{
    EventBufferCapacity, EventBufferCapacityError, ManagerConfig, PageSize, PageSizeError,
};
pub use events::{EventStream, ResourceEvent};
pub use feed::{FeedSummary, ProviderEnvelope, ProviderSignal};
pub use ingress::{
    Ingress, IngressSpecification, IngressState, IngressStatus, IngressSupport, IngressUpdate,
};
pub use manager::ResourceManager;
pub use query::{BrowseFilter, BrowseRequest, Page};
pub use resource::{IncludeFlags, Resource};

pub use resourcecore_types::{
    CatalogName, CatalogNameError, Cursor, CursorError, History, Operation, ProductReference,
    ProductSupport, ProjectId, ProjectIdError, ProviderGeneratedId, ProviderGeneratedIdError,
    ProviderKey, QuotaLimit, QuotaLimitError, Registration, ResourceError, ResourceId,
    ResourceIdError, ResourceKind, ResourceOwner, ResourceStore, ScanRequest, SequenceNumber,
    SequenceRegression, SortDirection, StaleReason, StoreError, StoredResource, SupportCatalog,
    Timestamp, UpdateEntry, Username, UsernameError, ValidationError, Workspace,
};
