#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Shared vocabulary types and traits for the ResourceCore resource lifecycle library.
//!
//! This crate provides the foundational types shared between the main
//! `resourcecore` crate and store adapters like `resourcecore-memory`.
//! Keeping them in a separate crate lets adapters depend on the contract
//! without pulling in the manager.
//!
//! # Overview
//!
//! This crate contains:
//! - Core traits: `ResourceKind`, `ProductSupport`, `SupportCatalog`, `ResourceStore`
//! - Domain types: `ResourceId`, `ResourceOwner`, `ProductReference`, `SequenceNumber`, `Timestamp`
//! - Update history: `UpdateEntry`, `History`
//! - Errors: `ValidationError`, `ResourceError`, `StoreError`, `Operation`

mod errors;
mod history;
mod ids;
mod kind;
mod store;
mod validation;

pub use errors::{ResourceError, StaleReason, ValidationError};
pub use history::{History, SequenceRegression, UpdateEntry};
pub use ids::{
    CatalogName, CatalogNameError, ProductReference, ProjectId, ProjectIdError,
    ProviderGeneratedId, ProviderGeneratedIdError, ResourceId, ResourceIdError, ResourceOwner,
    SequenceNumber, Timestamp, Username, UsernameError, Workspace,
};
pub use kind::{ProductSupport, ResourceKind, SupportCatalog};
pub use store::{
    Cursor, CursorError, Operation, ProviderKey, QuotaLimit, QuotaLimitError, Registration,
    ResourceStore, ScanRequest, SortDirection, StoreError, StoredResource,
};
