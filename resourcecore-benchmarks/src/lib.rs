//! ResourceCore Benchmarks
//!
//! Performance benchmarks for the ResourceCore library: update application,
//! status folding and paginated browsing. Shared fixtures live here so every
//! bench builds its manager the same way.

#![deny(missing_docs)]

use resourcecore::{
    Actor, Ingress, IngressSpecification, IngressSupport, ManagerConfig, ProductReference,
    ResourceManager, StaticCatalog, Username,
};
use resourcecore_memory::InMemoryResourceStore;

/// Manager type every benchmark drives.
pub type BenchManager =
    ResourceManager<Ingress, InMemoryResourceStore<Ingress>, StaticCatalog<IngressSupport>>;

const PREFIX: &str = "bench.";
const SUFFIX: &str = ".example.com";

/// The single product the benchmark catalog supports.
pub fn product() -> ProductReference {
    ProductReference::try_from_parts("u1-publiclink", "u1-publiclink", "ucloud")
        .expect("valid product reference")
}

/// A manager over an empty in-memory store with quotas disabled.
pub fn manager() -> BenchManager {
    let catalog = StaticCatalog::new([IngressSupport::new(product(), PREFIX, SUFFIX)]);
    ResourceManager::with_config(InMemoryResourceStore::new(), catalog, ManagerConfig::default())
}

/// The actor owning every benchmark resource.
pub fn actor() -> Actor {
    Actor::personal(Username::try_new("bench").expect("valid username"))
}

/// A valid specification for the `index`-th resource.
pub fn spec(index: usize) -> IngressSpecification {
    IngressSpecification::new(format!("{PREFIX}app-{index}{SUFFIX}"), product())
}
