//! Shared fixtures for manager integration tests.

#![allow(dead_code)]

use resourcecore::{
    Actor, Ingress, IngressSpecification, IngressSupport, ManagerConfig, ProductReference,
    ProjectId, ResourceManager, StaticCatalog, Username,
};
use resourcecore_memory::InMemoryResourceStore;

pub type TestManager =
    ResourceManager<Ingress, InMemoryResourceStore<Ingress>, StaticCatalog<IngressSupport>>;

pub const PREFIX: &str = "prefix.";
pub const SUFFIX: &str = ".suffix.com";

pub fn product() -> ProductReference {
    ProductReference::try_from_parts("u1-publiclink", "u1-publiclink", "ucloud").unwrap()
}

pub fn strict_product() -> ProductReference {
    ProductReference::try_from_parts("u1-strictlink", "u1-publiclink", "ucloud").unwrap()
}

pub fn catalog() -> StaticCatalog<IngressSupport> {
    StaticCatalog::new([
        IngressSupport::new(product(), PREFIX, SUFFIX),
        IngressSupport::new(strict_product(), PREFIX, SUFFIX).with_unbind_before_delete(true),
    ])
}

pub fn manager() -> TestManager {
    manager_with(ManagerConfig::default())
}

pub fn manager_with(config: ManagerConfig) -> TestManager {
    ResourceManager::with_config(InMemoryResourceStore::new(), catalog(), config)
}

pub fn alice() -> Actor {
    Actor::personal(Username::try_new("alice").unwrap())
}

pub fn bob() -> Actor {
    Actor::personal(Username::try_new("bob").unwrap())
}

pub fn member(name: &str, project: &str) -> Actor {
    Actor::in_project(
        Username::try_new(name).unwrap(),
        ProjectId::try_new(project).unwrap(),
    )
}

pub fn spec(name: &str) -> IngressSpecification {
    IngressSpecification::new(format!("{PREFIX}{name}{SUFFIX}"), product())
}

pub fn strict_spec(name: &str) -> IngressSpecification {
    IngressSpecification::new(format!("{PREFIX}{name}{SUFFIX}"), strict_product())
}
