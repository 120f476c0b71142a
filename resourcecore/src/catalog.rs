//! A fixed, in-process support catalog.

use resourcecore_types::{ProductReference, ProductSupport, SupportCatalog};

/// Catalog over a fixed list of support descriptors.
///
/// Suitable for tests and for deployments where providers are configured at
/// startup. Later descriptors for the same product replace earlier ones.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticCatalog<S> {
    descriptors: Vec<S>,
}

impl<S: ProductSupport> StaticCatalog<S> {
    /// Creates a catalog from descriptors.
    pub fn new(descriptors: impl IntoIterator<Item = S>) -> Self {
        descriptors
            .into_iter()
            .fold(Self::empty(), |catalog, support| catalog.with(support))
    }

    /// A catalog that resolves nothing.
    pub const fn empty() -> Self {
        Self {
            descriptors: Vec::new(),
        }
    }

    /// Adds or replaces the descriptor for `support.product()`.
    #[must_use]
    pub fn with(mut self, support: S) -> Self {
        self.descriptors
            .retain(|existing| existing.product() != support.product());
        self.descriptors.push(support);
        self
    }

    fn find(&self, product: &ProductReference) -> Option<&S> {
        self.descriptors
            .iter()
            .find(|support| support.product() == product)
    }
}

impl<S: ProductSupport> Default for StaticCatalog<S> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<S: ProductSupport> SupportCatalog<S> for StaticCatalog<S> {
    async fn resolve(&self, product: &ProductReference) -> Option<S> {
        self.find(product).cloned()
    }

    async fn list(&self) -> Vec<S> {
        self.descriptors.clone()
    }
}
