//! Browse requests, filters and pages.

use crate::config::PageSize;
use crate::resource::{IncludeFlags, Resource};
use resourcecore_types::{
    CatalogName, ProjectId, ResourceId, ResourceKind, SortDirection, StoredResource, Timestamp,
    Username,
};
use std::collections::HashSet;

/// Predicates a resource must satisfy to appear in a browse.
///
/// Unset fields match everything. Time bounds are inclusive.
#[derive(Debug, Clone)]
pub struct BrowseFilter<K: ResourceKind> {
    /// Only resources in this lifecycle state.
    pub state: Option<K::State>,
    /// Only resources created by this user.
    pub created_by: Option<Username>,
    /// Only resources owned by this project.
    pub project: Option<ProjectId>,
    /// Only resources created at or after this time.
    pub created_after: Option<Timestamp>,
    /// Only resources created at or before this time.
    pub created_before: Option<Timestamp>,
    /// Only resources of this product id.
    pub product_id: Option<CatalogName>,
    /// Only resources of this product category.
    pub product_category: Option<CatalogName>,
    /// Only resources of this provider.
    pub provider: Option<CatalogName>,
    /// Only resources with one of these ids.
    pub ids: Option<HashSet<ResourceId>>,
    /// Only resources whose specification matches this free-text query.
    pub query: Option<String>,
}

impl<K: ResourceKind> Default for BrowseFilter<K> {
    fn default() -> Self {
        Self {
            state: None,
            created_by: None,
            project: None,
            created_after: None,
            created_before: None,
            product_id: None,
            product_category: None,
            provider: None,
            ids: None,
            query: None,
        }
    }
}

fn matches_if_set<T: PartialEq>(wanted: Option<&T>, actual: &T) -> bool {
    wanted.map_or(true, |wanted| wanted == actual)
}

impl<K: ResourceKind> BrowseFilter<K> {
    /// Whether `resource` satisfies every set predicate.
    pub fn matches(&self, resource: &StoredResource<K>) -> bool {
        let product = K::product(&resource.specification);

        matches_if_set(self.state.as_ref(), &K::state(resource.status()))
            && matches_if_set(self.created_by.as_ref(), &resource.owner.created_by)
            && self
                .project
                .as_ref()
                .map_or(true, |project| resource.owner.project.as_ref() == Some(project))
            && self
                .created_after
                .map_or(true, |after| resource.created_at >= after)
            && self
                .created_before
                .map_or(true, |before| resource.created_at <= before)
            && matches_if_set(self.product_id.as_ref(), &product.id)
            && matches_if_set(self.product_category.as_ref(), &product.category)
            && matches_if_set(self.provider.as_ref(), &product.provider)
            && self
                .ids
                .as_ref()
                .map_or(true, |ids| ids.contains(&resource.id))
            && self
                .query
                .as_deref()
                .map_or(true, |query| K::matches_query(&resource.specification, query))
    }

    /// Restricts to one lifecycle state.
    #[must_use]
    pub fn in_state(mut self, state: K::State) -> Self {
        self.state = Some(state);
        self
    }

    /// Restricts to resources created by one user.
    #[must_use]
    pub fn created_by(mut self, username: Username) -> Self {
        self.created_by = Some(username);
        self
    }

    /// Restricts to resources of one project.
    #[must_use]
    pub fn in_project(mut self, project: ProjectId) -> Self {
        self.project = Some(project);
        self
    }

    /// Restricts to a creation time window.
    #[must_use]
    pub fn created_between(mut self, after: Option<Timestamp>, before: Option<Timestamp>) -> Self {
        self.created_after = after;
        self.created_before = before;
        self
    }

    /// Restricts to resources matching a free-text query.
    #[must_use]
    pub fn matching(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Restricts to an explicit set of ids.
    #[must_use]
    pub fn with_ids(mut self, ids: impl IntoIterator<Item = ResourceId>) -> Self {
        self.ids = Some(ids.into_iter().collect());
        self
    }
}

/// One browse call: filter, order, page size and resume point.
#[derive(Debug, Clone)]
pub struct BrowseRequest<K: ResourceKind> {
    /// Which resources to return.
    pub filter: BrowseFilter<K>,
    /// Creation-time order; newest first unless changed.
    pub direction: SortDirection,
    /// Page size; the manager's configured default when `None`.
    pub page_size: Option<PageSize>,
    /// Token from a previous page to resume after.
    pub next: Option<String>,
    /// Optional parts to include with every resource.
    pub flags: IncludeFlags,
}

impl<K: ResourceKind> Default for BrowseRequest<K> {
    fn default() -> Self {
        Self {
            filter: BrowseFilter::default(),
            direction: SortDirection::default(),
            page_size: None,
            next: None,
            flags: IncludeFlags::default(),
        }
    }
}

impl<K: ResourceKind> BrowseRequest<K> {
    /// A request for the first page with the given filter.
    pub fn new(filter: BrowseFilter<K>) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Sets the order.
    #[must_use]
    pub fn direction(mut self, direction: SortDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Sets the page size.
    #[must_use]
    pub fn page_size(mut self, page_size: PageSize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Resumes after a page token.
    #[must_use]
    pub fn after(mut self, token: Option<String>) -> Self {
        self.next = token;
        self
    }

    /// Sets the include flags.
    #[must_use]
    pub fn include(mut self, flags: IncludeFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// One page of browse results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<K: ResourceKind> {
    /// Resources on this page, in the requested order.
    pub items: Vec<Resource<K>>,
    /// Token for the following page; `None` on the last page.
    pub next: Option<String>,
}
