//! Manager configuration with validated limits.
//!
//! Every limit is a `nutype` so an out-of-range configuration cannot be
//! constructed, whether it is built in code or deserialized from a file.

use nutype::nutype;
use resourcecore_types::QuotaLimit;
use serde::{Deserialize, Serialize};

/// Number of resources returned per browse page.
///
/// Validated to be between 1 and 250; defaults to 50.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 250),
    default = 50,
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Default,
        Display,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct PageSize(usize);

impl PageSize {
    /// Largest page a caller may request.
    pub const MAX: usize = 250;

    /// Clamps an arbitrary requested size into the valid range.
    pub fn saturating(requested: usize) -> Self {
        Self::try_new(requested.clamp(1, Self::MAX))
            .expect("clamped page size is always within bounds")
    }
}

/// Capacity of the broadcast buffer feeding change subscriptions.
///
/// Subscribers that fall further behind than this skip ahead to the newest
/// events. Validated to be between 1 and 65536; defaults to 1024.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 65_536),
    default = 1024,
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Default,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct EventBufferCapacity(usize);

/// Settings for a [`ResourceManager`](crate::ResourceManager).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Page size used when a browse request does not name one.
    pub page_size: PageSize,
    /// Maximum number of live resources per workspace; unlimited when `None`.
    pub quota: Option<QuotaLimit>,
    /// Buffer capacity of the change-event broadcast.
    pub event_buffer: EventBufferCapacity,
}

impl ManagerConfig {
    /// Sets the default page size.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: PageSize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Limits the number of live resources per workspace.
    #[must_use]
    pub const fn with_quota(mut self, quota: QuotaLimit) -> Self {
        self.quota = Some(quota);
        self
    }

    /// Sets the subscription buffer capacity.
    #[must_use]
    pub const fn with_event_buffer(mut self, capacity: EventBufferCapacity) -> Self {
        self.event_buffer = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ManagerConfig::default();

        assert_eq!(config.page_size.into_inner(), 50);
        assert_eq!(config.event_buffer.into_inner(), 1024);
        assert!(config.quota.is_none());
    }

    #[test]
    fn page_size_bounds_are_enforced() {
        assert!(PageSize::try_new(0).is_err());
        assert!(PageSize::try_new(251).is_err());
        assert_eq!(PageSize::saturating(10_000).into_inner(), PageSize::MAX);
        assert_eq!(PageSize::saturating(0).into_inner(), 1);
    }

    #[test]
    fn partial_config_deserializes_with_defaults() {
        let config: ManagerConfig = serde_json::from_str(r#"{"quota": 3}"#).unwrap();

        assert_eq!(config.quota, Some(QuotaLimit::try_new(3).unwrap()));
        assert_eq!(config.page_size, PageSize::default());
    }

    #[test]
    fn out_of_range_values_fail_to_deserialize() {
        let result = serde_json::from_str::<ManagerConfig>(r#"{"page_size": 1000}"#);

        assert!(result.is_err());
    }

    #[test]
    fn builders_override_defaults() {
        let config = ManagerConfig::default()
            .with_page_size(PageSize::try_new(5).unwrap())
            .with_quota(QuotaLimit::try_new(2).unwrap());

        assert_eq!(config.page_size.into_inner(), 5);
        assert_eq!(config.quota.map(QuotaLimit::into_inner), Some(2));
    }
}
