//! The ingress resource kind: a public network entry point bound to a domain.

use crate::domain::{check_namespace, validate_hostname};
use resourcecore_types::{ProductReference, ProductSupport, ResourceKind, ValidationError};
use serde::{Deserialize, Serialize};

/// Lifecycle state of an ingress.
///
/// `Preparing` is initial. The provider moves it to `Ready`, and any state may
/// move to `Unavailable` when the provider reports a failure. Deletion is not a
/// state; deleted resources are tombstoned instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngressState {
    /// The provider is still allocating the ingress.
    #[default]
    Preparing,
    /// The ingress is routable.
    Ready,
    /// The provider reported that the ingress cannot serve traffic.
    Unavailable,
}

/// User-supplied desired state of an ingress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressSpecification {
    /// The requested public hostname.
    pub domain: String,
    /// The product the ingress is allocated from.
    pub product: ProductReference,
}

impl IngressSpecification {
    /// Creates a specification.
    pub fn new(domain: impl Into<String>, product: ProductReference) -> Self {
        Self {
            domain: domain.into(),
            product,
        }
    }
}

/// Observed state of an ingress, derived from its update history.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressStatus {
    /// Current lifecycle state.
    pub state: IngressState,
    /// The workload currently bound to this ingress.
    pub bound_to: Option<String>,
}

impl IngressStatus {
    /// Folds one update into this status.
    ///
    /// A present `state` replaces the current one. When `did_bind` is set the
    /// binding is replaced by `new_binding`, so binding while bound rebinds
    /// and unbinding while unbound changes nothing.
    #[must_use]
    pub fn apply(self, update: &IngressUpdate) -> Self {
        Self {
            state: update.state.unwrap_or(self.state),
            bound_to: if update.did_bind {
                update.new_binding.clone()
            } else {
                self.bound_to
            },
        }
    }
}

/// Partial diff reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressUpdate {
    /// New lifecycle state, if it changed.
    pub state: Option<IngressState>,
    /// Whether the binding changed.
    pub did_bind: bool,
    /// The new binding when `did_bind` is set; `None` means unbound.
    pub new_binding: Option<String>,
}

impl IngressUpdate {
    /// An update that only changes the lifecycle state.
    pub fn state(state: IngressState) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }

    /// An update that binds the ingress to a workload.
    pub fn bind(workload: impl Into<String>) -> Self {
        Self {
            state: None,
            did_bind: true,
            new_binding: Some(workload.into()),
        }
    }

    /// An update that removes the binding.
    pub fn unbind() -> Self {
        Self {
            state: None,
            did_bind: true,
            new_binding: None,
        }
    }

    /// Also changes the lifecycle state.
    #[must_use]
    pub fn with_state(mut self, state: IngressState) -> Self {
        self.state = Some(state);
        self
    }
}

const fn enforce_by_default() -> bool {
    true
}

/// What a provider advertises about one ingress product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressSupport {
    /// The product this descriptor applies to.
    pub product: ProductReference,
    /// Required start of every domain, e.g. `"app-"`.
    pub domain_prefix: String,
    /// Required end of every domain, e.g. `".cloud.example.com"`.
    pub domain_suffix: String,
    /// Whether domains must lie inside the prefix/suffix namespace.
    #[serde(default = "enforce_by_default")]
    pub enforce_namespace: bool,
    /// Whether a bound ingress must be unbound before deletion.
    #[serde(default)]
    pub requires_unbind_before_delete: bool,
}

impl IngressSupport {
    /// A descriptor enforcing the given namespace and allowing deletion while bound.
    pub fn new(
        product: ProductReference,
        domain_prefix: impl Into<String>,
        domain_suffix: impl Into<String>,
    ) -> Self {
        Self {
            product,
            domain_prefix: domain_prefix.into(),
            domain_suffix: domain_suffix.into(),
            enforce_namespace: true,
            requires_unbind_before_delete: false,
        }
    }

    /// Turns namespace enforcement on or off.
    #[must_use]
    pub fn with_namespace_enforcement(mut self, enforce: bool) -> Self {
        self.enforce_namespace = enforce;
        self
    }

    /// Requires bound ingresses to be unbound before deletion.
    #[must_use]
    pub fn with_unbind_before_delete(mut self, required: bool) -> Self {
        self.requires_unbind_before_delete = required;
        self
    }
}

impl ProductSupport for IngressSupport {
    fn product(&self) -> &ProductReference {
        &self.product
    }

    fn requires_unbind_before_delete(&self) -> bool {
        self.requires_unbind_before_delete
    }
}

/// Resource kind descriptor for ingresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ingress;

impl ResourceKind for Ingress {
    const NAME: &'static str = "ingresses";

    type Specification = IngressSpecification;
    type Status = IngressStatus;
    type Update = IngressUpdate;
    type Support = IngressSupport;
    type State = IngressState;

    fn product(spec: &IngressSpecification) -> &ProductReference {
        &spec.product
    }

    fn validate(
        spec: &IngressSpecification,
        support: &IngressSupport,
    ) -> Result<(), ValidationError> {
        if spec.product != support.product {
            return Err(ValidationError::UnsupportedProduct {
                product: spec.product.clone(),
            });
        }

        validate_hostname(&spec.domain)?;

        if support.enforce_namespace {
            check_namespace(&spec.domain, &support.domain_prefix, &support.domain_suffix)?;
        }

        Ok(())
    }

    fn initial_status() -> IngressStatus {
        IngressStatus::default()
    }

    fn apply(status: IngressStatus, update: &IngressUpdate) -> IngressStatus {
        status.apply(update)
    }

    fn state(status: &IngressStatus) -> IngressState {
        status.state
    }

    fn failure_update() -> IngressUpdate {
        IngressUpdate::state(IngressState::Unavailable)
    }

    fn is_bound(status: &IngressStatus) -> bool {
        status.bound_to.is_some()
    }

    fn unique_key(spec: &IngressSpecification) -> Option<String> {
        Some(spec.domain.to_ascii_lowercase())
    }

    /// Case-insensitive substring match on the domain.
    fn matches_query(spec: &IngressSpecification, query: &str) -> bool {
        spec.domain
            .to_ascii_lowercase()
            .contains(&query.trim().to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn product() -> ProductReference {
        ProductReference::try_from_parts("u1-publiclink", "u1-publiclink", "ucloud").unwrap()
    }

    fn support() -> IngressSupport {
        IngressSupport::new(product(), "prefix.", ".suffix.com")
    }

    fn bound(workload: &str) -> IngressStatus {
        IngressStatus {
            state: IngressState::Ready,
            bound_to: Some(workload.to_string()),
        }
    }

    fn arb_state() -> impl Strategy<Value = IngressState> {
        prop_oneof![
            Just(IngressState::Preparing),
            Just(IngressState::Ready),
            Just(IngressState::Unavailable),
        ]
    }

    fn arb_update() -> impl Strategy<Value = IngressUpdate> {
        (
            proptest::option::of(arb_state()),
            any::<bool>(),
            proptest::option::of("job-[0-9]{1,3}"),
        )
            .prop_map(|(state, did_bind, new_binding)| IngressUpdate {
                state,
                did_bind,
                new_binding,
            })
    }

    proptest! {
        #[test]
        fn empty_update_leaves_status_unchanged(
            state in arb_state(),
            binding in proptest::option::of("job-[0-9]{1,3}"),
        ) {
            let status = IngressStatus { state, bound_to: binding };
            prop_assert_eq!(status.clone().apply(&IngressUpdate::default()), status);
        }

        #[test]
        fn last_state_in_history_wins(updates in proptest::collection::vec(arb_update(), 1..32)) {
            let folded = Ingress::fold(&updates);
            let expected = updates
                .iter()
                .rev()
                .find_map(|update| update.state)
                .unwrap_or_default();
            prop_assert_eq!(folded.state, expected);
        }
    }

    #[test]
    fn unbind_when_unbound_is_a_no_op() {
        let status = IngressStatus::default();

        assert_eq!(status.clone().apply(&IngressUpdate::unbind()), status);
    }

    #[test]
    fn rebind_replaces_previous_binding() {
        let status = bound("A").apply(&IngressUpdate::bind("B"));

        assert_eq!(status.bound_to.as_deref(), Some("B"));
        assert_eq!(status.state, IngressState::Ready);
    }

    #[test]
    fn failure_update_marks_unavailable_and_keeps_binding() {
        let status = bound("A").apply(&Ingress::failure_update());

        assert_eq!(
            status,
            IngressStatus {
                state: IngressState::Unavailable,
                bound_to: Some("A".to_string()),
            }
        );
    }

    #[test]
    fn validate_accepts_domain_in_namespace() {
        let spec = IngressSpecification::new("prefix.myapp.suffix.com", product());

        assert!(Ingress::validate(&spec, &support()).is_ok());
    }

    #[test]
    fn validate_rejects_invalid_and_foreign_domains() {
        let bad = IngressSpecification::new("bad_domain!", product());
        let foreign = IngressSpecification::new("other.com", product());

        assert!(matches!(
            Ingress::validate(&bad, &support()),
            Err(ValidationError::InvalidDomain { .. })
        ));
        assert!(matches!(
            Ingress::validate(&foreign, &support()),
            Err(ValidationError::DomainNotInNamespace { .. })
        ));
    }

    #[test]
    fn validate_skips_namespace_when_not_enforced() {
        let spec = IngressSpecification::new("other.com", product());
        let relaxed = support().with_namespace_enforcement(false);

        assert!(Ingress::validate(&spec, &relaxed).is_ok());
    }

    #[test]
    fn validate_rejects_mismatched_product() {
        let other = ProductReference::try_from_parts("other", "u1-publiclink", "ucloud").unwrap();
        let spec = IngressSpecification::new("prefix.myapp.suffix.com", other.clone());

        assert_eq!(
            Ingress::validate(&spec, &support()),
            Err(ValidationError::UnsupportedProduct { product: other })
        );
    }

    #[test]
    fn queries_match_part_of_the_domain_ignoring_case() {
        let spec = IngressSpecification::new("prefix.MyApp.suffix.com", product());

        assert!(Ingress::matches_query(&spec, "myapp"));
        assert!(Ingress::matches_query(&spec, " SUFFIX.com "));
        assert!(Ingress::matches_query(&spec, ""));
        assert!(!Ingress::matches_query(&spec, "other"));
    }

    #[test]
    fn unique_key_ignores_case() {
        let upper = IngressSpecification::new("Prefix.MyApp.Suffix.com", product());

        assert_eq!(
            Ingress::unique_key(&upper).as_deref(),
            Some("prefix.myapp.suffix.com")
        );
    }

    #[test]
    fn support_defaults_apply_when_deserializing() {
        let json = serde_json::json!({
            "product": product(),
            "domainPrefix": "app-",
            "domainSuffix": ".cloud.example.com",
        });

        let support: IngressSupport = serde_json::from_value(json).unwrap();

        assert!(support.enforce_namespace);
        assert!(!support.requires_unbind_before_delete);
    }

    #[test]
    fn state_serializes_in_screaming_case() {
        assert_eq!(
            serde_json::to_string(&IngressState::Unavailable).unwrap(),
            "\"UNAVAILABLE\""
        );
    }
}
