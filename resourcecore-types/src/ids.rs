//! Identity and ownership types.
//!
//! All types use smart constructors so that a value, once built, is always
//! valid and never needs re-checking downstream.

use crate::validation::{no_commas, no_separators, valid_identifier};
use chrono::{DateTime, SubsecRound, Utc};
use nutype::nutype;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of one resource instance.
///
/// Values are non-empty, at most 255 characters, and free of glob
/// metacharacters and separators. Identifiers allocated by the manager are
/// UUIDv7 strings, so they sort in creation order.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255, predicate = valid_identifier),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct ResourceId(String);

impl ResourceId {
    /// Allocates a fresh, time-ordered identifier.
    pub fn generate() -> Self {
        Self::try_new(Uuid::now_v7().to_string())
            .expect("a UUID string is always a valid resource id")
    }
}

/// Identifier a provider assigned to a resource it registered itself.
///
/// Unique per provider. Commas are rejected; everything else the provider
/// chooses is kept verbatim apart from surrounding whitespace.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255, predicate = no_commas),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct ProviderGeneratedId(String);

/// Name of the user that created a resource or performs a request.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255, predicate = no_separators),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct Username(String);

/// Identifier of the project a resource belongs to.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255, predicate = no_separators),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct ProjectId(String);

/// One component of a product reference (product id, category or provider).
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255, predicate = no_separators),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct CatalogName(String);

/// Names the product a resource is allocated from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductReference {
    /// Product name within its category.
    pub id: CatalogName,
    /// Product category.
    pub category: CatalogName,
    /// Provider offering the product.
    pub provider: CatalogName,
}

impl ProductReference {
    /// Creates a product reference from already validated parts.
    pub const fn new(id: CatalogName, category: CatalogName, provider: CatalogName) -> Self {
        Self {
            id,
            category,
            provider,
        }
    }

    /// Creates a product reference from raw strings.
    pub fn try_from_parts(
        id: impl Into<String>,
        category: impl Into<String>,
        provider: impl Into<String>,
    ) -> Result<Self, CatalogNameError> {
        Ok(Self::new(
            CatalogName::try_new(id)?,
            CatalogName::try_new(category)?,
            CatalogName::try_new(provider)?,
        ))
    }
}

impl std::fmt::Display for ProductReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.category, self.id, self.provider)
    }
}

/// The scope in which resources are counted and made visible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Workspace {
    /// Resources owned by a project.
    Project(ProjectId),
    /// Resources in a user's personal workspace.
    Personal(Username),
}

impl std::fmt::Display for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Project(project) => write!(f, "project:{project}"),
            Self::Personal(username) => write!(f, "user:{username}"),
        }
    }
}

/// Who created a resource and in which project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceOwner {
    /// The creating user.
    pub created_by: Username,
    /// The owning project; `None` for personal resources.
    pub project: Option<ProjectId>,
}

impl ResourceOwner {
    /// Creates an owner record.
    pub const fn new(created_by: Username, project: Option<ProjectId>) -> Self {
        Self {
            created_by,
            project,
        }
    }

    /// The workspace the resource is accounted to.
    pub fn workspace(&self) -> Workspace {
        match &self.project {
            Some(project) => Workspace::Project(project.clone()),
            None => Workspace::Personal(self.created_by.clone()),
        }
    }
}

/// Provider-assigned position of an update within one resource's history.
///
/// Sequence numbers are strictly increasing per resource. `0` means no update
/// has been applied yet, so the first accepted update carries at least `1`.
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    Into,
    Serialize,
    Deserialize
))]
pub struct SequenceNumber(u64);

impl SequenceNumber {
    /// The sequence number of a resource with no applied updates.
    pub fn initial() -> Self {
        Self::new(0)
    }

    /// Returns the sequence number following this one.
    #[must_use]
    pub fn next(self) -> Self {
        Self::new(self.into_inner().saturating_add(1))
    }
}

/// A point in time, truncated to microsecond precision.
///
/// The truncation keeps timestamps exact when they round-trip through page
/// cursors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a new timestamp from a UTC `DateTime`.
    pub fn new(datetime: DateTime<Utc>) -> Self {
        Self(datetime.trunc_subsecs(6))
    }

    /// Creates a timestamp representing the current moment.
    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    /// Rebuilds a timestamp from microseconds since the Unix epoch.
    pub fn from_micros(micros: i64) -> Option<Self> {
        DateTime::<Utc>::from_timestamp_micros(micros).map(Self)
    }

    /// Microseconds since the Unix epoch.
    pub fn as_micros(&self) -> i64 {
        self.0.timestamp_micros()
    }

    /// Returns the underlying `DateTime`.
    pub const fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(datetime: DateTime<Utc>) -> Self {
        Self::new(datetime)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
