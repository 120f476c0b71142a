//! Append-only update history and the status derived from it.

use crate::ids::{SequenceNumber, Timestamp};
use crate::kind::ResourceKind;
use serde::de::Error as DecodeError;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// One applied update, as recorded in a resource's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateEntry<U> {
    /// Provider-assigned position in the history.
    pub sequence: SequenceNumber,
    /// When the update was applied.
    pub timestamp: Timestamp,
    /// The partial diff.
    pub update: U,
    /// Optional human-readable message from the provider.
    pub status_message: Option<String>,
}

impl<U> UpdateEntry<U> {
    /// Creates an entry stamped with the current time.
    pub fn new(sequence: SequenceNumber, update: U) -> Self {
        Self {
            sequence,
            timestamp: Timestamp::now(),
            update,
            status_message: None,
        }
    }

    /// Attaches a provider status message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.status_message = Some(message.into());
        self
    }
}

/// Returned when an entry does not advance the history's sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("sequence {offered} does not follow last applied sequence {last}")]
pub struct SequenceRegression {
    /// The last applied sequence number.
    pub last: SequenceNumber,
    /// The rejected sequence number.
    pub offered: SequenceNumber,
}

/// The ordered update history of one resource together with its status.
///
/// `record` is the only mutator and folds each entry as it appends it, so
/// `status == K::fold(entries)` holds for every reachable value. Decoding
/// replays the entries; a serialized status is only checked against the
/// replayed one, never trusted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(bound = "")]
pub struct History<K: ResourceKind> {
    entries: Vec<UpdateEntry<K::Update>>,
    status: K::Status,
}

impl<K: ResourceKind> History<K> {
    /// An empty history in the kind's initial status.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            status: K::initial_status(),
        }
    }

    /// Rebuilds a history from previously recorded entries.
    pub fn replay(
        entries: impl IntoIterator<Item = UpdateEntry<K::Update>>,
    ) -> Result<Self, SequenceRegression> {
        entries.into_iter().try_fold(Self::new(), |mut history, entry| {
            let _ = history.record(entry)?;
            Ok(history)
        })
    }

    /// Appends an entry and folds it into the status.
    pub fn record(
        &mut self,
        entry: UpdateEntry<K::Update>,
    ) -> Result<&K::Status, SequenceRegression> {
        let last = self.last_sequence();
        if entry.sequence <= last {
            return Err(SequenceRegression {
                last,
                offered: entry.sequence,
            });
        }

        let status = std::mem::replace(&mut self.status, K::initial_status());
        self.status = K::apply(status, &entry.update);
        self.entries.push(entry);
        Ok(&self.status)
    }

    /// The current status.
    pub const fn status(&self) -> &K::Status {
        &self.status
    }

    /// All recorded entries, oldest first.
    pub fn entries(&self) -> &[UpdateEntry<K::Update>] {
        &self.entries
    }

    /// The sequence number of the newest entry, or `0` when empty.
    pub fn last_sequence(&self) -> SequenceNumber {
        self.entries
            .last()
            .map_or_else(SequenceNumber::initial, |entry| entry.sequence)
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no update has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recomputes the status from scratch and compares it with the maintained one.
    pub fn is_consistent(&self) -> bool {
        K::fold(self.entries.iter().map(|entry| &entry.update)) == self.status
    }
}

impl<K: ResourceKind> Default for History<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Wire form of a history as it is decoded.
#[derive(Deserialize)]
#[serde(bound = "")]
struct RecordedHistory<K: ResourceKind> {
    entries: Vec<UpdateEntry<K::Update>>,
    #[serde(default)]
    status: Option<K::Status>,
}

impl<'de, K: ResourceKind> Deserialize<'de> for History<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let recorded = RecordedHistory::<K>::deserialize(deserializer)?;
        let history = Self::replay(recorded.entries).map_err(DecodeError::custom)?;
        if recorded
            .status
            .is_some_and(|status| &status != history.status())
        {
            return Err(DecodeError::custom(
                "recorded status is not the fold of the recorded updates",
            ));
        }
        Ok(history)
    }
}
