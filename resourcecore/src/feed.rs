//! Messages pushed by the provisioning backend.

use resourcecore_types::{ResourceId, SequenceNumber};
use serde::{Deserialize, Serialize};

/// What the provider reports about one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderSignal<U> {
    /// A partial status diff.
    Update {
        /// The diff to fold into the status.
        update: U,
        /// Optional human-readable message recorded with the update.
        #[serde(default)]
        message: Option<String>,
    },
    /// The provider failed in a way it will retry on its own.
    ///
    /// The manager records the kind's failure update instead of returning an
    /// error, so callers see the resource as unavailable.
    TransientFailure {
        /// What went wrong, recorded as the update's status message.
        detail: String,
    },
}

/// A provider signal addressed to one resource and sequence position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderEnvelope<U> {
    /// The addressed resource.
    pub id: ResourceId,
    /// Provider-assigned sequence number.
    pub sequence: SequenceNumber,
    /// The payload.
    pub signal: ProviderSignal<U>,
}

impl<U> ProviderEnvelope<U> {
    /// Wraps a status diff.
    pub const fn update(id: ResourceId, sequence: SequenceNumber, update: U) -> Self {
        Self {
            id,
            sequence,
            signal: ProviderSignal::Update {
                update,
                message: None,
            },
        }
    }

    /// Wraps a transient failure report.
    pub fn failure(id: ResourceId, sequence: SequenceNumber, detail: impl Into<String>) -> Self {
        Self {
            id,
            sequence,
            signal: ProviderSignal::TransientFailure {
                detail: detail.into(),
            },
        }
    }

    /// Attaches a status message to an update signal; failures keep their detail.
    #[must_use]
    pub fn with_message(mut self, text: impl Into<String>) -> Self {
        if let ProviderSignal::Update { message, .. } = &mut self.signal {
            *message = Some(text.into());
        }
        self
    }
}

/// Counts of what a feed run did with the signals it received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeedSummary {
    /// Signals folded into a status.
    pub applied: usize,
    /// Duplicate, reordered or post-deletion signals that were dropped.
    pub stale: usize,
    /// Signals that failed for any other reason.
    pub failed: usize,
}
