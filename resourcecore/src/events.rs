//! Change notifications for subscribed callers.

use futures::stream::{self, Stream};
use resourcecore_types::{ResourceId, ResourceKind, Timestamp, UpdateEntry};
use std::pin::Pin;
use tokio::sync::broadcast::{self, error::RecvError};

/// A committed change to one resource.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceEvent<K: ResourceKind> {
    /// An update was folded into the status.
    Updated {
        /// The changed resource.
        id: ResourceId,
        /// The applied update as recorded.
        entry: UpdateEntry<K::Update>,
        /// The status after the update.
        status: K::Status,
    },
    /// The resource was deleted. No further events follow for it.
    Deleted {
        /// The deleted resource.
        id: ResourceId,
        /// When it was deleted.
        at: Timestamp,
    },
}

impl<K: ResourceKind> ResourceEvent<K> {
    /// The resource this event concerns.
    pub const fn id(&self) -> &ResourceId {
        match self {
            Self::Updated { id, .. } | Self::Deleted { id, .. } => id,
        }
    }

    /// Whether this is the final event for its resource.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Deleted { .. })
    }
}

/// Stream of events for one subscribed resource.
///
/// Ends after the resource's `Deleted` event or when the manager is dropped.
pub type EventStream<K> = Pin<Box<dyn Stream<Item = ResourceEvent<K>> + Send>>;

/// Filters the manager-wide broadcast down to one resource.
pub(crate) fn resource_events<K: ResourceKind>(
    receiver: broadcast::Receiver<ResourceEvent<K>>,
    id: ResourceId,
) -> EventStream<K> {
    Box::pin(stream::unfold(Some(receiver), move |state| {
        let id = id.clone();
        async move {
            let mut receiver = state?;
            loop {
                match receiver.recv().await {
                    Ok(event) if event.id() == &id => {
                        let next = (!event.is_terminal()).then_some(receiver);
                        return Some((event, next));
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(
                            resource_id = %id,
                            skipped,
                            "subscriber lagged, skipping ahead"
                        );
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        }
    }))
}
