//! Provider updates: ordering, idempotence, failures and the feed runner.

mod common;

use common::{alice, manager, spec};
use proptest::prelude::*;
use resourcecore::{
    IncludeFlags, Ingress, IngressState, IngressStatus, IngressUpdate, ProviderEnvelope,
    ResourceError, ResourceId, ResourceKind, SequenceNumber, StaleReason,
};
use tokio::sync::mpsc;
use tracing_test::traced_test;

fn seq(value: u64) -> SequenceNumber {
    SequenceNumber::new(value)
}

#[tokio::test]
async fn duplicate_sequence_is_stale_and_changes_nothing() {
    let manager = manager();
    let id = manager.create(&alice(), spec("dup")).await.unwrap();
    let update = IngressUpdate::state(IngressState::Ready);

    let first = manager
        .apply_update(&id, seq(1), update.clone(), None)
        .await
        .unwrap();
    let second = manager.apply_update(&id, seq(1), update, None).await;

    assert_eq!(first.state, IngressState::Ready);
    assert_eq!(
        second,
        Err(ResourceError::StaleUpdate {
            kind: "ingresses",
            id: id.clone(),
            sequence: seq(1),
            reason: StaleReason::AlreadyApplied { last: seq(1) },
        })
    );
    let history = manager
        .retrieve(&alice(), &id, IncludeFlags::default().with_updates())
        .await
        .unwrap();
    assert_eq!(history.updates.unwrap().len(), 1);
}

#[tokio::test]
async fn reordered_delivery_is_rejected_and_gaps_are_accepted() {
    let manager = manager();
    let id = manager.create(&alice(), spec("gaps")).await.unwrap();

    manager
        .apply_update(&id, seq(5), IngressUpdate::bind("job-1"), None)
        .await
        .unwrap();
    let late = manager
        .apply_update(&id, seq(3), IngressUpdate::unbind(), None)
        .await;

    assert!(late.unwrap_err().is_stale());
    let ingress = manager
        .retrieve(&alice(), &id, IncludeFlags::default())
        .await
        .unwrap();
    assert_eq!(ingress.status.bound_to.as_deref(), Some("job-1"));
}

#[tokio::test]
#[traced_test]
async fn updates_after_delete_are_stale_and_logged() {
    let manager = manager();
    let id = manager.create(&alice(), spec("gone")).await.unwrap();
    manager.delete(&alice(), &id).await.unwrap();

    let error = manager
        .apply_update(&id, seq(1), IngressUpdate::state(IngressState::Ready), None)
        .await
        .unwrap_err();

    assert_eq!(
        error,
        ResourceError::StaleUpdate {
            kind: "ingresses",
            id,
            sequence: seq(1),
            reason: StaleReason::Deleted,
        }
    );
    assert!(logs_contain("discarding stale update"));
    assert!(logs_contain("resource has been deleted"));
}

#[tokio::test]
async fn updates_for_unknown_resources_are_not_found() {
    let manager = manager();

    let error = manager
        .apply_update(
            &ResourceId::generate(),
            seq(1),
            IngressUpdate::state(IngressState::Ready),
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(error, ResourceError::NotFound { .. }));
}

#[tokio::test]
#[traced_test]
async fn transient_failures_become_unavailable_status() {
    let manager = manager();
    let id = manager.create(&alice(), spec("flaky")).await.unwrap();
    manager
        .apply_update(
            &id,
            seq(1),
            IngressUpdate::bind("job-7").with_state(IngressState::Ready),
            None,
        )
        .await
        .unwrap();

    let status = manager
        .apply_signal(ProviderEnvelope::failure(id.clone(), seq(2), "gateway timeout"))
        .await
        .unwrap();

    assert_eq!(
        status,
        IngressStatus {
            state: IngressState::Unavailable,
            bound_to: Some("job-7".to_string()),
        }
    );
    let ingress = manager
        .retrieve(&alice(), &id, IncludeFlags::default().with_updates())
        .await
        .unwrap();
    let last = ingress.updates.unwrap().pop().unwrap();
    assert_eq!(last.status_message.as_deref(), Some("gateway timeout"));
    assert!(logs_contain("provider reported a transient failure"));
}

#[tokio::test]
async fn batch_results_are_independent() {
    let manager = manager();
    let id = manager.create(&alice(), spec("batch")).await.unwrap();

    let results = manager
        .apply_updates(vec![
            ProviderEnvelope::update(id.clone(), seq(1), IngressUpdate::state(IngressState::Ready)),
            ProviderEnvelope::update(id.clone(), seq(1), IngressUpdate::bind("dup")),
            ProviderEnvelope::update(ResourceId::generate(), seq(1), IngressUpdate::unbind()),
            ProviderEnvelope::update(id.clone(), seq(2), IngressUpdate::bind("job-2")),
        ])
        .await;

    assert!(results[0].is_ok());
    assert!(results[1].as_ref().unwrap_err().is_stale());
    assert!(matches!(results[2], Err(ResourceError::NotFound { .. })));
    assert_eq!(
        results[3].as_ref().unwrap().bound_to.as_deref(),
        Some("job-2")
    );
}

#[tokio::test]
async fn provider_feed_drains_the_channel() {
    let manager = manager();
    let id = manager.create(&alice(), spec("feed")).await.unwrap();
    let (sender, receiver) = mpsc::channel(8);

    let feed = manager.run_provider_feed(receiver);
    let producer = async move {
        for envelope in [
            ProviderEnvelope::update(id.clone(), seq(1), IngressUpdate::state(IngressState::Ready)),
            ProviderEnvelope::update(id.clone(), seq(1), IngressUpdate::state(IngressState::Ready)),
            ProviderEnvelope::update(ResourceId::generate(), seq(1), IngressUpdate::unbind()),
            ProviderEnvelope::failure(id.clone(), seq(2), "lost route"),
        ] {
            sender.send(envelope).await.unwrap();
        }
    };
    let (summary, ()) = tokio::join!(feed, producer);

    assert_eq!(summary.applied, 2);
    assert_eq!(summary.stale, 1);
    assert_eq!(summary.failed, 1);
}

fn arb_update() -> impl Strategy<Value = IngressUpdate> {
    let state = prop_oneof![
        Just(IngressState::Preparing),
        Just(IngressState::Ready),
        Just(IngressState::Unavailable),
    ];
    (
        proptest::option::of(state),
        any::<bool>(),
        proptest::option::of("job-[a-z]{1,4}"),
    )
        .prop_map(|(state, did_bind, new_binding)| IngressUpdate {
            state,
            did_bind,
            new_binding,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn status_is_fold_of_history_after_every_update(
        updates in proptest::collection::vec(arb_update(), 1..16),
        gaps in proptest::collection::vec(1u64..4, 16),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(async {
            let manager = manager();
            let id = manager.create(&alice(), spec("folded")).await.unwrap();
            let mut sequence = 0;
            let mut applied = Vec::new();

            for (update, gap) in updates.iter().zip(&gaps) {
                sequence += gap;
                let status = manager
                    .apply_update(&id, seq(sequence), update.clone(), None)
                    .await
                    .unwrap();
                applied.push(update.clone());

                prop_assert_eq!(status, Ingress::fold(&applied));
            }
            Ok(())
        })?;
    }
}
