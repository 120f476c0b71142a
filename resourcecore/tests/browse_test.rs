//! Cursor-paginated browsing.

mod common;

use common::{alice, bob, manager, member, spec};
use futures::{StreamExt, TryStreamExt};
use resourcecore::{
    BrowseFilter, BrowseRequest, IncludeFlags, Ingress, IngressState, IngressUpdate, PageSize,
    ResourceError, ResourceId, SequenceNumber, SortDirection, Username,
};
use std::collections::HashSet;
use tokio_test::{assert_err, assert_ok};

async fn create_many(manager: &common::TestManager, count: usize) -> Vec<ResourceId> {
    let mut ids = Vec::with_capacity(count);
    for index in 0..count {
        ids.push(
            manager
                .create(&alice(), spec(&format!("app-{index}")))
                .await
                .unwrap(),
        );
    }
    ids
}

fn paged(size: usize) -> BrowseRequest<Ingress> {
    BrowseRequest::default().page_size(PageSize::try_new(size).unwrap())
}

#[tokio::test]
async fn pages_visit_every_resource_exactly_once_newest_first() {
    let manager = manager();
    let created = create_many(&manager, 7).await;

    let mut seen = Vec::new();
    let mut request = paged(3);
    loop {
        let page = assert_ok!(manager.browse(&alice(), request.clone()).await);
        assert!(page.items.len() <= 3);
        seen.extend(page.items.into_iter().map(|resource| resource.id));
        match page.next {
            Some(token) => request = request.after(Some(token)),
            None => break,
        }
    }

    let newest_first: Vec<_> = created.into_iter().rev().collect();
    assert_eq!(seen, newest_first);
}

#[tokio::test]
async fn ascending_order_is_available() {
    let manager = manager();
    let created = create_many(&manager, 4).await;

    let page = manager
        .browse(&alice(), paged(10).direction(SortDirection::Ascending))
        .await
        .unwrap();

    let ids: Vec<_> = page.items.into_iter().map(|resource| resource.id).collect();
    assert_eq!(ids, created);
    assert!(page.next.is_none());
}

#[tokio::test]
async fn exact_final_page_has_no_next_token() {
    let manager = manager();
    create_many(&manager, 4).await;

    let first = manager.browse(&alice(), paged(2)).await.unwrap();
    let second = manager
        .browse(&alice(), paged(2).after(first.next.clone()))
        .await
        .unwrap();

    assert!(first.next.is_some());
    assert_eq!(second.items.len(), 2);
    assert!(second.next.is_none());
}

#[tokio::test]
async fn filters_by_state_owner_and_project() {
    let manager = manager();
    let ready = manager.create(&alice(), spec("ready")).await.unwrap();
    manager.create(&alice(), spec("preparing")).await.unwrap();
    manager.create(&bob(), spec("bobs")).await.unwrap();
    manager
        .create(&member("alice", "p1"), spec("project"))
        .await
        .unwrap();
    manager
        .apply_update(
            &ready,
            SequenceNumber::new(1),
            IngressUpdate::state(IngressState::Ready),
            None,
        )
        .await
        .unwrap();

    let ready_only = manager
        .browse(
            &alice(),
            BrowseRequest::new(BrowseFilter::default().in_state(IngressState::Ready)),
        )
        .await
        .unwrap();
    let all_personal = manager
        .browse(&alice(), BrowseRequest::default())
        .await
        .unwrap();
    let bobs_as_alice = manager
        .browse(
            &alice(),
            BrowseRequest::new(
                BrowseFilter::default().created_by(Username::try_new("bob").unwrap()),
            ),
        )
        .await
        .unwrap();
    let project = manager
        .browse(&member("carol", "p1"), BrowseRequest::default())
        .await
        .unwrap();

    assert_eq!(ready_only.items.len(), 1);
    assert_eq!(ready_only.items[0].id, ready);
    assert_eq!(all_personal.items.len(), 2);
    assert!(bobs_as_alice.items.is_empty());
    assert_eq!(project.items.len(), 1);
}

#[tokio::test]
async fn deleted_resources_are_not_browsed() {
    let manager = manager();
    let ids = create_many(&manager, 3).await;

    manager.delete(&alice(), &ids[1]).await.unwrap();
    let page = manager
        .browse(&alice(), BrowseRequest::default())
        .await
        .unwrap();

    let seen: HashSet<_> = page.items.into_iter().map(|resource| resource.id).collect();
    assert_eq!(seen, HashSet::from([ids[0].clone(), ids[2].clone()]));
}

#[tokio::test]
async fn browse_all_streams_every_page() {
    let manager = manager();
    let created = create_many(&manager, 11).await;

    let request = paged(4).include(IncludeFlags::default().with_updates());
    let all: Vec<_> = manager
        .browse_all(&alice(), request)
        .try_collect()
        .await
        .unwrap();

    assert_eq!(all.len(), created.len());
    assert!(all.iter().all(|resource| resource.updates.is_some()));
}

#[tokio::test]
async fn browse_all_restarts_from_a_token() {
    let manager = manager();
    create_many(&manager, 5).await;

    let first = manager.browse(&alice(), paged(2)).await.unwrap();
    let rest: Vec<_> = manager
        .browse_all(&alice(), paged(2).after(first.next))
        .map(Result::unwrap)
        .collect()
        .await;

    assert_eq!(rest.len(), 3);
    assert!(rest
        .iter()
        .all(|resource| !first.items.iter().any(|seen| seen.id == resource.id)));
}

#[tokio::test]
async fn malformed_tokens_are_rejected() {
    let manager = manager();

    let error = assert_err!(
        manager
            .browse(&alice(), BrowseRequest::default().after(Some("garbage".to_string())))
            .await
    );

    assert!(matches!(error, ResourceError::InvalidPageToken(_)));
}

#[tokio::test]
async fn search_matches_part_of_the_domain() {
    let manager = manager();
    let shop = manager.create(&alice(), spec("webshop")).await.unwrap();
    let _blog = manager.create(&alice(), spec("blog")).await.unwrap();
    let admin = manager.create(&alice(), spec("shop-admin")).await.unwrap();
    let _foreign = manager.create(&bob(), spec("bobs-shop")).await.unwrap();

    let page = assert_ok!(manager.search(&alice(), "SHOP", paged(10)).await);

    let found: Vec<_> = page.items.into_iter().map(|resource| resource.id).collect();
    assert_eq!(found, vec![admin, shop]);
    assert_eq!(page.next, None);
}

#[tokio::test]
async fn search_pages_continue_the_same_query() {
    let manager = manager();
    for index in 0..3 {
        manager
            .create(&alice(), spec(&format!("match-{index}")))
            .await
            .unwrap();
        manager
            .create(&alice(), spec(&format!("other-{index}")))
            .await
            .unwrap();
    }

    let first = manager.search(&alice(), "match", paged(2)).await.unwrap();
    let second = manager
        .search(&alice(), "match", paged(2).after(first.next.clone()))
        .await
        .unwrap();

    assert_eq!(first.items.len(), 2);
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.next, None);
    assert!(first
        .items
        .iter()
        .chain(&second.items)
        .all(|resource| resource.specification.domain.contains("match")));
}

#[tokio::test]
async fn search_combines_with_browse_filters() {
    let manager = manager();
    let ready = manager.create(&alice(), spec("api-ready")).await.unwrap();
    let _preparing = manager.create(&alice(), spec("api-pending")).await.unwrap();
    manager
        .apply_update(
            &ready,
            SequenceNumber::new(1),
            IngressUpdate::state(IngressState::Ready),
            None,
        )
        .await
        .unwrap();

    let request = BrowseRequest::new(BrowseFilter::default().in_state(IngressState::Ready));
    let page = manager.search(&alice(), "api", request).await.unwrap();

    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, ready);
}
