mod common;

use common::{filter_with_limit, ids, seeded_backend, RecordingApi};
use incident_console::error::AppError;
use incident_console::models::{NewIncident, Status};
use incident_console::query::{
    CacheKey, CacheStore, FetchStatus, ListLocation, ListQuery, ViewState,
};
use std::sync::Arc;
use std::time::Duration;

fn shared_query(api: &Arc<RecordingApi>, limit: u32) -> Arc<ListQuery> {
    Arc::new(ListQuery::new(
        api.clone(),
        CacheStore::new(),
        ListLocation::new(filter_with_limit(limit), None),
    ))
}

async fn wait_for_list_calls(api: &RecordingApi, count: usize) {
    while api.list_count() < count {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_new_query_fetches_nothing_until_read() {
    let api = RecordingApi::new(seeded_backend(3));
    let query = shared_query(&api, 2);

    assert_eq!(query.view().state(), ViewState::Idle);
    assert_eq!(api.list_count(), 0);

    let view = query.read().await;
    assert_eq!(view.state(), ViewState::Ready);
    assert_eq!(view.status, FetchStatus::Success);
    assert_eq!(api.list_count(), 1);

    // A second read is served from the cache
    query.read().await;
    assert_eq!(api.list_count(), 1);
}

#[tokio::test]
async fn test_previous_page_shown_while_next_page_loads() {
    let api = RecordingApi::new(seeded_backend(5));
    let query = shared_query(&api, 2);
    query.read().await;

    let gate = api.gate_next_list();
    let pending = tokio::spawn({
        let query = query.clone();
        async move { query.next_page().await }
    });
    wait_for_list_calls(&api, 2).await;

    let loading = query.view();
    assert!(loading.loading);
    assert!(loading.is_placeholder);
    assert_eq!(ids(&loading.items), vec![5, 4]);
    assert_eq!(loading.state(), ViewState::Ready);
    assert!(!loading.can_go_next());
    assert!(!loading.can_go_previous());

    gate.send(()).ok();
    let settled = pending.await.expect("next page task");
    assert!(!settled.loading);
    assert!(!settled.is_placeholder);
    assert_eq!(ids(&settled.items), vec![3, 2]);
}

#[tokio::test]
async fn test_placeholder_never_crosses_filters() {
    let api = RecordingApi::new(seeded_backend(5));
    let query = shared_query(&api, 2);
    query.read().await;

    let gate = api.gate_next_list();
    let pending = tokio::spawn({
        let query = query.clone();
        async move {
            let filter = filter_with_limit(2).with_status(Some(Status::Resolved));
            query.set_filter(filter).await
        }
    });
    wait_for_list_calls(&api, 2).await;

    let loading = query.view();
    assert!(loading.loading);
    assert!(loading.items.is_empty());
    assert_eq!(loading.state(), ViewState::Loading);

    gate.send(()).ok();
    let settled = pending.await.expect("filter task");
    assert_eq!(ids(&settled.items), vec![4, 2]);
}

#[tokio::test]
async fn test_out_of_order_response_is_discarded() {
    let api = RecordingApi::new(seeded_backend(3));
    let query = shared_query(&api, 10);
    query.read().await;

    // The first refresh captures the backend before the new incident exists
    let gate = api.gate_next_list();
    let slow = tokio::spawn({
        let query = query.clone();
        async move { query.refresh().await }
    });
    wait_for_list_calls(&api, 2).await;

    api.backend()
        .insert(NewIncident::new("Late arrival", "edge").into_payload());
    let fast = query.refresh().await;
    assert_eq!(ids(&fast.items), vec![4, 3, 2, 1]);

    gate.send(()).ok();
    slow.await.expect("slow refresh task");

    let view = query.view();
    assert_eq!(ids(&view.items), vec![4, 3, 2, 1]);
    let entry = query.cache().get(&query.key()).expect("entry");
    assert_eq!(entry.request_seq, 3);
    assert_eq!(entry.status, FetchStatus::Success);
}

#[tokio::test]
async fn test_abandoned_filter_response_does_not_replace_view() {
    let api = RecordingApi::new(seeded_backend(4));
    let query = shared_query(&api, 10);

    let gate = api.gate_next_list();
    let first = tokio::spawn({
        let query = query.clone();
        async move {
            query
                .set_filter(filter_with_limit(10).with_status(Some(Status::Open)))
                .await
        }
    });
    wait_for_list_calls(&api, 1).await;

    let resolved = filter_with_limit(10).with_status(Some(Status::Resolved));
    let view = query.set_filter(resolved.clone()).await;
    assert_eq!(ids(&view.items), vec![4, 2]);

    gate.send(()).ok();
    first.await.expect("abandoned filter task");

    let view = query.view();
    assert_eq!(view.filter, resolved);
    assert_eq!(ids(&view.items), vec![4, 2]);

    // The abandoned key still got its own cache entry
    let open_key = CacheKey::list(filter_with_limit(10).with_status(Some(Status::Open)), None);
    assert_eq!(
        query.cache().get(&open_key).map(|entry| entry.status),
        Some(FetchStatus::Success)
    );
}

#[tokio::test]
async fn test_first_load_error_shows_error_state() {
    let api = RecordingApi::new(seeded_backend(3));
    api.fail_next_list(AppError::server(500, Some("database unavailable".to_string())));
    let query = shared_query(&api, 10);

    let view = query.read().await;
    assert_eq!(view.state(), ViewState::Error);
    assert_eq!(view.error.as_deref(), Some("database unavailable"));

    // Retry through refresh
    let view = query.refresh().await;
    assert_eq!(view.state(), ViewState::Ready);
    assert_eq!(view.error, None);
}

#[tokio::test]
async fn test_refresh_error_keeps_previous_items() {
    let api = RecordingApi::new(seeded_backend(3));
    let query = shared_query(&api, 10);
    query.read().await;

    api.fail_next_list(AppError::server(502, None));
    let view = query.refresh().await;

    assert_eq!(view.state(), ViewState::Ready);
    assert_eq!(ids(&view.items), vec![3, 2, 1]);
    assert_eq!(view.error.as_deref(), Some("Request failed"));
}

#[tokio::test]
async fn test_subscribers_see_loading_then_settled() {
    let api = RecordingApi::new(seeded_backend(2));
    let query = shared_query(&api, 10);
    let mut rx = query.subscribe();

    let gate = api.gate_next_list();
    let pending = tokio::spawn({
        let query = query.clone();
        async move { query.read().await }
    });

    rx.changed().await.expect("loading notification");
    assert!(rx.borrow_and_update().loading);

    gate.send(()).ok();
    rx.changed().await.expect("settled notification");
    assert_eq!(ids(&rx.borrow_and_update().items), vec![2, 1]);
    pending.await.expect("read task");
}

#[tokio::test]
async fn test_disposed_query_stops_publishing() {
    let api = RecordingApi::new(seeded_backend(2));
    let query = shared_query(&api, 10);
    let mut rx = query.subscribe();

    let gate = api.gate_next_list();
    let pending = tokio::spawn({
        let query = query.clone();
        async move { query.read().await }
    });
    wait_for_list_calls(&api, 1).await;

    query.dispose();
    let seen = rx.borrow_and_update().clone();
    gate.send(()).ok();
    pending.await.expect("read task");

    assert!(query.is_disposed());
    assert_eq!(*rx.borrow(), seen);
    assert!(!rx.has_changed().unwrap_or(false));

    // Navigation after dispose issues nothing
    query.refresh().await;
    assert_eq!(api.list_count(), 1);
}

#[tokio::test]
async fn test_stale_after_serves_recent_entries_from_cache() {
    let api = RecordingApi::new(seeded_backend(5));
    let query = ListQuery::new(
        api.clone(),
        CacheStore::new(),
        ListLocation::new(filter_with_limit(2), None),
    )
    .with_stale_after(Duration::from_secs(60));

    query.read().await;
    query.next_page().await;
    let back = query.previous_page().await;

    assert_eq!(ids(&back.items), vec![5, 4]);
    assert_eq!(api.list_count(), 2);
}
