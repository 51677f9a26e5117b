// Integration tests for the list controller state machine: cache
// behavior, request dedup, stale-while-error, superseded responses,
// selection, and preference persistence.
#![allow(clippy::unwrap_used)]

mod support;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;

use adminkit_core::{
    CoreError, DataProvider, DataWriter, Filter, ListConfig, ListController, ListDefaults,
    LoadPhase, MemoryPreferences, Record, RecordId, Sort, Store,
};
use support::StubProvider;

// ── Helpers ─────────────────────────────────────────────────────────

fn ids(ns: &[i64]) -> Vec<RecordId> {
    ns.iter().map(|n| RecordId::Int(*n)).collect()
}

fn new_controller(
    store: &Arc<Store>,
    provider: &Arc<StubProvider>,
    prefs: &Arc<MemoryPreferences>,
    per_page: u64,
) -> ListController {
    let config = ListConfig::new("books").with_defaults(ListDefaults {
        per_page,
        ..ListDefaults::default()
    });
    ListController::new(
        Arc::clone(store),
        Arc::clone(provider) as Arc<dyn DataProvider>,
        Arc::clone(prefs) as Arc<dyn adminkit_core::PreferenceStore>,
        config,
    )
    .unwrap()
}

fn setup(count: i64, per_page: u64) -> (Arc<Store>, Arc<StubProvider>, Arc<MemoryPreferences>, ListController) {
    let store = Arc::new(Store::new());
    let provider = StubProvider::books(count);
    let prefs = Arc::new(MemoryPreferences::new());
    let controller = new_controller(&store, &provider, &prefs, per_page);
    (store, provider, prefs, controller)
}

// ── End-to-end ──────────────────────────────────────────────────────

#[tokio::test]
async fn first_page_end_to_end() {
    let (_store, provider, _prefs, controller) = setup(5, 2);

    controller.load().await;

    let state = controller.state();
    assert_eq!(state.phase, LoadPhase::Success);
    assert!(!state.loading());
    assert_eq!(state.ids.len(), 2);
    assert_eq!(state.data.len(), 2);
    assert_eq!(state.total, 5);
    assert_eq!(state.total_pages(), 3);
    assert!(state.has_next_page());
    assert!(!state.has_previous_page());

    let query = provider.last_list_query.lock().unwrap().clone().unwrap();
    assert_eq!(query.pagination.page, 1);
    assert_eq!(query.pagination.per_page, 2);
    assert_eq!(provider.list_calls(), 1);
}

#[tokio::test]
async fn fresh_cache_skips_the_gateway() {
    let (store, provider, prefs, first) = setup(5, 2);
    first.load().await;
    assert_eq!(provider.list_calls(), 1);

    // Same key, second controller: served straight from the store.
    let second = new_controller(&store, &provider, &prefs, 2);
    second.load().await;
    assert_eq!(provider.list_calls(), 1);
    assert_eq!(second.state().ids, first.state().ids);
    assert_eq!(second.state().phase, LoadPhase::Success);

    // Explicit refresh bypasses the fresh cache.
    second.refresh().await;
    assert_eq!(provider.list_calls(), 2);
}

// ── Dedup ───────────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_identical_queries_share_one_gateway_call() {
    let (store, provider, prefs, a) = setup(5, 2);
    let b = new_controller(&store, &provider, &prefs, 2);
    let gate = provider.gate_page(1);

    let ta = tokio::spawn({
        let a = a.clone();
        async move { a.load().await }
    });
    let tb = tokio::spawn({
        let b = b.clone();
        async move { b.load().await }
    });
    tokio::task::yield_now().await;

    gate.notify_one();
    ta.await.unwrap();
    tb.await.unwrap();

    assert_eq!(provider.list_calls(), 1);
    assert_eq!(a.state().phase, LoadPhase::Success);
    assert_eq!(b.state().phase, LoadPhase::Success);
    assert_eq!(a.state().ids, b.state().ids);
}

// ── Stale-while-error ───────────────────────────────────────────────

#[tokio::test]
async fn failed_page_change_keeps_last_good_data() {
    let (_store, provider, _prefs, controller) = setup(5, 3);
    controller.load().await;
    assert_eq!(controller.state().ids, ids(&[1, 2, 3]));

    provider.set_failing(true);
    controller.set_page(2).await;

    let state = controller.state();
    assert_eq!(state.phase, LoadPhase::Error);
    assert!(state.error.is_some());
    assert_eq!(state.ids, ids(&[1, 2, 3]), "previous page stays visible");
    assert_eq!(state.total, 5);
    assert_eq!(state.page, 2);

    // Recovery: the next successful fetch replaces data and clears the error.
    provider.set_failing(false);
    controller.refresh().await;
    let state = controller.state();
    assert_eq!(state.phase, LoadPhase::Success);
    assert!(state.error.is_none());
    assert_eq!(state.ids, ids(&[4, 5]));
}

// ── Superseded responses ────────────────────────────────────────────

#[tokio::test]
async fn superseded_response_is_discarded() {
    let (store, provider, _prefs, controller) = setup(5, 2);
    let gate = provider.gate_page(1);

    // Key K1 (page 1) starts fetching and blocks on the gate.
    let pending = tokio::spawn({
        let c = controller.clone();
        async move { c.load().await }
    });
    tokio::task::yield_now().await;

    // Key changes to K2 (page 2) and settles while K1 is still pending.
    controller.set_page(2).await;
    let before = controller.state();
    assert_eq!(before.phase, LoadPhase::Success);
    assert_eq!(before.ids, ids(&[3, 4]));
    let k2 = controller.current_key();
    let k2_cached = store.query_result("books", &k2).unwrap();

    // K1 finally settles; its response must not clobber K2 state.
    gate.notify_one();
    pending.await.unwrap();

    let after = controller.state();
    assert_eq!(after.page, 2);
    assert_eq!(after.ids, before.ids);
    assert_eq!(after.phase, LoadPhase::Success);
    let k2_after = store.query_result("books", &k2).unwrap();
    assert_eq!(k2_after.ids, k2_cached.ids);
    assert_eq!(k2_after.total, k2_cached.total);
}

// ── Selection ───────────────────────────────────────────────────────

#[tokio::test]
async fn selection_is_independent_from_pagination() {
    let (_store, _provider, _prefs, controller) = setup(5, 3);
    controller.load().await;

    controller.select_all();
    assert_eq!(controller.selected_ids(), ids(&[1, 2, 3]));

    controller.set_page(2).await;
    assert_eq!(controller.state().ids, ids(&[4, 5]));
    // Ids from page 1 are still selected.
    assert_eq!(controller.selected_ids(), ids(&[1, 2, 3]));

    controller.select_all();
    assert_eq!(controller.selected_ids(), ids(&[1, 2, 3, 4, 5]));

    controller.toggle(RecordId::Int(2));
    controller.unselect(&ids(&[4]));
    assert_eq!(controller.selected_ids(), ids(&[1, 3, 5]));

    controller.clear_selection();
    assert!(controller.selected_ids().is_empty());
}

// ── Subscriptions ───────────────────────────────────────────────────

#[tokio::test]
async fn subscribers_observe_state_transitions() {
    let (_store, _provider, _prefs, controller) = setup(5, 2);
    let mut stream = controller.subscribe();
    assert_eq!(stream.current().phase, LoadPhase::Idle);

    controller.load().await;
    let state = stream.changed().await.unwrap();
    assert_eq!(state.phase, LoadPhase::Success);

    controller.toggle(RecordId::Int(1));
    let state = stream.changed().await.unwrap();
    assert_eq!(state.selected_ids, ids(&[1]));
}

// ── Preferences ─────────────────────────────────────────────────────

#[tokio::test]
async fn sort_and_per_page_persist_across_controllers() {
    let (store, provider, prefs, first) = setup(5, 2);
    first.set_sort(Sort::desc("title")).await.unwrap();
    first.set_per_page(4).await;

    let second = new_controller(&store, &provider, &prefs, 2);
    let state = second.state();
    assert_eq!(state.sort, Some(Sort::desc("title")));
    assert_eq!(state.per_page, 4);
}

// ── Configuration errors ────────────────────────────────────────────

#[test]
fn default_sort_outside_whitelist_fails_construction() {
    let store = Arc::new(Store::new());
    let provider = StubProvider::books(1);
    let prefs = Arc::new(MemoryPreferences::new());
    let config = ListConfig::new("books")
        .with_defaults(ListDefaults {
            sort: Some(Sort::asc("isbn")),
            ..ListDefaults::default()
        })
        .with_sortable_fields(vec!["title".into()]);

    let result = ListController::new(
        store,
        provider as Arc<dyn DataProvider>,
        prefs as Arc<dyn adminkit_core::PreferenceStore>,
        config,
    );
    assert!(matches!(result, Err(CoreError::Config { .. })));
}

#[tokio::test]
async fn invalid_sort_field_fails_fast_without_fetching() {
    let store = Arc::new(Store::new());
    let provider = StubProvider::books(3);
    let prefs = Arc::new(MemoryPreferences::new());
    let config = ListConfig::new("books").with_sortable_fields(vec!["title".into()]);
    let controller = ListController::new(
        Arc::clone(&store),
        Arc::clone(&provider) as Arc<dyn DataProvider>,
        prefs as Arc<dyn adminkit_core::PreferenceStore>,
        config,
    )
    .unwrap();
    controller.load().await;
    assert_eq!(provider.list_calls(), 1);

    let err = controller.set_sort(Sort::asc("isbn")).await.unwrap_err();
    assert!(matches!(err, CoreError::Config { .. }));
    assert_eq!(provider.list_calls(), 1, "no fetch for a rejected sort");
}

// ── Mutations ───────────────────────────────────────────────────────

#[tokio::test]
async fn mutations_invalidate_cached_lists() {
    let (store, provider, _prefs, controller) = setup(2, 10);
    controller.load().await;
    assert_eq!(controller.state().total, 2);
    assert_eq!(provider.list_calls(), 1);

    let writer = DataWriter::new(
        Arc::clone(&store),
        Arc::clone(&provider) as Arc<dyn DataProvider>,
    );
    let created = writer
        .create(
            "books",
            Record::from_value(json!({"title": "book 3"})).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(created.id(), Some(RecordId::Int(3)));

    // The cached query is stale now: re-evaluating the same key refetches.
    controller.load().await;
    assert_eq!(provider.list_calls(), 2);
    assert_eq!(controller.state().total, 3);

    writer
        .update(
            "books",
            &RecordId::Int(1),
            Record::from_value(json!({"title": "book 1 (revised)"})).unwrap(),
        )
        .await
        .unwrap();
    let revised = store.record("books", &RecordId::Int(1)).unwrap();
    assert_eq!(revised.get("title"), Some(&json!("book 1 (revised)")));

    writer.delete("books", &RecordId::Int(3)).await.unwrap();
    controller.load().await;
    assert_eq!(provider.list_calls(), 3);
    assert_eq!(controller.state().total, 2);
}

// ── Filters ─────────────────────────────────────────────────────────

#[tokio::test]
async fn filter_change_recomputes_key_and_refetches() {
    let (_store, provider, _prefs, controller) = setup(5, 2);
    controller.load().await;
    assert_eq!(provider.list_calls(), 1);

    controller
        .set_filter(Filter::new().with("author", json!("Herbert")))
        .await;
    assert_eq!(provider.list_calls(), 2);

    let query = provider.last_list_query.lock().unwrap().clone().unwrap();
    assert_eq!(query.filter.get("author"), Some(&json!("Herbert")));
    // Back to page 1 semantics: the filter is part of the key, so the
    // identical filter again is a no-op.
    controller
        .set_filter(Filter::new().with("author", json!("Herbert")))
        .await;
    assert_eq!(provider.list_calls(), 2);
}
