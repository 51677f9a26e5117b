// ── List controller ──
//
// Orchestrates one live list: cache-key computation, cache lookup,
// conditional fetch through the gateway, reconciliation into the shared
// store, and broadcast of the derived view state. State machine:
// Idle -> Loading -> {Success, Error}, re-entering Loading whenever the
// computed QueryKey changes or an explicit refresh is invoked.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, warn};

use super::selection::Selection;
use crate::error::{CoreError, StateError};
use crate::params::{
    Filter, ListDefaults, ListParams, ParamsInput, QueryKey, Sort, StoredParams, compute_params,
    query_key,
};
use crate::preferences::{PreferenceStore, load_stored_params, save_stored_params};
use crate::provider::{DataProvider, ListQuery, Pagination};
use crate::record::{Record, RecordId};
use crate::store::inflight::FetchedList;
use crate::store::{QueryResult, Store};
use crate::stream::StateStream;

// ── Configuration ───────────────────────────────────────────────────

/// Static configuration of one list controller instance.
#[derive(Debug, Clone)]
pub struct ListConfig {
    /// Resource the list binds to.
    pub resource: String,
    /// Fallback parameters, including the permanent base filter.
    pub defaults: ListDefaults,
    /// When set, sorting is restricted to these fields; anything else is
    /// a configuration error before any fetch is attempted.
    pub sortable_fields: Option<Vec<String>>,
    /// Remember sort and page size through the preference store.
    pub sync_with_preferences: bool,
}

impl ListConfig {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            defaults: ListDefaults::default(),
            sortable_fields: None,
            sync_with_preferences: true,
        }
    }

    pub fn with_defaults(mut self, defaults: ListDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_sortable_fields(mut self, fields: Vec<String>) -> Self {
        self.sortable_fields = Some(fields);
        self
    }

    pub fn without_preference_sync(mut self) -> Self {
        self.sync_with_preferences = false;
        self
    }
}

// ── Derived state ───────────────────────────────────────────────────

/// Where the controller currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    /// Mounted, nothing asked yet.
    Idle,
    /// A gateway request is pending. Previous ids/records stay visible.
    Loading,
    Success,
    /// The last fetch failed. Previous ids/records stay visible
    /// alongside the error (stale-while-error).
    Error,
}

/// Snapshot of everything a presentational consumer needs to render a
/// list. Cheap to clone; broadcast on every transition.
#[derive(Debug, Clone)]
pub struct ListState {
    /// Ordered ids of the current page.
    pub ids: Vec<RecordId>,
    /// Records for the current page, in id order. Ids missing from the
    /// store (never the case after a successful fetch) are skipped.
    pub data: Vec<Arc<Record>>,
    /// Total records across all pages.
    pub total: u64,
    pub phase: LoadPhase,
    pub error: Option<StateError>,
    pub page: u64,
    pub per_page: u64,
    pub sort: Option<Sort>,
    pub filter: Filter,
    /// Selected ids in selection order.
    pub selected_ids: Vec<RecordId>,
}

impl ListState {
    pub fn loading(&self) -> bool {
        self.phase == LoadPhase::Loading
    }

    pub fn record(&self, id: &RecordId) -> Option<&Arc<Record>> {
        self.data
            .iter()
            .find(|record| record.id().as_ref() == Some(id))
    }

    pub fn total_pages(&self) -> u64 {
        self.total.div_ceil(self.per_page.max(1))
    }

    pub fn has_previous_page(&self) -> bool {
        self.page > 1
    }

    pub fn has_next_page(&self) -> bool {
        self.page < self.total_pages()
    }
}

// ── Controller ──────────────────────────────────────────────────────

/// Binds a resource to a live, paginated, sorted, filtered, selectable
/// collection of records.
///
/// Cheaply cloneable via `Arc`; every clone drives the same list.
/// Concurrent controllers that compute the same QueryKey share one
/// gateway call through the store's in-flight registry.
#[derive(Clone)]
pub struct ListController {
    inner: Arc<ListInner>,
}

struct ListInner {
    store: Arc<Store>,
    provider: Arc<dyn DataProvider>,
    prefs: Arc<dyn PreferenceStore>,
    config: ListConfig,
    cell: Mutex<Cell>,
    state_tx: watch::Sender<ListState>,
}

/// Mutable controller state. The mutex is never held across an await.
struct Cell {
    input: ParamsInput,
    params: ListParams,
    key: QueryKey,
    phase: LoadPhase,
    ids: Vec<RecordId>,
    data: Vec<Arc<Record>>,
    total: u64,
    error: Option<StateError>,
    selection: Selection,
}

fn snapshot(cell: &Cell) -> ListState {
    ListState {
        ids: cell.ids.clone(),
        data: cell.data.clone(),
        total: cell.total,
        phase: cell.phase,
        error: cell.error.clone(),
        page: cell.params.page,
        per_page: cell.params.per_page,
        sort: cell.params.sort.clone(),
        filter: cell.params.filter.clone(),
        selected_ids: cell.selection.ids(),
    }
}

fn collect_data(store: &Store, resource: &str, ids: &[RecordId]) -> Vec<Arc<Record>> {
    store.get_many(resource, ids).into_iter().flatten().collect()
}

impl ListController {
    /// Create a controller. Fails fast on configuration problems
    /// (empty resource, default sort outside the sortable whitelist)
    /// before any fetch is attempted.
    pub fn new(
        store: Arc<Store>,
        provider: Arc<dyn DataProvider>,
        prefs: Arc<dyn PreferenceStore>,
        config: ListConfig,
    ) -> Result<Self, CoreError> {
        if config.resource.is_empty() {
            return Err(CoreError::Config {
                message: "list resource name is empty".into(),
            });
        }
        if let (Some(allowed), Some(sort)) = (&config.sortable_fields, &config.defaults.sort) {
            if !allowed.contains(&sort.field) {
                return Err(CoreError::Config {
                    message: format!("default sort field '{}' is not sortable", sort.field),
                });
            }
        }

        let mut stored = if config.sync_with_preferences {
            load_stored_params(prefs.as_ref(), &config.resource)
        } else {
            StoredParams::default()
        };
        // A remembered sort may reference a field that is no longer
        // sortable; drop it rather than failing construction.
        if let (Some(allowed), Some(sort)) = (&config.sortable_fields, &stored.sort) {
            if !allowed.contains(&sort.field) {
                debug!(resource = %config.resource, field = %sort.field,
                    "ignoring remembered sort on unsortable field");
                stored.sort = None;
            }
        }

        let input = ParamsInput::default();
        let params = compute_params(&input, &stored, &config.defaults);
        let key = query_key(&config.resource, &params);
        let cell = Cell {
            input,
            params,
            key,
            phase: LoadPhase::Idle,
            ids: Vec::new(),
            data: Vec::new(),
            total: 0,
            error: None,
            selection: Selection::new(),
        };
        let (state_tx, _) = watch::channel(snapshot(&cell));

        Ok(Self {
            inner: Arc::new(ListInner {
                store,
                provider,
                prefs,
                config,
                cell: Mutex::new(cell),
                state_tx,
            }),
        })
    }

    pub fn resource(&self) -> &str {
        &self.inner.config.resource
    }

    /// Current derived state snapshot.
    pub fn state(&self) -> ListState {
        self.inner.state_tx.borrow().clone()
    }

    /// Subscribe to derived-state broadcasts.
    pub fn subscribe(&self) -> StateStream<ListState> {
        StateStream::new(self.inner.state_tx.subscribe())
    }

    /// The QueryKey the controller is currently bound to.
    pub fn current_key(&self) -> QueryKey {
        self.cell().key.clone()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Evaluate the current key: serve from cache when fresh, fetch
    /// otherwise. Call once after construction ("mount").
    pub async fn load(&self) {
        self.fetch_current().await;
    }

    /// Force a refetch of the current key, bypassing the fresh cache.
    pub async fn refresh(&self) {
        let key = self.cell().key.clone();
        self.inner
            .store
            .invalidate_query(&self.inner.config.resource, &key);
        debug!(resource = %self.inner.config.resource, key = %key, "explicit refresh");
        self.fetch_current().await;
    }

    // ── Parameter setters ────────────────────────────────────────────
    //
    // Each setter updates the underlying params source (and the stored
    // preference where applicable), recomputes the QueryKey, and
    // re-enters Loading when the key changed.

    pub async fn set_page(&self, page: u64) {
        self.apply(|input| input.page = Some(page.max(1))).await;
    }

    /// Change the page size. Jumps back to the first page, like every
    /// setter that reshapes the result window.
    pub async fn set_per_page(&self, per_page: u64) {
        let per_page = per_page.max(1);
        self.persist(|stored| stored.per_page = Some(per_page));
        self.apply(|input| {
            input.per_page = Some(per_page);
            input.page = Some(1);
        })
        .await;
    }

    /// Change the sort criterion. Fails fast when the field is outside
    /// the configured sortable whitelist; no fetch is attempted.
    pub async fn set_sort(&self, sort: Sort) -> Result<(), CoreError> {
        if let Some(allowed) = &self.inner.config.sortable_fields {
            if !allowed.contains(&sort.field) {
                return Err(CoreError::Config {
                    message: format!("sort field '{}' is not sortable", sort.field),
                });
            }
        }
        self.persist(|stored| stored.sort = Some(sort.clone()));
        self.apply(move |input| {
            input.sort = Some(sort);
            input.page = Some(1);
        })
        .await;
        Ok(())
    }

    /// Replace the volatile filter (deep-merged over the permanent base
    /// filter at derivation time) and jump back to the first page.
    pub async fn set_filter(&self, filter: Filter) {
        self.apply(move |input| {
            input.filter = filter;
            input.page = Some(1);
        })
        .await;
    }

    // ── Selection ────────────────────────────────────────────────────
    //
    // Pure set operations; no store or network interaction. Ids are not
    // pruned on re-fetch, so selections span pages and filter changes.

    pub fn toggle(&self, id: RecordId) {
        let mut cell = self.cell();
        cell.selection.toggle(id);
        let state = snapshot(&cell);
        drop(cell);
        self.inner.state_tx.send_replace(state);
    }

    /// Select every id on the current page (existing selection outside
    /// the page is untouched).
    pub fn select_all(&self) {
        let mut cell = self.cell();
        let visible = cell.ids.clone();
        cell.selection.select_all(visible);
        let state = snapshot(&cell);
        drop(cell);
        self.inner.state_tx.send_replace(state);
    }

    /// Replace the whole selection.
    pub fn select(&self, ids: Vec<RecordId>) {
        let mut cell = self.cell();
        cell.selection.select(ids);
        let state = snapshot(&cell);
        drop(cell);
        self.inner.state_tx.send_replace(state);
    }

    pub fn unselect(&self, ids: &[RecordId]) {
        let mut cell = self.cell();
        cell.selection.unselect(ids);
        let state = snapshot(&cell);
        drop(cell);
        self.inner.state_tx.send_replace(state);
    }

    pub fn clear_selection(&self) {
        let mut cell = self.cell();
        cell.selection.clear();
        let state = snapshot(&cell);
        drop(cell);
        self.inner.state_tx.send_replace(state);
    }

    pub fn selected_ids(&self) -> Vec<RecordId> {
        self.cell().selection.ids()
    }

    // ── Internals ────────────────────────────────────────────────────

    fn cell(&self) -> MutexGuard<'_, Cell> {
        self.inner.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, mutate: impl FnOnce(&mut StoredParams)) {
        if !self.inner.config.sync_with_preferences {
            return;
        }
        let prefs = self.inner.prefs.as_ref();
        let mut stored = load_stored_params(prefs, &self.inner.config.resource);
        mutate(&mut stored);
        save_stored_params(prefs, &self.inner.config.resource, &stored);
    }

    /// Fold a params-input mutation, recompute the key, and refetch when
    /// the key changed.
    async fn apply(&self, mutate: impl FnOnce(&mut ParamsInput)) {
        let changed = {
            let mut cell = self.cell();
            mutate(&mut cell.input);
            let stored = if self.inner.config.sync_with_preferences {
                load_stored_params(self.inner.prefs.as_ref(), &self.inner.config.resource)
            } else {
                StoredParams::default()
            };
            let params = compute_params(&cell.input, &stored, &self.inner.config.defaults);
            let key = query_key(&self.inner.config.resource, &params);
            cell.params = params;
            if key == cell.key {
                false
            } else {
                cell.key = key;
                true
            }
        };
        if changed {
            self.fetch_current().await;
        } else {
            let cell = self.cell();
            let state = snapshot(&cell);
            drop(cell);
            self.inner.state_tx.send_replace(state);
        }
    }

    /// One full evaluation of the current key: cache check, conditional
    /// deduped fetch, reconciliation, settlement. A response whose key
    /// no longer matches the controller's current key is discarded.
    async fn fetch_current(&self) {
        let resource = self.inner.config.resource.clone();
        let (key, params) = {
            let cell = self.cell();
            (cell.key.clone(), cell.params.clone())
        };

        if let Some(cached) = self.inner.store.query_result(&resource, &key) {
            if cached.is_fresh() {
                debug!(resource = %resource, key = %key, "serving cached query result");
                let mut cell = self.cell();
                if cell.key == key {
                    let data = collect_data(&self.inner.store, &resource, &cached.ids);
                    cell.ids = cached.ids;
                    cell.total = cached.total;
                    cell.data = data;
                    cell.phase = LoadPhase::Success;
                    cell.error = None;
                    let state = snapshot(&cell);
                    drop(cell);
                    self.inner.state_tx.send_replace(state);
                }
                return;
            }
            // Stale cache: adopt it as provisional display while the
            // revalidating fetch is pending.
            let mut cell = self.cell();
            if cell.key == key && cell.ids.is_empty() {
                let data = collect_data(&self.inner.store, &resource, &cached.ids);
                cell.ids = cached.ids;
                cell.total = cached.total;
                cell.data = data;
            }
        }

        {
            let mut cell = self.cell();
            if cell.key != key {
                return;
            }
            cell.phase = LoadPhase::Loading;
            let state = snapshot(&cell);
            drop(cell);
            self.inner.state_tx.send_replace(state);
        }

        let fetch = {
            let store = Arc::clone(&self.inner.store);
            let provider = Arc::clone(&self.inner.provider);
            let resource = resource.clone();
            let fetch_key = key.clone();
            self.inner.store.inflight.join_or_spawn(&key, move || async move {
                let query = ListQuery {
                    pagination: Pagination {
                        page: params.page,
                        per_page: params.per_page,
                    },
                    sort: params.sort.clone(),
                    filter: params.filter.clone(),
                };
                debug!(resource = %resource, key = %fetch_key, "fetching list from gateway");
                match provider.get_list(&resource, &query).await {
                    Ok(page) => {
                        let ids = store.put_records(&resource, page.records);
                        store.put_query_result(
                            &resource,
                            fetch_key,
                            QueryResult::fresh(ids.clone(), page.total),
                        );
                        Ok(FetchedList {
                            ids,
                            total: page.total,
                        })
                    }
                    Err(err) => {
                        warn!(resource = %resource, error = %err, "list fetch failed");
                        Err(Arc::new(CoreError::from(err)))
                    }
                }
            })
        };

        let outcome = fetch.await;
        self.inner.store.inflight.finish(&key);

        let mut cell = self.cell();
        if cell.key != key {
            debug!(settled = %key, current = %cell.key, "discarding superseded response");
            return;
        }
        match outcome {
            Ok(fetched) => {
                let data = collect_data(&self.inner.store, &resource, &fetched.ids);
                cell.ids = fetched.ids;
                cell.total = fetched.total;
                cell.data = data;
                cell.phase = LoadPhase::Success;
                cell.error = None;
            }
            Err(err) => {
                // Last good ids/data/total stay in place alongside the
                // error, so consumers never blank the screen.
                cell.phase = LoadPhase::Error;
                cell.error = Some(err);
            }
        }
        let state = snapshot(&cell);
        drop(cell);
        self.inner.state_tx.send_replace(state);
    }
}
