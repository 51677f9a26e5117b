// adminkit-core: Headless data layer between a data provider and admin UI consumers.

pub mod accessor;
pub mod error;
pub mod list;
pub mod params;
pub mod preferences;
pub mod provider;
pub mod record;
pub mod reference;
pub mod store;
pub mod stream;
pub mod writer;

// ── Primary re-exports ──────────────────────────────────────────────
pub use accessor::FieldAccessor;
pub use error::{CoreError, ProviderError, StateError};
pub use list::{ListConfig, ListController, ListState, LoadPhase, Selection};
pub use params::{
    Filter, ListDefaults, ListParams, ParamsInput, QueryKey, Sort, SortOrder, StoredParams,
    compute_params, query_key,
};
pub use preferences::{
    MemoryPreferences, PreferenceStore, list_params_key, load_stored_params, save_stored_params,
};
pub use provider::{DataProvider, ListPage, ListQuery, Pagination};
pub use record::{ID_FIELD, Record, RecordId};
pub use reference::{ManyBatcher, ReferenceResolver, ReferenceState, SelectOption};
pub use store::{QueryResult, Store, Validity};
pub use stream::StateStream;
pub use writer::DataWriter;
