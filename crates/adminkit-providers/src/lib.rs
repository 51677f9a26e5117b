// adminkit-providers: Conforming DataProvider implementations for adminkit-core.

pub mod memory;
pub mod rest;

// ── Primary re-exports ──────────────────────────────────────────────
pub use memory::MemoryProvider;
pub use rest::{RestProvider, RestProviderBuilder};
