//! Mod catalog: one entry per archive, keyed by content hash.

mod store;
mod types;

pub use store::{ModCatalog, SqliteModCatalog};
pub use types::ModCatalogEntry;
