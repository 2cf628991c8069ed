//! Local persistence for Stash
//!
//! Everything lives in one SQLite table of JSON records split into namespaces:
//! `snippets`, `folders`, and `meta` (rename map, reverse map, sync metadata).

mod connection;
mod entity_store;
mod identity;
mod metadata_repository;
mod migrations;
mod records;

pub use connection::Database;
pub use entity_store::EntityStore;
pub use identity::IdentityResolver;
pub use metadata_repository::MetadataRepository;
pub(crate) use records::RecordTable;
