//! SQLite backend for the provgraph supply-chain graph.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. Deduplication is pushed down
//! to SQLite: every table with a natural key carries a (partial) unique
//! index generated from [`keys`], and every write is a conflict-resolving
//! upsert against it.

mod dependency;
mod encode;
mod hydrate;
mod identity;
mod occurrence;
mod predicate;
mod query;
mod sbom;
mod schema;
mod store;
mod upsert;

pub mod error;
pub mod keys;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
