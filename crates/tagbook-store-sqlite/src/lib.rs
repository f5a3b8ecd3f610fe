//! SQLite backend for the tagbook fact store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. [`CachedStore`] adds time-to-live
//! caching of reads on top of any [`tagbook_core::store::FactStore`].

mod cache;
mod encode;
mod schema;
mod store;

pub mod error;

pub use cache::{CacheTtl, CachedStore};
pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
