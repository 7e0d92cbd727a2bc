//! Hierarchical item store backed by a materialized closure index.
//!
//! Items form an arbitrary tree (every item has at most one parent). Alongside
//! the item rows the store maintains `item_closure`, a table of
//! `(ancestor, descendant, depth)` triples covering the full transitive
//! closure of the tree. Every mutation runs as one SQLite transaction that
//! keeps both tables consistent; listing queries are keyset-paginated over
//! the item timestamps with the closure table answering parent/depth filters.
//!
//! The store is an in-process library: callers hand it an already
//! authenticated owner id, and it hands back items or field-tagged
//! validation errors. Transport, auth, and change notification live
//! elsewhere.

pub mod error;
pub mod item;
pub mod query;
pub mod store;

mod closure;
mod records;
mod sql_query;

pub mod sqlite_store;

pub use error::*;
pub use item::*;
pub use query::*;
pub use store::*;

pub use sqlite_store::SqliteItemStore;
