//! frontcheck common library
//!
//! Read-only database verification used by the end-to-end harness: a
//! query/row model, order-stable result-set digests, and snapshots that
//! prove a UI action left no persisted side effect.

pub mod db;
pub mod digest;
pub mod error;
pub mod snapshot;
pub mod types;

pub use db::Database;
pub use digest::ResultSetDigest;
pub use error::{Error, Result};
pub use snapshot::Snapshot;
pub use types::{ResultSet, Row, Value};
