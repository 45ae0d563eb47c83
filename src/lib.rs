//! Scoped wrapper around the SQLite engine, the implementation lives in the `sqlite` crate.

#[cfg(feature = "sqlite")]
#[doc(inline)]
pub use sqlite;
