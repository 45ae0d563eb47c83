//! Lightweight scoped wrapper on top of the sqlite3-sys crate
//!
//! Engine handles are owned by [`Connection`] and [`Statement`] and released exactly once
//! when they go out of scope. Engine result codes are reported through [`Error`].
//! [`Transaction`] commits when it leaves its scope unless it was resolved explicitly.

mod config;
mod connection;
mod error;
mod handle;
mod row;
mod statement;
mod transaction;
mod value;

pub use config::{AccessMode, CommitRetry, ConnectionConfig};
pub use connection::{Connection, MEMORY_PATH};
pub use error::Error;
pub use row::{ColumnType, Row, ValueRef};
pub use statement::{MappedRows, Rows, Statement};
pub use transaction::{Transaction, TransactionBehavior, TransactionState};
pub use value::Value;

pub type Result<T = ()> = std::result::Result<T, Error>;
