//! SQLite backend for the Retiro withdrawal workflow.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! pool without blocking the async runtime. The withdrawal + attendance
//! creation unit runs inside one explicit rusqlite transaction.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
