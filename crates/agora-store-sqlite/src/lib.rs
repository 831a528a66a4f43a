//! SQLite backend for the Agora reply tree and vote ledger.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. [`SqliteStore`] implements both
//! [`agora_core::store::ReplyTree`] and [`agora_core::store::VoteLedger`].

mod encode;
mod replies;
mod schema;
mod store;
mod votes;

pub mod error;

pub use error::{Error, Result};
pub use store::{SqliteStore, StoreOptions};

#[cfg(test)]
mod tests;
