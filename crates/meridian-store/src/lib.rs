//! # Meridian Store
//!
//! Storage interfaces consumed by the Meridian frontend.
//!
//! - [`DocumentStore`] - subscriptions, resources and operations, with
//!   single-subscription [`Transaction`]s
//! - [`LockClient`] - TTL-bound subscription locks, plus [`acquire_lock`]
//!   and [`hold_lock`] for waiting and renewal
//! - [`memory`] - in-memory implementations of both

#![doc(html_root_url = "https://docs.rs/meridian-store/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod document;
mod error;
mod lock;
pub mod memory;
mod transaction;

pub use document::{DocumentStore, OperationUpdate};
pub use error::{StoreError, StoreResult};
pub use lock::{acquire_lock, hold_lock, LockClient, LockHandle};
pub use memory::{MemoryLockClient, MemoryStore};
pub use transaction::{Transaction, TransactionStep};
