//! Concurrency layer for distkv
//!
//! This crate serializes the mutations of a store:
//! - WriteSet: pending puts/deletes, last operation per key
//! - TransactionContext: the buffer of an open transaction
//! - TransactionManager: commit lock and version allocation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;
pub mod transaction;

pub use manager::{Applied, TransactionManager};
pub use transaction::{CommitError, TransactionContext, TransactionStatus, WriteSet};
