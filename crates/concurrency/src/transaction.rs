//! Transaction context and write buffering
//!
//! A [`TransactionContext`] buffers the puts and deletes issued on a store
//! handle between `startTransaction` and `commit`/`rollback`. Only the last
//! operation per key is kept, so a commit applies each key at most once.

use distkv_core::{Error, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while committing a transaction
#[derive(Debug, Error)]
pub enum CommitError {
    /// The transaction is not active
    #[error("transaction not active: {0}")]
    InvalidState(String),
}

impl From<CommitError> for Error {
    fn from(e: CommitError) -> Self {
        match e {
            CommitError::InvalidState(msg) => Error::InvalidState(msg),
        }
    }
}

/// Lifecycle of a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Accepting buffered operations
    Active,
    /// Applied to storage
    Committed,
    /// Discarded
    Aborted {
        /// Why the transaction was discarded
        reason: String,
    },
}

/// Ordered set of pending mutations, last operation per key.
///
/// `Some(value)` is a put, `None` a delete.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteSet {
    ops: BTreeMap<String, Option<Value>>,
}

impl WriteSet {
    /// Create an empty write set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a put
    pub fn put(&mut self, key: impl Into<String>, value: Value) {
        self.ops.insert(key.into(), Some(value));
    }

    /// Record a delete
    pub fn delete(&mut self, key: impl Into<String>) {
        self.ops.insert(key.into(), None);
    }

    /// Number of distinct keys touched
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True if nothing is pending
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Drop every pending operation
    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Split into writes and deletes, both sorted by key
    pub fn into_parts(self) -> (Vec<(String, Value)>, Vec<String>) {
        let mut writes = Vec::new();
        let mut deletes = Vec::new();
        for (key, op) in self.ops {
            match op {
                Some(value) => writes.push((key, value)),
                None => deletes.push(key),
            }
        }
        (writes, deletes)
    }
}

/// A transaction opened on one store handle
#[derive(Debug)]
pub struct TransactionContext {
    /// Unique id within the owning manager
    pub txn_id: u64,
    /// Current lifecycle state
    pub status: TransactionStatus,
    pending: WriteSet,
}

impl TransactionContext {
    /// Create an active transaction
    pub fn new(txn_id: u64) -> Self {
        Self {
            txn_id,
            status: TransactionStatus::Active,
            pending: WriteSet::new(),
        }
    }

    /// True while operations can be buffered
    pub fn is_active(&self) -> bool {
        self.status == TransactionStatus::Active
    }

    fn ensure_active(&self) -> Result<(), CommitError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(CommitError::InvalidState(format!(
                "transaction {} is {:?}",
                self.txn_id, self.status
            )))
        }
    }

    /// Buffer a put
    pub fn put(&mut self, key: impl Into<String>, value: Value) -> Result<(), CommitError> {
        self.ensure_active()?;
        self.pending.put(key, value);
        Ok(())
    }

    /// Buffer a delete
    pub fn delete(&mut self, key: impl Into<String>) -> Result<(), CommitError> {
        self.ensure_active()?;
        self.pending.delete(key);
        Ok(())
    }

    /// Number of distinct keys buffered
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Take the buffered operations, leaving the buffer empty
    pub fn take_pending(&mut self) -> WriteSet {
        std::mem::take(&mut self.pending)
    }

    /// Discard the buffer and mark the transaction aborted
    pub fn mark_aborted(&mut self, reason: impl Into<String>) -> Result<(), CommitError> {
        self.ensure_active()?;
        self.pending.clear();
        self.status = TransactionStatus::Aborted {
            reason: reason.into(),
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_operation_per_key_wins() {
        let mut txn = TransactionContext::new(1);
        txn.put("a", Value::Integer(1)).unwrap();
        txn.put("a", Value::Integer(2)).unwrap();
        txn.put("b", Value::from("x")).unwrap();
        txn.delete("b").unwrap();
        txn.delete("c").unwrap();
        assert_eq!(txn.pending_len(), 3);

        let (writes, deletes) = txn.take_pending().into_parts();
        assert_eq!(writes, vec![("a".to_string(), Value::Integer(2))]);
        assert_eq!(deletes, vec!["b".to_string(), "c".to_string()]);
        assert_eq!(txn.pending_len(), 0);
    }

    #[test]
    fn test_aborted_rejects_operations() {
        let mut txn = TransactionContext::new(7);
        txn.put("a", Value::Boolean(true)).unwrap();
        txn.mark_aborted("rollback").unwrap();
        assert_eq!(txn.pending_len(), 0);
        assert!(matches!(txn.status, TransactionStatus::Aborted { .. }));
        assert!(txn.put("a", Value::Boolean(false)).is_err());
        assert!(txn.mark_aborted("again").is_err());
    }

    #[test]
    fn test_commit_error_maps_to_canonical() {
        let e: Error = CommitError::InvalidState("x".into()).into();
        assert!(e.is_invalid_state());
        assert_eq!(e.code(), 409);
    }
}
