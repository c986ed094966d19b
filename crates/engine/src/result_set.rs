//! Result sets
//!
//! A [`ResultSet`] is a point-in-time copy of the entries matching a query
//! plus a cursor. Writes made after creation are not reflected. Clones share
//! the cursor and the closed flag.

use distkv_core::{Entry, Error, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_RESULT_SET_ID: AtomicU64 = AtomicU64::new(1);

struct ResultSetInner {
    id: u64,
    entries: Vec<Entry>,
    position: Mutex<i64>,
    closed: AtomicBool,
}

/// Snapshot cursor over query results
#[derive(Clone)]
pub struct ResultSet {
    inner: Arc<ResultSetInner>,
}

impl ResultSet {
    pub(crate) fn new(entries: Vec<Entry>) -> Self {
        Self {
            inner: Arc::new(ResultSetInner {
                id: NEXT_RESULT_SET_ID.fetch_add(1, Ordering::Relaxed),
                entries,
                position: Mutex::new(-1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Process-unique id of this result set
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// True once closed
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Mark closed. Returns false if it was already closed.
    pub(crate) fn close(&self) -> bool {
        !self.inner.closed.swap(true, Ordering::AcqRel)
    }

    /// Number of rows; 0 once closed
    pub fn get_count(&self) -> usize {
        if self.is_closed() {
            0
        } else {
            self.inner.entries.len()
        }
    }

    /// Cursor position; -1 before the first row
    pub fn get_position(&self) -> i64 {
        *self.inner.position.lock()
    }

    fn count(&self) -> i64 {
        self.get_count() as i64
    }

    /// Move to an absolute position, clamped to `-1..=count`.
    /// Returns true if the cursor is on a row.
    pub fn move_to_position(&self, position: i64) -> bool {
        if self.is_closed() {
            return false;
        }
        let count = self.count();
        let clamped = position.clamp(-1, count);
        *self.inner.position.lock() = clamped;
        (0..count).contains(&clamped)
    }

    /// Move relative to the current position
    pub fn move_by(&self, offset: i64) -> bool {
        let target = self.get_position().saturating_add(offset);
        self.move_to_position(target)
    }

    /// Move to the first row
    pub fn move_to_first(&self) -> bool {
        self.count() > 0 && self.move_to_position(0)
    }

    /// Move to the last row
    pub fn move_to_last(&self) -> bool {
        let count = self.count();
        count > 0 && self.move_to_position(count - 1)
    }

    /// Advance one row
    pub fn move_to_next(&self) -> bool {
        self.move_by(1)
    }

    /// Go back one row
    pub fn move_to_previous(&self) -> bool {
        self.move_by(-1)
    }

    /// On the first row
    pub fn is_first(&self) -> bool {
        self.count() > 0 && self.get_position() == 0
    }

    /// On the last row
    pub fn is_last(&self) -> bool {
        let count = self.count();
        count > 0 && self.get_position() == count - 1
    }

    /// Before the first row
    pub fn is_before_first(&self) -> bool {
        !self.is_closed() && self.get_position() < 0
    }

    /// Past the last row
    pub fn is_after_last(&self) -> bool {
        !self.is_closed() && self.get_position() >= self.count()
    }

    /// Entry under the cursor
    pub fn get_entry(&self) -> Result<Entry> {
        if self.is_closed() {
            return Err(Error::invalid_state("result set is closed"));
        }
        let position = self.get_position();
        usize::try_from(position)
            .ok()
            .and_then(|p| self.inner.entries.get(p))
            .cloned()
            .ok_or_else(|| {
                Error::InvalidState(format!("cursor at {} is not on a row", position))
            })
    }
}

impl PartialEq for ResultSet {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSet")
            .field("id", &self.inner.id)
            .field("count", &self.inner.entries.len())
            .field("position", &self.get_position())
            .field("closed", &self.is_closed())
            .finish()
    }
}
