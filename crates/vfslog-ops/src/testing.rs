//! Test fixtures for code that reads the operation log.
//!
//! [`CountingLog`] wraps any [`OperationLog`] and records every entry its
//! iterators touch, so tests can assert how much of the log a lookup scanned.
//!
//! # Usage
//!
//! ```
//! use vfslog_ops::testing::CountingLog;
//! use vfslog_ops::{LogPosition, MemoryOperationLog, Operation, OperationLog, TagMask};
//!
//! let mut log = MemoryOperationLog::new();
//! log.append(Operation::AllocateRecord { file_id: 1 });
//! let counting = CountingLog::new(log);
//!
//! let mut it = counting.iterator_at(counting.end());
//! it.previous_filtered(TagMask::ALL);
//! assert_eq!(counting.reads(), 1);
//! assert_eq!(counting.touched_positions(), vec![LogPosition::ZERO]);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::{LogIterator, LogPosition, Operation, OperationLog, ReadResult, TagMask};

/// Operation log wrapper that counts reads
pub struct CountingLog<L> {
    inner: L,
    reads: AtomicUsize,
    iterators: AtomicUsize,
    touched: Mutex<Vec<LogPosition>>,
}

impl<L: OperationLog> CountingLog<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            reads: AtomicUsize::new(0),
            iterators: AtomicUsize::new(0),
            touched: Mutex::new(Vec::new()),
        }
    }

    /// Number of entries read (matching or not) since creation or last reset
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of iterators handed out
    pub fn iterators_opened(&self) -> usize {
        self.iterators.load(Ordering::SeqCst)
    }

    /// Start positions of every entry read, in read order
    pub fn touched_positions(&self) -> Vec<LogPosition> {
        self.touched.lock().clone()
    }

    /// Lowest entry position read so far
    pub fn lowest_touched(&self) -> Option<LogPosition> {
        self.touched.lock().iter().copied().min()
    }

    pub fn reset(&self) {
        self.reads.store(0, Ordering::SeqCst);
        self.iterators.store(0, Ordering::SeqCst);
        self.touched.lock().clear();
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }

    fn record(&self, position: LogPosition) {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.touched.lock().push(position);
    }
}

impl<L: OperationLog> OperationLog for CountingLog<L> {
    fn begin(&self) -> LogPosition {
        self.inner.begin()
    }

    fn end(&self) -> LogPosition {
        self.inner.end()
    }

    fn iterator_at(&self, position: LogPosition) -> Box<dyn LogIterator + '_> {
        self.iterators.fetch_add(1, Ordering::SeqCst);
        Box::new(CountingIterator {
            owner: self,
            inner: self.inner.iterator_at(position),
        })
    }
}

struct CountingIterator<'a, L> {
    owner: &'a CountingLog<L>,
    inner: Box<dyn LogIterator + 'a>,
}

impl<L: OperationLog> LogIterator for CountingIterator<'_, L> {
    fn position(&self) -> LogPosition {
        self.inner.position()
    }

    fn previous_entry_position(&self) -> Option<LogPosition> {
        self.inner.previous_entry_position()
    }

    fn previous_filtered(&mut self, mask: TagMask) -> ReadResult {
        let result = self.inner.previous_filtered(mask);
        self.owner.record(self.inner.position());
        result
    }

    fn next_entry_position(&self) -> Option<LogPosition> {
        self.inner.next_entry_position()
    }

    fn next_filtered(&mut self, mask: TagMask) -> ReadResult {
        let entry = self.inner.next_entry_position().unwrap_or_else(|| self.inner.position());
        let result = self.inner.next_filtered(mask);
        self.owner.record(entry);
        result
    }
}

/// Build a log from `(position, operation)` pairs
pub fn log_from(
    entries: impl IntoIterator<Item = (u64, Operation)>,
) -> crate::Result<crate::MemoryOperationLog> {
    let mut log = crate::MemoryOperationLog::new();
    for (position, op) in entries {
        log.append_at(LogPosition(position), op)?;
    }
    Ok(log)
}
