//! In-memory operation log.
//!
//! Entries are kept sorted by position. Positions are either assigned by
//! [`MemoryOperationLog::append`], which advances the end by an estimate of
//! the entry's encoded size, or given explicitly with `append_at`.

use crate::{LogError, LogIterator, LogPosition, Operation, OperationLog, ReadResult, Result, TagMask};

#[derive(Debug, Clone)]
enum Record {
    Valid(Operation),
    Invalid(String),
}

#[derive(Debug, Clone)]
struct Entry {
    position: LogPosition,
    record: Record,
}

/// Append-only operation log held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryOperationLog {
    entries: Vec<Entry>,
    end: LogPosition,
}

impl MemoryOperationLog {
    /// Header bytes of every entry (tag + length prefix)
    const HEADER_SIZE: u64 = 5;

    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append at the current end, returning the position of the new entry
    pub fn append(&mut self, op: Operation) -> LogPosition {
        let position = self.end;
        self.end = LogPosition(position.0 + Self::encoded_size(&op));
        self.entries.push(Entry {
            position,
            record: Record::Valid(op),
        });
        position
    }

    /// Append at an explicit position, which must not precede the current end
    pub fn append_at(&mut self, position: LogPosition, op: Operation) -> Result<()> {
        let size = Self::encoded_size(&op);
        self.push_at(position, size, Record::Valid(op))
    }

    /// Append an unreadable entry at the current end
    pub fn append_invalid(&mut self, reason: impl Into<String>) -> LogPosition {
        let position = self.end;
        self.end = LogPosition(position.0 + Self::HEADER_SIZE);
        self.entries.push(Entry {
            position,
            record: Record::Invalid(reason.into()),
        });
        position
    }

    /// Append an unreadable entry at an explicit position
    pub fn append_invalid_at(&mut self, position: LogPosition, reason: impl Into<String>) -> Result<()> {
        self.push_at(position, Self::HEADER_SIZE, Record::Invalid(reason.into()))
    }

    /// Move the end of the log forward without adding entries
    pub fn pad_to(&mut self, end: LogPosition) {
        if end > self.end {
            self.end = end;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push_at(&mut self, position: LogPosition, size: u64, record: Record) -> Result<()> {
        if let Some(last) = self.entries.last() {
            if position <= last.position {
                return Err(LogError::PositionOutOfOrder {
                    position,
                    end: self.end,
                });
            }
        }
        self.entries.push(Entry { position, record });
        self.end = self.end.max(LogPosition(position.0 + size));
        Ok(())
    }

    fn encoded_size(op: &Operation) -> u64 {
        let payload = match op {
            Operation::AllocateRecord { .. }
            | Operation::CleanRecord { .. }
            | Operation::DeleteAttributes { .. }
            | Operation::AcquireNewContentRecord { .. } => 4,
            Operation::SetNameId { .. }
            | Operation::SetParent { .. }
            | Operation::SetFlags { .. }
            | Operation::SetContentRecordId { .. }
            | Operation::SetAttributeRecordId { .. } => 8,
            Operation::SetLength { .. } | Operation::SetTimestamp { .. } => 12,
            Operation::FillRecord { .. } => 33,
            Operation::WriteContent { data, .. } | Operation::AppendContent { data, .. } => {
                4 + data.len() as u64
            }
            Operation::ReplaceContentBytes { data, .. } => 12 + data.len() as u64,
            Operation::WriteAttribute {
                attribute, data, ..
            } => 8 + attribute.as_str().len() as u64 + data.len() as u64,
        };
        Self::HEADER_SIZE + payload
    }

    /// Index of the first entry at or after `position`
    fn index_of(&self, position: LogPosition) -> usize {
        self.entries.partition_point(|e| e.position < position)
    }
}

impl OperationLog for MemoryOperationLog {
    fn begin(&self) -> LogPosition {
        self.entries.first().map(|e| e.position).unwrap_or(self.end)
    }

    fn end(&self) -> LogPosition {
        self.end
    }

    fn iterator_at(&self, position: LogPosition) -> Box<dyn LogIterator + '_> {
        Box::new(MemoryLogIterator {
            log: self,
            cursor: self.index_of(position),
            position,
        })
    }
}

/// Iterator over a [`MemoryOperationLog`]; `cursor` is the index of the
/// entry `next_filtered` would return.
struct MemoryLogIterator<'a> {
    log: &'a MemoryOperationLog,
    cursor: usize,
    position: LogPosition,
}

impl MemoryLogIterator<'_> {
    fn read(entry: &Entry, mask: TagMask) -> ReadResult {
        match &entry.record {
            Record::Invalid(reason) => ReadResult::Invalid(reason.clone()),
            Record::Valid(op) if mask.contains(op.tag()) => ReadResult::Valid(op.clone()),
            Record::Valid(op) => ReadResult::Skipped(op.tag()),
        }
    }
}

impl LogIterator for MemoryLogIterator<'_> {
    fn position(&self) -> LogPosition {
        self.position
    }

    fn previous_entry_position(&self) -> Option<LogPosition> {
        self.cursor.checked_sub(1).map(|i| self.log.entries[i].position)
    }

    fn previous_filtered(&mut self, mask: TagMask) -> ReadResult {
        if self.cursor == 0 {
            return ReadResult::Invalid("read before log start".to_string());
        }
        self.cursor -= 1;
        let entry = &self.log.entries[self.cursor];
        self.position = entry.position;
        Self::read(entry, mask)
    }

    fn next_entry_position(&self) -> Option<LogPosition> {
        self.log.entries.get(self.cursor).map(|e| e.position)
    }

    fn next_filtered(&mut self, mask: TagMask) -> ReadResult {
        let Some(entry) = self.log.entries.get(self.cursor) else {
            return ReadResult::Invalid("read past log end".to_string());
        };
        self.cursor += 1;
        self.position = self
            .log
            .entries
            .get(self.cursor)
            .map(|e| e.position)
            .unwrap_or(self.log.end);
        Self::read(entry, mask)
    }
}
