//! # vfslog-ops
//!
//! Data model of the VFS operation log, as seen by readers.
//!
//! The log is an append-only sequence of [`Operation`]s, each stored at a
//! [`LogPosition`]. This crate does not own the physical encoding of the log;
//! it only describes what a reader can get out of it:
//!
//! - [`OperationLog`]: hands out [`LogIterator`]s positioned anywhere in the log
//! - [`LogIterator`]: moves one entry at a time in either direction, filtering
//!   payload decoding by a [`TagMask`]
//! - [`NameResolver`]: the name-id → name mapping kept next to the log
//!
//! [`MemoryOperationLog`] is an in-memory implementation used by tests and
//! diagnostics tooling.

pub mod memory;
pub mod testing;

pub use memory::MemoryOperationLog;

use std::fmt;

use thiserror::Error;

/// Identifier of a file record in the VFS
pub type FileId = i32;

/// Identifier of an interned file name
pub type NameId = i32;

/// Identifier of a content record (content is shared by record, not by file)
pub type ContentRecordId = i32;

/// Identifier of an attributes record
pub type AttributeRecordId = i32;

/// "No parent": the parent id of roots and of cleaned records
pub const NULL_FILE_ID: FileId = 0;

/// Record flag set on freed (deleted) records
pub const FREE_RECORD_FLAG: i32 = 0x400;

/// Errors raised while building or reading a log
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    #[error("position {position} is before the end of the log ({end})")]
    PositionOutOfOrder { position: LogPosition, end: LogPosition },
}

pub type Result<T> = std::result::Result<T, LogError>;

/// Opaque, totally ordered cursor into the operation log.
///
/// Positions are byte offsets in the underlying storage, so the distance
/// between two positions is meaningful as an amount of log data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LogPosition(pub u64);

impl LogPosition {
    /// Start of every log
    pub const ZERO: LogPosition = LogPosition(0);

    /// Bytes of log between this position and `end`
    pub fn distance_to(self, end: LogPosition) -> u64 {
        end.0.saturating_sub(self.0)
    }
}

impl fmt::Display for LogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl From<u64> for LogPosition {
    fn from(value: u64) -> Self {
        LogPosition(value)
    }
}

/// Name of a file attribute stream (e.g. "indexing.stamp")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttributeId(String);

impl AttributeId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind tag of an operation, stored in every log entry header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OperationTag {
    AllocateRecord = 0,
    SetNameId = 1,
    SetParent = 2,
    SetLength = 3,
    SetTimestamp = 4,
    SetFlags = 5,
    SetContentRecordId = 6,
    SetAttributeRecordId = 7,
    FillRecord = 8,
    CleanRecord = 9,
    AcquireNewContentRecord = 10,
    WriteContent = 11,
    AppendContent = 12,
    ReplaceContentBytes = 13,
    WriteAttribute = 14,
    DeleteAttributes = 15,
}

/// Set of [`OperationTag`]s a filtered read should fully decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TagMask(u32);

impl TagMask {
    pub const EMPTY: TagMask = TagMask(0);
    pub const ALL: TagMask = TagMask(u32::MAX);

    /// Build a mask from a list of tags (usable in const context)
    pub const fn of(tags: &[OperationTag]) -> Self {
        let mut bits = 0u32;
        let mut i = 0;
        while i < tags.len() {
            bits |= 1 << (tags[i] as u8);
            i += 1;
        }
        TagMask(bits)
    }

    pub const fn contains(self, tag: OperationTag) -> bool {
        self.0 & (1 << (tag as u8)) != 0
    }

    pub const fn union(self, other: TagMask) -> Self {
        TagMask(self.0 | other.0)
    }
}

/// One recorded VFS mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    AllocateRecord {
        file_id: FileId,
    },
    SetNameId {
        file_id: FileId,
        name_id: NameId,
    },
    SetParent {
        file_id: FileId,
        parent_id: FileId,
    },
    SetLength {
        file_id: FileId,
        length: i64,
    },
    SetTimestamp {
        file_id: FileId,
        timestamp: i64,
    },
    SetFlags {
        file_id: FileId,
        flags: i32,
    },
    SetContentRecordId {
        file_id: FileId,
        content_record_id: ContentRecordId,
    },
    SetAttributeRecordId {
        file_id: FileId,
        attribute_record_id: AttributeRecordId,
    },
    /// Initializes most scalar fields of a record at once
    FillRecord {
        file_id: FileId,
        name_id: NameId,
        parent_id: FileId,
        length: i64,
        timestamp: i64,
        flags: i32,
        /// When set, the attributes record reference is reset to 0
        overwrite_attribute_ref: bool,
    },
    /// Resets every scalar field of a record to zero
    CleanRecord {
        file_id: FileId,
    },
    AcquireNewContentRecord {
        record_id: ContentRecordId,
    },
    WriteContent {
        record_id: ContentRecordId,
        data: Vec<u8>,
    },
    AppendContent {
        record_id: ContentRecordId,
        data: Vec<u8>,
    },
    ReplaceContentBytes {
        record_id: ContentRecordId,
        offset: u64,
        data: Vec<u8>,
    },
    WriteAttribute {
        file_id: FileId,
        attribute: AttributeId,
        data: Vec<u8>,
    },
    DeleteAttributes {
        file_id: FileId,
    },
}

impl Operation {
    pub fn tag(&self) -> OperationTag {
        match self {
            Operation::AllocateRecord { .. } => OperationTag::AllocateRecord,
            Operation::SetNameId { .. } => OperationTag::SetNameId,
            Operation::SetParent { .. } => OperationTag::SetParent,
            Operation::SetLength { .. } => OperationTag::SetLength,
            Operation::SetTimestamp { .. } => OperationTag::SetTimestamp,
            Operation::SetFlags { .. } => OperationTag::SetFlags,
            Operation::SetContentRecordId { .. } => OperationTag::SetContentRecordId,
            Operation::SetAttributeRecordId { .. } => OperationTag::SetAttributeRecordId,
            Operation::FillRecord { .. } => OperationTag::FillRecord,
            Operation::CleanRecord { .. } => OperationTag::CleanRecord,
            Operation::AcquireNewContentRecord { .. } => OperationTag::AcquireNewContentRecord,
            Operation::WriteContent { .. } => OperationTag::WriteContent,
            Operation::AppendContent { .. } => OperationTag::AppendContent,
            Operation::ReplaceContentBytes { .. } => OperationTag::ReplaceContentBytes,
            Operation::WriteAttribute { .. } => OperationTag::WriteAttribute,
            Operation::DeleteAttributes { .. } => OperationTag::DeleteAttributes,
        }
    }

    /// Target file of the operation. Content operations target a content
    /// record rather than a file and return `None`.
    pub fn file_id(&self) -> Option<FileId> {
        match self {
            Operation::AllocateRecord { file_id }
            | Operation::SetNameId { file_id, .. }
            | Operation::SetParent { file_id, .. }
            | Operation::SetLength { file_id, .. }
            | Operation::SetTimestamp { file_id, .. }
            | Operation::SetFlags { file_id, .. }
            | Operation::SetContentRecordId { file_id, .. }
            | Operation::SetAttributeRecordId { file_id, .. }
            | Operation::FillRecord { file_id, .. }
            | Operation::CleanRecord { file_id }
            | Operation::WriteAttribute { file_id, .. }
            | Operation::DeleteAttributes { file_id } => Some(*file_id),
            Operation::AcquireNewContentRecord { .. }
            | Operation::WriteContent { .. }
            | Operation::AppendContent { .. }
            | Operation::ReplaceContentBytes { .. } => None,
        }
    }

    /// Content record targeted by a content operation
    pub fn content_record_id(&self) -> Option<ContentRecordId> {
        match self {
            Operation::AcquireNewContentRecord { record_id }
            | Operation::WriteContent { record_id, .. }
            | Operation::AppendContent { record_id, .. }
            | Operation::ReplaceContentBytes { record_id, .. } => Some(*record_id),
            _ => None,
        }
    }
}

/// Outcome of reading one log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadResult {
    /// Entry decoded in full
    Valid(Operation),
    /// Entry header read, payload not decoded because the tag is outside the mask
    Skipped(OperationTag),
    /// Entry could not be read (torn write, corrupted header, ...)
    Invalid(String),
}

/// Cursor over the operation log.
///
/// Every read moves the cursor by exactly one entry, whether the entry
/// matched the mask or not. After `previous_filtered` the cursor sits at the
/// start of the entry just read; after `next_filtered` it sits at the start
/// of the following entry (or at the log end).
pub trait LogIterator: Send {
    fn position(&self) -> LogPosition;

    fn has_previous(&self) -> bool {
        self.previous_entry_position().is_some()
    }

    /// Start of the entry `previous_filtered` would read, without reading it
    fn previous_entry_position(&self) -> Option<LogPosition>;

    fn previous_filtered(&mut self, mask: TagMask) -> ReadResult;

    fn has_next(&self) -> bool {
        self.next_entry_position().is_some()
    }

    /// Start of the entry `next_filtered` would read, without reading it
    fn next_entry_position(&self) -> Option<LogPosition>;

    fn next_filtered(&mut self, mask: TagMask) -> ReadResult;
}

/// Read-only access to an operation log
pub trait OperationLog: Send + Sync {
    /// Position of the first entry
    fn begin(&self) -> LogPosition;

    /// Position just past the last entry
    fn end(&self) -> LogPosition;

    /// Iterator whose previous entry is the last one stored before `position`
    fn iterator_at(&self, position: LogPosition) -> Box<dyn LogIterator + '_>;

    /// Bytes of log between `position` and the current end
    fn distance_to_end(&self, position: LogPosition) -> u64 {
        position.distance_to(self.end())
    }
}

/// Maps interned name ids back to file names
pub trait NameResolver: Send + Sync {
    fn name_of(&self, name_id: NameId) -> Option<String>;
}

impl<F> NameResolver for F
where
    F: Fn(NameId) -> Option<String> + Send + Sync,
{
    fn name_of(&self, name_id: NameId) -> Option<String> {
        self(name_id)
    }
}
