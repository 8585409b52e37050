//! Log scanning: "last write to X before (or after) position P".
//!
//! Every routine here drives a [`LogIterator`] one entry at a time, decoding
//! only the operation kinds that can affect the queried value. A stop
//! predicate, checked against the start of each entry before it is read, bounds
//! the scan to a window; this is what lets a snapshot rescan only the delta
//! since the closest cached snapshot instead of the whole log.

use std::collections::BTreeSet;
use std::ops::ControlFlow;

use vfslog_config::{log_chronicle_debug, log_chronicle_warn};
use vfslog_ops::{
    AttributeId, ContentRecordId, FileId, LogIterator, LogPosition, Operation, OperationTag, ReadResult, TagMask,
};

use crate::attribute::ScalarAttribute;
use crate::state::{NotAvailableCause, State};

/// Scan direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Toward the log start
    Rewind,
    /// Toward the log end
    Play,
}

/// Stop predicate evaluated against the start of the entry about to be
/// read; `true` ends the scan without reading that entry
pub type StopAt<'a> = &'a dyn Fn(LogPosition) -> bool;

/// Outcome of a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scan<T> {
    /// The visitor stopped the scan on the entry at `position`
    Found {
        value: T,
        position: LogPosition,
        invalid_skipped: usize,
        reads: usize,
    },
    /// The window or the log ran out first
    Exhausted { invalid_skipped: usize, reads: usize },
}

impl<T> Scan<T> {
    pub fn invalid_skipped(&self) -> usize {
        match self {
            Scan::Found { invalid_skipped, .. } | Scan::Exhausted { invalid_skipped, .. } => *invalid_skipped,
        }
    }

    pub fn reads(&self) -> usize {
        match self {
            Scan::Found { reads, .. } | Scan::Exhausted { reads, .. } => *reads,
        }
    }

    pub fn found(self) -> Option<T> {
        match self {
            Scan::Found { value, .. } => Some(value),
            Scan::Exhausted { .. } => None,
        }
    }
}

/// Walk the log from the iterator's position, handing every decoded entry
/// to `visit` until it breaks, `stop` fires or the log boundary is reached.
///
/// Entries outside `mask` are stepped over without decoding. Unreadable
/// entries are skipped and counted.
pub fn scan<T>(
    iter: &mut dyn LogIterator,
    direction: Direction,
    mask: TagMask,
    stop: Option<StopAt<'_>>,
    mut visit: impl FnMut(LogPosition, &Operation) -> ControlFlow<T>,
) -> Scan<T> {
    let mut reads = 0;
    let mut invalid_skipped = 0;

    loop {
        let next_entry = match direction {
            Direction::Rewind => iter.previous_entry_position(),
            Direction::Play => iter.next_entry_position(),
        };
        let Some(position) = next_entry else {
            break;
        };
        if stop.is_some_and(|stop| stop(position)) {
            break;
        }
        let result = match direction {
            Direction::Rewind => iter.previous_filtered(mask),
            Direction::Play => iter.next_filtered(mask),
        };
        reads += 1;

        match result {
            ReadResult::Valid(op) => {
                if let ControlFlow::Break(value) = visit(position, &op) {
                    return Scan::Found {
                        value,
                        position,
                        invalid_skipped,
                        reads,
                    };
                }
            }
            ReadResult::Skipped(_) => {}
            ReadResult::Invalid(reason) => {
                invalid_skipped += 1;
                log_chronicle_warn!(
                    "Skipping unreadable entry",
                    position = position.0,
                    reason = reason.as_str()
                );
            }
        }
    }

    log_chronicle_debug!(
        "Scan exhausted",
        direction = tracing::field::debug(direction),
        reads = reads,
        invalid_skipped = invalid_skipped
    );
    Scan::Exhausted { invalid_skipped, reads }
}

/// Closest mutation of attribute `A` of `file_id`
pub fn lookup<A: ScalarAttribute>(
    iter: &mut dyn LogIterator,
    direction: Direction,
    file_id: FileId,
    stop: Option<StopAt<'_>>,
) -> Scan<A::Value> {
    scan(iter, direction, A::MUTATORS, stop, |_, op| match A::extract(op, file_id) {
        Some(value) => ControlFlow::Break(value),
        None => ControlFlow::Continue(()),
    })
}

pub const CONTENT_MUTATORS: TagMask = TagMask::of(&[
    OperationTag::AcquireNewContentRecord,
    OperationTag::WriteContent,
    OperationTag::AppendContent,
    OperationTag::ReplaceContentBytes,
]);

/// Incremental change to a content record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPatch {
    Append(Vec<u8>),
    Replace { offset: u64, data: Vec<u8> },
}

/// Content operations of one record found in a backward scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentScan {
    /// Full content set by `WriteContent` / `AcquireNewContentRecord`
    pub base: Option<Vec<u8>>,
    /// Patches applied after the base, newest first
    pub patches: Vec<ContentPatch>,
    pub invalid_skipped: usize,
}

/// Collect content operations of `record_id` backward until a full write
pub fn collect_content(iter: &mut dyn LogIterator, record_id: ContentRecordId, stop: Option<StopAt<'_>>) -> ContentScan {
    let mut patches = Vec::new();
    let scan = scan(iter, Direction::Rewind, CONTENT_MUTATORS, stop, |_, op| {
        if op.content_record_id() != Some(record_id) {
            return ControlFlow::Continue(());
        }
        match op {
            Operation::AcquireNewContentRecord { .. } => ControlFlow::Break(Vec::new()),
            Operation::WriteContent { data, .. } => ControlFlow::Break(data.clone()),
            Operation::AppendContent { data, .. } => {
                patches.push(ContentPatch::Append(data.clone()));
                ControlFlow::Continue(())
            }
            Operation::ReplaceContentBytes { offset, data, .. } => {
                patches.push(ContentPatch::Replace {
                    offset: *offset,
                    data: data.clone(),
                });
                ControlFlow::Continue(())
            }
            _ => ControlFlow::Continue(()),
        }
    });
    let invalid_skipped = scan.invalid_skipped();
    ContentScan {
        base: scan.found(),
        patches,
        invalid_skipped,
    }
}

/// Apply newest-first `patches` to `base` in log order
pub fn apply_patches(mut content: Vec<u8>, patches: &[ContentPatch]) -> State<Vec<u8>> {
    for patch in patches.iter().rev() {
        match patch {
            ContentPatch::Append(data) => content.extend_from_slice(data),
            ContentPatch::Replace { offset, data } => {
                let start = *offset as usize;
                if start > content.len() {
                    return State::not_available(NotAvailableCause::InconsistentContent(format!(
                        "replace at offset {start} past content end {}",
                        content.len()
                    )));
                }
                let end = start + data.len();
                if end > content.len() {
                    content.resize(end, 0);
                }
                content[start..end].copy_from_slice(data);
            }
        }
    }
    State::Ready(content)
}

pub const ATTRIBUTE_MUTATORS: TagMask = TagMask::of(&[
    OperationTag::WriteAttribute,
    OperationTag::DeleteAttributes,
    OperationTag::CleanRecord,
]);

/// Latest value of attribute stream `attribute` of `file_id`: `Some(data)`
/// for a write, `None` for a deletion
pub fn lookup_attribute(
    iter: &mut dyn LogIterator,
    file_id: FileId,
    attribute: &AttributeId,
    stop: Option<StopAt<'_>>,
) -> Scan<Option<Vec<u8>>> {
    scan(iter, Direction::Rewind, ATTRIBUTE_MUTATORS, stop, |_, op| match op {
        Operation::WriteAttribute {
            file_id: f,
            attribute: a,
            data,
        } if *f == file_id && a == attribute => ControlFlow::Break(Some(data.clone())),
        Operation::DeleteAttributes { file_id: f } | Operation::CleanRecord { file_id: f } if *f == file_id => {
            ControlFlow::Break(None)
        }
        _ => ControlFlow::Continue(()),
    })
}

pub const PARENT_LINK_MUTATORS: TagMask = TagMask::of(&[OperationTag::SetParent, OperationTag::FillRecord]);

/// Files that were ever attached to `parent_id`, scanning back to the log
/// start. Returns the candidates and the number of unreadable entries.
pub fn child_candidates(iter: &mut dyn LogIterator, parent_id: FileId) -> (BTreeSet<FileId>, usize) {
    let mut candidates = BTreeSet::new();
    let scan = scan::<()>(iter, Direction::Rewind, PARENT_LINK_MUTATORS, None, |_, op| {
        match *op {
            Operation::SetParent {
                file_id,
                parent_id: p,
            }
            | Operation::FillRecord {
                file_id,
                parent_id: p,
                ..
            } if p == parent_id => {
                candidates.insert(file_id);
            }
            _ => {}
        }
        ControlFlow::Continue(())
    });
    (candidates, scan.invalid_skipped())
}
