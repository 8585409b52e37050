use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::{Arc, Weak};

use dashmap::DashMap;

use vfslog_ops::{AttributeId, AttributeRecordId, ContentRecordId, FileId, NameId, FREE_RECORD_FLAG, NULL_FILE_ID};

use super::Snapshot;
use crate::attribute::{
    AttributeRecordIdAttr, ContentRecordIdAttr, FlagsAttr, LengthAttr, NameIdAttr, ParentIdAttr, ScalarAttribute,
    TimestampAttr,
};
use crate::state::{NotAvailableCause, Property, State};

/// Children of a directory recovered from the log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveredChildren {
    pub ids: BTreeSet<FileId>,
    /// False when some candidate could not be confirmed or unreadable
    /// entries were skipped
    pub complete: bool,
}

impl RecoveredChildren {
    /// A complete side must contain every id the other side found
    pub fn agrees_with(&self, other: &RecoveredChildren) -> bool {
        (!self.complete || other.ids.is_subset(&self.ids)) && (!other.complete || self.ids.is_subset(&other.ids))
    }
}

impl fmt::Display for RecoveredChildren {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.ids)?;
        if !self.complete {
            f.write_str(" (incomplete)")?;
        }
        Ok(())
    }
}

/// State of one file as of its snapshot's position.
///
/// Every property is resolved on first access and memoized. The file holds
/// its snapshot weakly: once the snapshot is dropped, unresolved properties
/// become [`NotAvailableCause::SnapshotReleased`].
pub struct VirtualFileSnapshot {
    file_id: FileId,
    snapshot: Weak<Snapshot>,
    pub(crate) name_id: Property<NameId>,
    pub(crate) parent_id: Property<FileId>,
    pub(crate) length: Property<i64>,
    pub(crate) timestamp: Property<i64>,
    pub(crate) flags: Property<i32>,
    pub(crate) content_record_id: Property<ContentRecordId>,
    pub(crate) attributes_record_id: Property<AttributeRecordId>,
    name: Property<String>,
    content: Property<Vec<u8>>,
    children: Property<RecoveredChildren>,
    attributes: DashMap<AttributeId, Arc<Property<Option<Vec<u8>>>>>,
}

impl VirtualFileSnapshot {
    pub(crate) fn new(file_id: FileId, snapshot: Weak<Snapshot>) -> Self {
        Self {
            file_id,
            snapshot,
            name_id: Property::new(),
            parent_id: Property::new(),
            length: Property::new(),
            timestamp: Property::new(),
            flags: Property::new(),
            content_record_id: Property::new(),
            attributes_record_id: Property::new(),
            name: Property::new(),
            content: Property::new(),
            children: Property::new(),
            attributes: DashMap::new(),
        }
    }

    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    /// Owning snapshot, if still alive
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.upgrade()
    }

    fn with_snapshot<T>(&self, f: impl FnOnce(&Snapshot) -> State<T>) -> State<T> {
        match self.snapshot.upgrade() {
            Some(snapshot) => f(&snapshot),
            None => State::not_available(NotAvailableCause::SnapshotReleased),
        }
    }

    pub(crate) fn scalar<A: ScalarAttribute>(&self) -> &State<A::Value> {
        A::cell(self).observe_state(|| self.with_snapshot(|s| s.resolve_scalar::<A>(self.file_id)))
    }

    pub fn name_id(&self) -> &State<NameId> {
        self.scalar::<NameIdAttr>()
    }

    pub fn parent_id(&self) -> &State<FileId> {
        self.scalar::<ParentIdAttr>()
    }

    pub fn length(&self) -> &State<i64> {
        self.scalar::<LengthAttr>()
    }

    pub fn timestamp(&self) -> &State<i64> {
        self.scalar::<TimestampAttr>()
    }

    pub fn flags(&self) -> &State<i32> {
        self.scalar::<FlagsAttr>()
    }

    pub fn content_record_id(&self) -> &State<ContentRecordId> {
        self.scalar::<ContentRecordIdAttr>()
    }

    pub fn attributes_record_id(&self) -> &State<AttributeRecordId> {
        self.scalar::<AttributeRecordIdAttr>()
    }

    pub fn name(&self) -> &State<String> {
        self.name
            .observe_state(|| self.with_snapshot(|s| s.resolve_name(self)))
    }

    /// Parent file in the same snapshot; `Ready(None)` for roots
    pub fn parent(&self) -> State<Option<Arc<VirtualFileSnapshot>>> {
        self.parent_id().clone().bind(|parent_id| {
            if parent_id == NULL_FILE_ID {
                return State::Ready(None);
            }
            self.with_snapshot(|s| State::Ready(Some(s.file_by_id(parent_id))))
        })
    }

    /// Content of the file's content record
    pub fn content(&self) -> &State<Vec<u8>> {
        self.content.observe_state(|| {
            self.content_record_id().clone().bind(|record_id| {
                if record_id == 0 {
                    return State::not_available(NotAvailableCause::NoContentRecord);
                }
                self.with_snapshot(|s| s.content_by_record(record_id))
            })
        })
    }

    /// Data of one attribute stream; `Ready(None)` when it was deleted or
    /// never written since the record was cleaned
    pub fn read_attribute(&self, attribute: &AttributeId) -> State<Option<Vec<u8>>> {
        let cell = Arc::clone(&self.attributes.entry(attribute.clone()).or_default());
        cell.observe_state(|| self.with_snapshot(|s| s.resolve_attribute(self.file_id, attribute)))
            .clone()
    }

    pub fn recoverable_children_ids(&self) -> &State<RecoveredChildren> {
        self.children
            .observe_state(|| self.with_snapshot(|s| s.resolve_children(self.file_id)))
    }

    pub fn is_deleted(&self) -> State<bool> {
        self.flags().clone().fmap(|flags| flags & FREE_RECORD_FLAG != 0)
    }

    /// Names from the root down to this file, joined by `/`
    pub fn path(&self) -> State<String> {
        let mut seen = HashSet::from([self.file_id]);
        let mut segments = match self.name() {
            State::Ready(name) => vec![name.clone()],
            State::NotAvailable(cause) => return State::not_available(cause.clone()),
        };

        let mut next = self.parent();
        loop {
            let parent = match next {
                State::Ready(Some(parent)) => parent,
                State::Ready(None) => break,
                State::NotAvailable(cause) => return State::not_available(cause),
            };
            if !seen.insert(parent.file_id) {
                return State::not_available(NotAvailableCause::ParentCycle(parent.file_id));
            }
            match parent.name() {
                State::Ready(name) => segments.push(name.clone()),
                State::NotAvailable(cause) => return State::not_available(cause.clone()),
            }
            next = parent.parent();
        }

        segments.reverse();
        State::Ready(segments.join("/"))
    }
}

impl fmt::Debug for VirtualFileSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualFileSnapshot")
            .field("file_id", &self.file_id)
            .field("name_id", &self.name_id.peek())
            .field("parent_id", &self.parent_id.peek())
            .finish_non_exhaustive()
    }
}
