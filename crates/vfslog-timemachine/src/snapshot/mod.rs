//! Read-only views of the VFS fixed to one log position.
//!
//! A [`Snapshot`] covers the log prefix before its position. It hands out
//! one [`VirtualFileSnapshot`] per file id and keeps it for its own
//! lifetime, so memoized properties are shared by every caller. How a
//! property is resolved depends on the snapshot variant:
//!
//! - `NotAvailable`: nothing is known; anchors every scan chain
//! - `CacheAware`: bounded log scan, delegating to the closest cached
//!   preceding snapshot
//! - `Oracled`: live ground truth, trusted only if the log shows no later
//!   mutation
//! - `DualSource`: merges two snapshots under a [`ResolutionPolicy`]
//!
//! [`ResolutionPolicy`]: crate::combinators::ResolutionPolicy

mod cache_aware;
mod dual_source;
mod file;
mod oracled;

pub(crate) use cache_aware::{CacheAware, PrecedingLookup};
pub(crate) use dual_source::DualSource;
pub use file::{RecoveredChildren, VirtualFileSnapshot};
pub(crate) use oracled::Oracled;

use std::fmt;
use std::sync::{Arc, Weak};

use dashmap::DashMap;

use vfslog_ops::{AttributeId, ContentRecordId, FileId, LogPosition, OperationLog};

use crate::attribute::ScalarAttribute;
use crate::oracle::GroundTruth;
use crate::state::{NotAvailableCause, Property, State};

/// Resolution strategy of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotVariant {
    NotAvailable,
    CacheAware,
    Oracled,
    DualSource,
}

pub(crate) enum SnapshotKind {
    NotAvailable,
    CacheAware(CacheAware),
    Oracled(Oracled),
    DualSource(DualSource),
}

pub struct Snapshot {
    position: LogPosition,
    kind: SnapshotKind,
    files: DashMap<FileId, Arc<VirtualFileSnapshot>>,
    contents: DashMap<ContentRecordId, Arc<Property<Vec<u8>>>>,
    this: Weak<Snapshot>,
}

impl Snapshot {
    fn with_kind(position: LogPosition, kind: SnapshotKind) -> Arc<Self> {
        Arc::new_cyclic(|this| Snapshot {
            position,
            kind,
            files: DashMap::new(),
            contents: DashMap::new(),
            this: this.clone(),
        })
    }

    /// Snapshot that knows nothing
    pub fn not_available(position: LogPosition) -> Arc<Self> {
        Self::with_kind(position, SnapshotKind::NotAvailable)
    }

    /// Snapshot answering from live ground truth, cross-checked against
    /// mutations logged at or after `position`
    pub fn oracled(position: LogPosition, log: Arc<dyn OperationLog>, truth: Arc<dyn GroundTruth>) -> Arc<Self> {
        Self::with_kind(position, SnapshotKind::Oracled(Oracled::new(log, truth)))
    }

    pub(crate) fn cache_aware(position: LogPosition, strategy: CacheAware) -> Arc<Self> {
        Self::with_kind(position, SnapshotKind::CacheAware(strategy))
    }

    pub(crate) fn dual_source(strategy: DualSource) -> Arc<Self> {
        Self::with_kind(strategy.position(), SnapshotKind::DualSource(strategy))
    }

    pub fn position(&self) -> LogPosition {
        self.position
    }

    pub fn variant(&self) -> SnapshotVariant {
        match self.kind {
            SnapshotKind::NotAvailable => SnapshotVariant::NotAvailable,
            SnapshotKind::CacheAware(_) => SnapshotVariant::CacheAware,
            SnapshotKind::Oracled(_) => SnapshotVariant::Oracled,
            SnapshotKind::DualSource(_) => SnapshotVariant::DualSource,
        }
    }

    /// File `file_id` as of this snapshot. Repeated calls return the same
    /// instance.
    pub fn file_by_id(&self, file_id: FileId) -> Arc<VirtualFileSnapshot> {
        if let Some(file) = self.files.get(&file_id) {
            return Arc::clone(&file);
        }
        Arc::clone(
            &self
                .files
                .entry(file_id)
                .or_insert_with(|| Arc::new(VirtualFileSnapshot::new(file_id, self.this.clone()))),
        )
    }

    /// File `file_id` if it was already requested; never creates an entry
    pub fn file_by_id_if_exists(&self, file_id: FileId) -> Option<Arc<VirtualFileSnapshot>> {
        self.files.get(&file_id).map(|file| Arc::clone(&file))
    }

    /// Number of files materialized so far
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Content of content record `record_id`, memoized per record
    pub fn content_by_record(&self, record_id: ContentRecordId) -> State<Vec<u8>> {
        let cell = Arc::clone(&self.contents.entry(record_id).or_default());
        cell.observe_state(|| match &self.kind {
            SnapshotKind::NotAvailable => State::not_available(NotAvailableCause::NoInformation),
            SnapshotKind::CacheAware(strategy) => strategy.resolve_content(self, record_id),
            SnapshotKind::Oracled(_) => State::not_available(NotAvailableCause::NotProvidedByOracle),
            SnapshotKind::DualSource(strategy) => strategy.resolve_content(record_id),
        })
        .clone()
    }

    pub(crate) fn resolve_scalar<A: ScalarAttribute>(&self, file_id: FileId) -> State<A::Value> {
        match &self.kind {
            SnapshotKind::NotAvailable => State::not_available(NotAvailableCause::NoInformation),
            SnapshotKind::CacheAware(strategy) => strategy.resolve_scalar::<A>(self, file_id),
            SnapshotKind::Oracled(strategy) => strategy.resolve_scalar::<A>(self.position, file_id),
            SnapshotKind::DualSource(strategy) => strategy.resolve_scalar::<A>(file_id),
        }
    }

    pub(crate) fn resolve_name(&self, file: &VirtualFileSnapshot) -> State<String> {
        match &self.kind {
            SnapshotKind::NotAvailable => State::not_available(NotAvailableCause::NoInformation),
            SnapshotKind::CacheAware(strategy) => strategy.resolve_name(file),
            SnapshotKind::Oracled(strategy) => strategy.resolve_name(file),
            SnapshotKind::DualSource(strategy) => strategy.resolve_name(file.file_id()),
        }
    }

    pub(crate) fn resolve_attribute(&self, file_id: FileId, attribute: &AttributeId) -> State<Option<Vec<u8>>> {
        match &self.kind {
            SnapshotKind::NotAvailable => State::not_available(NotAvailableCause::NoInformation),
            SnapshotKind::CacheAware(strategy) => strategy.resolve_attribute(self, file_id, attribute),
            SnapshotKind::Oracled(_) => State::not_available(NotAvailableCause::NotProvidedByOracle),
            SnapshotKind::DualSource(strategy) => strategy.resolve_attribute(file_id, attribute),
        }
    }

    pub(crate) fn resolve_children(&self, file_id: FileId) -> State<RecoveredChildren> {
        match &self.kind {
            SnapshotKind::NotAvailable => State::not_available(NotAvailableCause::NoInformation),
            SnapshotKind::CacheAware(strategy) => strategy.resolve_children(self, file_id),
            SnapshotKind::Oracled(_) => State::not_available(NotAvailableCause::NotProvidedByOracle),
            SnapshotKind::DualSource(strategy) => strategy.resolve_children(file_id),
        }
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("position", &self.position)
            .field("variant", &self.variant())
            .field("files", &self.files.len())
            .finish()
    }
}
