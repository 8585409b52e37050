use std::collections::BTreeSet;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use vfslog_config::log_snapshot_debug;
use vfslog_ops::{AttributeId, ContentRecordId, FileId, LogPosition, NameResolver, OperationLog};

use super::{RecoveredChildren, Snapshot, SnapshotVariant, VirtualFileSnapshot};
use crate::attribute::ScalarAttribute;
use crate::chronicle::{self, Direction, Scan};
use crate::oracle::Oracle;
use crate::state::{NotAvailableCause, State};

/// Finds the snapshot a cache-aware snapshot at the given position
/// delegates to. Must return a snapshot strictly before that position.
pub(crate) type PrecedingLookup = Arc<dyn Fn(LogPosition) -> Arc<Snapshot> + Send + Sync>;

/// Log-scanning strategy bounded by the closest preceding snapshot.
///
/// For every property it asks the oracle first (if any), then scans the
/// window between the preceding snapshot and its own position, and finally
/// falls back to the preceding snapshot's answer. The preceding snapshot is
/// looked up per resolution and only held for its duration, so a snapshot
/// never keeps older cached snapshots alive.
pub(crate) struct CacheAware {
    log: Arc<dyn OperationLog>,
    names: Arc<dyn NameResolver>,
    preceding_lookup: PrecedingLookup,
    oracle: Option<Arc<dyn Oracle>>,
    oracle_snapshot: OnceCell<Option<Arc<Snapshot>>>,
    strict_invalid_records: bool,
}

impl CacheAware {
    pub(crate) fn new(
        log: Arc<dyn OperationLog>,
        names: Arc<dyn NameResolver>,
        preceding_lookup: PrecedingLookup,
        oracle: Option<Arc<dyn Oracle>>,
        strict_invalid_records: bool,
    ) -> Self {
        Self {
            log,
            names,
            preceding_lookup,
            oracle,
            oracle_snapshot: OnceCell::new(),
            strict_invalid_records,
        }
    }

    fn preceding(&self, position: LogPosition) -> Arc<Snapshot> {
        (self.preceding_lookup)(position)
    }

    fn ask_oracle<T>(&self, position: LogPosition, ask: impl FnOnce(&Snapshot) -> State<T>) -> Option<T> {
        let oracle = self
            .oracle_snapshot
            .get_or_init(|| self.oracle.as_ref().and_then(|oracle| oracle.snapshot_at(position)))
            .as_ref()?;
        ask(oracle).into_option()
    }

    /// Answer of `preceding`, the snapshot bounding the scanned window, once
    /// the window is exhausted
    fn delegate<T>(
        &self,
        position: LogPosition,
        preceding: &Snapshot,
        invalid_skipped: usize,
        ask: impl FnOnce(&Snapshot) -> State<T>,
    ) -> State<T> {
        if invalid_skipped > 0 && self.strict_invalid_records {
            return State::not_available(NotAvailableCause::UnreadableOperations { count: invalid_skipped });
        }
        if preceding.variant() == SnapshotVariant::NotAvailable {
            return State::not_available(NotAvailableCause::ScanExhausted { invalid_skipped });
        }

        log_snapshot_debug!(
            "Delegating to preceding snapshot",
            position = position.0,
            preceding = preceding.position().0
        );
        ask(preceding).or_if_not_available(|cause| {
            State::not_available(match cause {
                NotAvailableCause::ScanExhausted { invalid_skipped: older } => NotAvailableCause::ScanExhausted {
                    invalid_skipped: older + invalid_skipped,
                },
                other => other,
            })
        })
    }

    pub(crate) fn resolve_scalar<A: ScalarAttribute>(&self, snapshot: &Snapshot, file_id: FileId) -> State<A::Value> {
        let position = snapshot.position();
        if let Some(value) = self.ask_oracle(position, |o| o.file_by_id(file_id).scalar::<A>().clone()) {
            log_snapshot_debug!("Oracle answered", position = position.0, file_id = file_id, property = A::NAME);
            return State::Ready(value);
        }

        let preceding = self.preceding(position);
        let floor = preceding.position();
        let mut iter = self.log.iterator_at(position);
        match chronicle::lookup::<A>(&mut *iter, Direction::Rewind, file_id, Some(&|p: LogPosition| p < floor)) {
            Scan::Found { value, .. } => State::Ready(value),
            Scan::Exhausted { invalid_skipped, .. } => self.delegate(position, &preceding, invalid_skipped, |preceding| {
                preceding.file_by_id(file_id).scalar::<A>().clone()
            }),
        }
    }

    pub(crate) fn resolve_name(&self, file: &VirtualFileSnapshot) -> State<String> {
        file.name_id().clone().bind(|name_id| match self.names.name_of(name_id) {
            Some(name) => State::Ready(name),
            None => State::not_available(NotAvailableCause::UnknownNameId(name_id)),
        })
    }

    pub(crate) fn resolve_content(&self, snapshot: &Snapshot, record_id: ContentRecordId) -> State<Vec<u8>> {
        let position = snapshot.position();
        if let Some(content) = self.ask_oracle(position, |o| o.content_by_record(record_id)) {
            return State::Ready(content);
        }

        let preceding = self.preceding(position);
        let floor = preceding.position();
        let mut iter = self.log.iterator_at(position);
        let scan = chronicle::collect_content(&mut *iter, record_id, Some(&|p: LogPosition| p < floor));
        let base = match scan.base {
            Some(base) => State::Ready(base),
            None => self.delegate(position, &preceding, scan.invalid_skipped, |preceding| {
                preceding.content_by_record(record_id)
            }),
        };
        base.bind(|base| chronicle::apply_patches(base, &scan.patches))
    }

    pub(crate) fn resolve_attribute(
        &self,
        snapshot: &Snapshot,
        file_id: FileId,
        attribute: &AttributeId,
    ) -> State<Option<Vec<u8>>> {
        let position = snapshot.position();
        if let Some(data) = self.ask_oracle(position, |o| o.file_by_id(file_id).read_attribute(attribute)) {
            return State::Ready(data);
        }

        let preceding = self.preceding(position);
        let floor = preceding.position();
        let mut iter = self.log.iterator_at(position);
        match chronicle::lookup_attribute(&mut *iter, file_id, attribute, Some(&|p: LogPosition| p < floor)) {
            Scan::Found { value, .. } => State::Ready(value),
            Scan::Exhausted { invalid_skipped, .. } => self.delegate(position, &preceding, invalid_skipped, |preceding| {
                preceding.file_by_id(file_id).read_attribute(attribute)
            }),
        }
    }

    /// Every file ever attached to `parent_id` before this position whose
    /// parent, as of this snapshot, is still `parent_id`
    pub(crate) fn resolve_children(&self, snapshot: &Snapshot, parent_id: FileId) -> State<RecoveredChildren> {
        let position = snapshot.position();
        if let Some(children) = self.ask_oracle(position, |o| o.file_by_id(parent_id).recoverable_children_ids().clone())
        {
            return State::Ready(children);
        }

        let (candidates, invalid_skipped) = {
            let mut iter = self.log.iterator_at(position);
            chronicle::child_candidates(&mut *iter, parent_id)
        };

        let mut children = RecoveredChildren {
            ids: BTreeSet::new(),
            complete: invalid_skipped == 0,
        };
        for candidate in candidates {
            match snapshot.file_by_id(candidate).parent_id() {
                State::Ready(parent) if *parent == parent_id => {
                    children.ids.insert(candidate);
                }
                State::Ready(_) => {}
                State::NotAvailable(_) => children.complete = false,
            }
        }
        log_snapshot_debug!(
            "Recovered children",
            position = position.0,
            file_id = parent_id,
            count = children.ids.len(),
            complete = children.complete
        );
        State::Ready(children)
    }
}
