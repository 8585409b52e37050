//! Position-indexed cache of weakly held snapshots.
//!
//! Entries never keep a snapshot alive. A dead entry is replaced the next
//! time its position is requested, and dead entries are swept every
//! `sweep_interval` inserts.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use vfslog_config::log_cache_debug;
use vfslog_ops::LogPosition;

use crate::snapshot::Snapshot;

struct CacheState {
    entries: BTreeMap<LogPosition, Weak<Snapshot>>,
    inserts_since_sweep: usize,
}

pub(crate) struct SnapshotCache {
    state: Mutex<CacheState>,
    sweep_interval: usize,
}

impl SnapshotCache {
    pub(crate) fn new(sweep_interval: usize) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: BTreeMap::new(),
                inserts_since_sweep: 0,
            }),
            sweep_interval: sweep_interval.max(1),
        }
    }

    /// Live snapshot at exactly `position`
    pub(crate) fn get(&self, position: LogPosition) -> Option<Arc<Snapshot>> {
        self.state.lock().entries.get(&position).and_then(Weak::upgrade)
    }

    /// Live snapshot at exactly `position`, or the one `build` creates.
    ///
    /// `build` runs under the cache lock and must not touch the cache.
    pub(crate) fn get_or_insert_with(&self, position: LogPosition, build: impl FnOnce() -> Arc<Snapshot>) -> Arc<Snapshot> {
        let mut state = self.state.lock();
        if let Some(snapshot) = state.entries.get(&position).and_then(Weak::upgrade) {
            log_cache_debug!("Snapshot cache hit", position = position.0);
            return snapshot;
        }

        let snapshot = build();
        state.entries.insert(position, Arc::downgrade(&snapshot));
        state.inserts_since_sweep += 1;
        log_cache_debug!("Snapshot cache miss", position = position.0, entries = state.entries.len());

        if state.inserts_since_sweep >= self.sweep_interval {
            let before = state.entries.len();
            state.entries.retain(|_, snapshot| snapshot.strong_count() > 0);
            state.inserts_since_sweep = 0;
            log_cache_debug!(
                "Swept released snapshots",
                removed = before - state.entries.len(),
                entries = state.entries.len()
            );
        }
        snapshot
    }

    /// Live snapshot with the greatest position strictly below `position`
    pub(crate) fn closest_preceding(&self, position: LogPosition) -> Option<Arc<Snapshot>> {
        let state = self.state.lock();
        state
            .entries
            .range(..position)
            .rev()
            .find_map(|(_, snapshot)| snapshot.upgrade())
    }

    /// Positions of live entries, ascending
    pub(crate) fn positions(&self) -> Vec<LogPosition> {
        let state = self.state.lock();
        state
            .entries
            .iter()
            .filter(|(_, snapshot)| snapshot.strong_count() > 0)
            .map(|(position, _)| *position)
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.state
            .lock()
            .entries
            .values()
            .filter(|snapshot| snapshot.strong_count() > 0)
            .count()
    }
}
