//! The snapshot facade.
//!
//! [`TimeMachine::get_snapshot`] returns the cached snapshot for a position
//! or creates a cache-aware one. Creating a snapshot is cheap: no log is
//! read until a property is first accessed, and the cache lock is never
//! held across a scan. Whenever a snapshot resolves a property it looks up
//! its anchor afresh, as the closest live cached snapshot before it, falling
//! back to the zero-position sentinel that knows nothing and is never
//! released. Anchors are not retained between resolutions.

use std::sync::Arc;

use vfslog_config::{log_cache_debug, Config};
use vfslog_ops::{LogPosition, NameResolver, OperationLog};

use crate::cache::SnapshotCache;
use crate::oracle::Oracle;
use crate::snapshot::{CacheAware, PrecedingLookup, Snapshot};

/// Anything that can produce a snapshot for a log position
pub trait SnapshotSource: Send + Sync {
    fn get_snapshot(&self, position: LogPosition) -> Arc<Snapshot>;
}

impl<S: SnapshotSource + ?Sized> SnapshotSource for Arc<S> {
    fn get_snapshot(&self, position: LogPosition) -> Arc<Snapshot> {
        (**self).get_snapshot(position)
    }
}

struct MachineShared {
    log: Arc<dyn OperationLog>,
    names: Arc<dyn NameResolver>,
    oracle: Option<Arc<dyn Oracle>>,
    strict_invalid_records: bool,
    sentinel: Arc<Snapshot>,
    cache: SnapshotCache,
}

impl MachineShared {
    fn preceding(&self, position: LogPosition) -> Arc<Snapshot> {
        self.cache
            .closest_preceding(position)
            .unwrap_or_else(|| Arc::clone(&self.sentinel))
    }
}

/// Reconstructs VFS state at arbitrary log positions
#[derive(Clone)]
pub struct TimeMachine {
    shared: Arc<MachineShared>,
}

impl TimeMachine {
    /// Time machine over `log` configured from the global config
    pub fn new(log: Arc<dyn OperationLog>, names: Arc<dyn NameResolver>) -> Self {
        Self::builder(log, names).build()
    }

    pub fn builder(log: Arc<dyn OperationLog>, names: Arc<dyn NameResolver>) -> TimeMachineBuilder {
        TimeMachineBuilder {
            log,
            names,
            oracle: None,
            config: vfslog_config::config().clone(),
        }
    }

    /// Snapshot covering the log before `position`
    pub fn get_snapshot(&self, position: LogPosition) -> Arc<Snapshot> {
        if position <= LogPosition::ZERO {
            return Arc::clone(&self.shared.sentinel);
        }
        self.shared.cache.get_or_insert_with(position, || {
            let shared = Arc::clone(&self.shared);
            let preceding: PrecedingLookup = Arc::new(move |position: LogPosition| shared.preceding(position));
            Snapshot::cache_aware(
                position,
                CacheAware::new(
                    Arc::clone(&self.shared.log),
                    Arc::clone(&self.shared.names),
                    preceding,
                    self.shared.oracle.clone(),
                    self.shared.strict_invalid_records,
                ),
            )
        })
    }

    /// Live cached snapshot with the greatest position strictly below
    /// `position`, if any
    pub fn closest_preceding_cached_snapshot(&self, position: LogPosition) -> Option<Arc<Snapshot>> {
        self.shared.cache.closest_preceding(position)
    }

    /// Zero-position snapshot anchoring every scan chain
    pub fn sentinel(&self) -> &Arc<Snapshot> {
        &self.shared.sentinel
    }

    /// Positions of live cached snapshots, ascending
    pub fn cached_positions(&self) -> Vec<LogPosition> {
        self.shared.cache.positions()
    }

    pub fn cache_len(&self) -> usize {
        self.shared.cache.len()
    }

    pub fn log(&self) -> &Arc<dyn OperationLog> {
        &self.shared.log
    }
}

impl SnapshotSource for TimeMachine {
    fn get_snapshot(&self, position: LogPosition) -> Arc<Snapshot> {
        TimeMachine::get_snapshot(self, position)
    }
}

pub struct TimeMachineBuilder {
    log: Arc<dyn OperationLog>,
    names: Arc<dyn NameResolver>,
    oracle: Option<Arc<dyn Oracle>>,
    config: Config,
}

impl TimeMachineBuilder {
    /// Oracle consulted before every log scan
    pub fn oracle(mut self, oracle: impl Oracle + 'static) -> Self {
        self.oracle = Some(Arc::new(oracle));
        self
    }

    pub fn config(mut self, config: &Config) -> Self {
        self.config = config.clone();
        self
    }

    pub fn strict_invalid_records(mut self, strict: bool) -> Self {
        self.config.chronicle.strict_invalid_records = strict;
        self
    }

    pub fn sweep_interval(mut self, interval: usize) -> Self {
        self.config.time_machine.sweep_interval = interval;
        self
    }

    pub fn build(self) -> TimeMachine {
        log_cache_debug!(
            "Creating time machine",
            log_end = self.log.end().0,
            oracle = self.oracle.is_some(),
            sweep_interval = self.config.time_machine.sweep_interval
        );
        TimeMachine {
            shared: Arc::new(MachineShared {
                log: self.log,
                names: self.names,
                oracle: self.oracle,
                strict_invalid_records: self.config.chronicle.strict_invalid_records,
                sentinel: Snapshot::not_available(LogPosition::ZERO),
                cache: SnapshotCache::new(self.config.time_machine.sweep_interval),
            }),
        }
    }
}
