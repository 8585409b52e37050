//! Combining a log-derived snapshot source with an oracle.
//!
//! - [`with_oracle`]: the oracle's ready answers win, the log fills the gaps
//! - [`with_contradiction_check`]: both sides are computed; disagreement
//!   between two ready answers is a fault in the scanner or the oracle and
//!   aborts with a [`Contradiction`] panic

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use vfslog_config::{log_cache_debug, log_snapshot_error};
use vfslog_ops::{ContentRecordId, FileId, LogPosition};

use crate::cache::SnapshotCache;
use crate::equality::{DeepEquality, DefaultEquality};
use crate::machine::SnapshotSource;
use crate::oracle::Oracle;
use crate::snapshot::{DualSource, Snapshot};

/// How a dual-source snapshot merges the two answers for a property
#[derive(Clone)]
pub enum ResolutionPolicy {
    /// Use the second (oracle) answer when ready, else the first
    PreferSecond,
    /// Use whichever side is ready; panic if both are and they differ
    ContradictionCheck(Arc<dyn DeepEquality>),
}

impl fmt::Debug for ResolutionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionPolicy::PreferSecond => f.write_str("PreferSecond"),
            ResolutionPolicy::ContradictionCheck(_) => f.write_str("ContradictionCheck"),
        }
    }
}

/// What a contradicting property belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    File(FileId),
    ContentRecord(ContentRecordId),
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::File(id) => write!(f, "file #{id}"),
            Subject::ContentRecord(id) => write!(f, "content record #{id}"),
        }
    }
}

/// Log-derived and oracle values disagree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("contradiction at {position} in {subject} {property}: log says {log_value}, oracle says {oracle_value}")]
pub struct Contradiction {
    pub position: LogPosition,
    pub subject: Subject,
    pub property: &'static str,
    pub log_value: String,
    pub oracle_value: String,
}

impl Contradiction {
    /// Log the contradiction and panic with it
    pub fn raise(self) -> ! {
        log_snapshot_error!(
            "Log and oracle disagree",
            position = self.position.0,
            subject = tracing::field::display(self.subject),
            property = self.property,
            log_value = self.log_value.as_str(),
            oracle_value = self.oracle_value.as_str()
        );
        panic!("{self}");
    }
}

/// Snapshot source that overlays oracle snapshots on another source.
///
/// Positions the oracle declines are served by the wrapped source as is.
pub struct DualSourceTimeMachine {
    source: Arc<dyn SnapshotSource>,
    oracle: Arc<dyn Oracle>,
    policy: ResolutionPolicy,
    cache: SnapshotCache,
}

impl DualSourceTimeMachine {
    pub fn new(
        source: impl SnapshotSource + 'static,
        oracle: impl Oracle + 'static,
        policy: ResolutionPolicy,
    ) -> Self {
        let sweep_interval = vfslog_config::config().time_machine.sweep_interval;
        Self {
            source: Arc::new(source),
            oracle: Arc::new(oracle),
            policy,
            cache: SnapshotCache::new(sweep_interval),
        }
    }

    pub fn policy(&self) -> &ResolutionPolicy {
        &self.policy
    }
}

impl SnapshotSource for DualSourceTimeMachine {
    fn get_snapshot(&self, position: LogPosition) -> Arc<Snapshot> {
        if let Some(snapshot) = self.cache.get(position) {
            return snapshot;
        }
        let original = self.source.get_snapshot(position);
        let Some(oracle) = self.oracle.snapshot_at(position) else {
            log_cache_debug!("Oracle declined, using original snapshot", position = position.0);
            return original;
        };
        self.cache.get_or_insert_with(position, || {
            Snapshot::dual_source(DualSource::new(original, oracle, self.policy.clone()))
        })
    }
}

/// Prefer the oracle's ready answers over `source`'s
pub fn with_oracle(source: impl SnapshotSource + 'static, oracle: impl Oracle + 'static) -> DualSourceTimeMachine {
    DualSourceTimeMachine::new(source, oracle, ResolutionPolicy::PreferSecond)
}

/// Cross-check `source` against the oracle with [`DefaultEquality`]
pub fn with_contradiction_check(
    source: impl SnapshotSource + 'static,
    oracle: impl Oracle + 'static,
) -> DualSourceTimeMachine {
    with_contradiction_check_using(source, oracle, DefaultEquality)
}

/// Cross-check `source` against the oracle with a custom equality
pub fn with_contradiction_check_using(
    source: impl SnapshotSource + 'static,
    oracle: impl Oracle + 'static,
    equality: impl DeepEquality + 'static,
) -> DualSourceTimeMachine {
    DualSourceTimeMachine::new(source, oracle, ResolutionPolicy::ContradictionCheck(Arc::new(equality)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use vfslog_config::Config;
    use vfslog_ops::{MemoryOperationLog, NameId};

    use crate::machine::TimeMachine;
    use crate::snapshot::SnapshotVariant;

    #[test]
    fn test_cached_dual_snapshot_skips_oracle() {
        let names = |_: NameId| -> Option<String> { None };
        let machine = TimeMachine::builder(Arc::new(MemoryOperationLog::new()), Arc::new(names))
            .config(&Config::default())
            .build();
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let oracle = move |position: LogPosition| {
            counted.fetch_add(1, Ordering::SeqCst);
            Some(Snapshot::not_available(position))
        };
        let dual = with_oracle(machine.clone(), oracle);

        let first = dual.get_snapshot(LogPosition(10));
        let second = dual.get_snapshot(LogPosition(10));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.variant(), SnapshotVariant::DualSource);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        drop(first);
        drop(second);
        let _rebuilt = dual.get_snapshot(LogPosition(10));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_contradiction_message() {
        let contradiction = Contradiction {
            position: LogPosition(12),
            subject: Subject::File(7),
            property: "parentId",
            log_value: "1".to_string(),
            oracle_value: "2".to_string(),
        };
        assert_eq!(
            contradiction.to_string(),
            "contradiction at @12 in file #7 parentId: log says 1, oracle says 2"
        );
    }

    #[test]
    #[should_panic(expected = "contradiction at @3 in content record #4")]
    fn test_raise_panics() {
        Contradiction {
            position: LogPosition(3),
            subject: Subject::ContentRecord(4),
            property: "content",
            log_value: "2 bytes".to_string(),
            oracle_value: "3 bytes".to_string(),
        }
        .raise();
    }
}
