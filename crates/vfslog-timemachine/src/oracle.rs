//! External knowledge sources.
//!
//! An [`Oracle`] maps a log position to a snapshot, or declines. The
//! reference implementation, [`GroundTruthOracle`], serves [`Oracled`]
//! snapshots backed by the live VFS, but only for positions close enough to
//! the log end for the forward confirmation scan to stay cheap.
//!
//! [`Oracled`]: crate::snapshot::SnapshotVariant::Oracled

use std::sync::Arc;

use parking_lot::Mutex;

use vfslog_config::{log_oracle_debug, log_oracle_info, OracleConfig};
use vfslog_ops::{FileId, LogPosition, NameId, OperationLog};

use crate::snapshot::Snapshot;

pub trait Oracle: Send + Sync {
    /// Snapshot at `position`, or `None` to decline
    fn snapshot_at(&self, position: LogPosition) -> Option<Arc<Snapshot>>;
}

impl<F> Oracle for F
where
    F: Fn(LogPosition) -> Option<Arc<Snapshot>> + Send + Sync,
{
    fn snapshot_at(&self, position: LogPosition) -> Option<Arc<Snapshot>> {
        self(position)
    }
}

/// Live accessors of the current VFS state
pub trait GroundTruth: Send + Sync {
    fn name_id(&self, file_id: FileId) -> Option<NameId>;

    fn name_by_name_id(&self, name_id: NameId) -> Option<String>;

    fn parent_id(&self, file_id: FileId) -> Option<FileId>;

    fn length(&self, _file_id: FileId) -> Option<i64> {
        None
    }

    fn timestamp(&self, _file_id: FileId) -> Option<i64> {
        None
    }

    fn flags(&self, _file_id: FileId) -> Option<i32> {
        None
    }
}

/// Oracle over live ground truth, gated by distance to the log end
pub struct GroundTruthOracle {
    log: Arc<dyn OperationLog>,
    truth: Arc<dyn GroundTruth>,
    config: OracleConfig,
    last: Mutex<Option<Arc<Snapshot>>>,
}

impl GroundTruthOracle {
    pub fn new(log: Arc<dyn OperationLog>, truth: Arc<dyn GroundTruth>, config: OracleConfig) -> Self {
        Self {
            log,
            truth,
            config,
            last: Mutex::new(None),
        }
    }

    /// Oracle configured from the global config
    pub fn with_global_config(log: Arc<dyn OperationLog>, truth: Arc<dyn GroundTruth>) -> Self {
        let config = vfslog_config::config().oracle.clone();
        Self::new(log, truth, config)
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }
}

impl Oracle for GroundTruthOracle {
    fn snapshot_at(&self, position: LogPosition) -> Option<Arc<Snapshot>> {
        if !self.config.enabled {
            log_oracle_debug!("Oracle disabled", position = position.0);
            return None;
        }
        let distance = self.log.distance_to_end(position);
        if distance > self.config.max_distance_bytes {
            log_oracle_info!(
                "Position too far from log end, declining",
                position = position.0,
                distance = distance,
                max_distance = self.config.max_distance_bytes
            );
            return None;
        }

        let mut last = self.last.lock();
        if let Some(snapshot) = last.as_ref().filter(|s| s.position() == position) {
            return Some(Arc::clone(snapshot));
        }
        let snapshot = Snapshot::oracled(position, Arc::clone(&self.log), Arc::clone(&self.truth));
        *last = Some(Arc::clone(&snapshot));
        Some(snapshot)
    }
}
