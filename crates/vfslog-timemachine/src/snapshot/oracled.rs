use std::sync::Arc;

use vfslog_config::log_oracle_debug;
use vfslog_ops::{FileId, LogPosition, OperationLog};

use super::VirtualFileSnapshot;
use crate::attribute::ScalarAttribute;
use crate::chronicle::{self, Direction, Scan};
use crate::oracle::GroundTruth;
use crate::state::{NotAvailableCause, State};

/// Ground-truth strategy: a live value is valid at position P only if the
/// log records no mutation of it from P to the end.
pub(crate) struct Oracled {
    log: Arc<dyn OperationLog>,
    truth: Arc<dyn GroundTruth>,
}

impl Oracled {
    pub(crate) fn new(log: Arc<dyn OperationLog>, truth: Arc<dyn GroundTruth>) -> Self {
        Self { log, truth }
    }

    pub(crate) fn resolve_scalar<A: ScalarAttribute>(&self, position: LogPosition, file_id: FileId) -> State<A::Value> {
        let mut iter = self.log.iterator_at(position);
        match chronicle::lookup::<A>(&mut *iter, Direction::Play, file_id, None) {
            Scan::Found { position: at, .. } => {
                log_oracle_debug!(
                    "Ground truth superseded by later mutation",
                    position = position.0,
                    file_id = file_id,
                    property = A::NAME,
                    mutated_at = at.0
                );
                State::not_available(NotAvailableCause::ModifiedAfterPosition(at))
            }
            Scan::Exhausted { invalid_skipped, .. } if invalid_skipped > 0 => {
                State::not_available(NotAvailableCause::UnreadableOperations { count: invalid_skipped })
            }
            Scan::Exhausted { .. } => match A::ground_truth(self.truth.as_ref(), file_id) {
                Some(value) => State::Ready(value),
                None => State::not_available(NotAvailableCause::NotProvidedByOracle),
            },
        }
    }

    pub(crate) fn resolve_name(&self, file: &VirtualFileSnapshot) -> State<String> {
        file.name_id().clone().bind(|name_id| match self.truth.name_by_name_id(name_id) {
            Some(name) => State::Ready(name),
            None => State::not_available(NotAvailableCause::UnknownNameId(name_id)),
        })
    }
}
