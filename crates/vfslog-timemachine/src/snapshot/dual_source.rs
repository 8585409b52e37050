use std::sync::Arc;

use vfslog_ops::{AttributeId, ContentRecordId, FileId, LogPosition};

use super::{RecoveredChildren, Snapshot};
use crate::attribute::ScalarAttribute;
use crate::combinators::{Contradiction, ResolutionPolicy, Subject};
use crate::equality::PropertyValue;
use crate::state::State;

/// Merges the answers of a log-derived snapshot (`first`) and an oracle
/// snapshot (`second`) at the same position.
pub(crate) struct DualSource {
    first: Arc<Snapshot>,
    second: Arc<Snapshot>,
    policy: ResolutionPolicy,
}

impl DualSource {
    pub(crate) fn new(first: Arc<Snapshot>, second: Arc<Snapshot>, policy: ResolutionPolicy) -> Self {
        Self { first, second, policy }
    }

    pub(crate) fn position(&self) -> LogPosition {
        self.first.position()
    }

    fn merge<T: PropertyValue>(
        &self,
        subject: Subject,
        property: &'static str,
        ask: impl Fn(&Snapshot) -> State<T>,
    ) -> State<T> {
        match &self.policy {
            ResolutionPolicy::PreferSecond => match ask(&self.second) {
                State::Ready(value) => State::Ready(value),
                State::NotAvailable(_) => ask(&self.first),
            },
            ResolutionPolicy::ContradictionCheck(equality) => match (ask(&self.first), ask(&self.second)) {
                (State::Ready(log_value), State::Ready(oracle_value)) => {
                    if !equality.equal(log_value.value_ref(), oracle_value.value_ref()) {
                        Contradiction {
                            position: self.position(),
                            subject,
                            property,
                            log_value: log_value.value_ref().to_string(),
                            oracle_value: oracle_value.value_ref().to_string(),
                        }
                        .raise();
                    }
                    State::Ready(log_value)
                }
                (State::Ready(value), State::NotAvailable(_)) | (State::NotAvailable(_), State::Ready(value)) => {
                    State::Ready(value)
                }
                (State::NotAvailable(cause), State::NotAvailable(_)) => State::not_available(cause),
            },
        }
    }

    pub(crate) fn resolve_scalar<A: ScalarAttribute>(&self, file_id: FileId) -> State<A::Value> {
        self.merge(Subject::File(file_id), A::NAME, |s| {
            s.file_by_id(file_id).scalar::<A>().clone()
        })
    }

    pub(crate) fn resolve_name(&self, file_id: FileId) -> State<String> {
        self.merge(Subject::File(file_id), "name", |s| s.file_by_id(file_id).name().clone())
    }

    pub(crate) fn resolve_content(&self, record_id: ContentRecordId) -> State<Vec<u8>> {
        self.merge(Subject::ContentRecord(record_id), "content", |s| {
            s.content_by_record(record_id)
        })
    }

    pub(crate) fn resolve_attribute(&self, file_id: FileId, attribute: &AttributeId) -> State<Option<Vec<u8>>> {
        self.merge(Subject::File(file_id), "attribute", |s| {
            s.file_by_id(file_id).read_attribute(attribute)
        })
    }

    pub(crate) fn resolve_children(&self, file_id: FileId) -> State<RecoveredChildren> {
        self.merge(Subject::File(file_id), "children", |s| {
            s.file_by_id(file_id).recoverable_children_ids().clone()
        })
    }
}
