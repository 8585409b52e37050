//! Scalar file attributes a snapshot can resolve.
//!
//! Each attribute is a marker type implementing [`ScalarAttribute`]: it knows
//! which operation kinds can mutate it, how to pull its new value out of such
//! an operation, where its memo cell lives on a [`VirtualFileSnapshot`], and
//! how to ask a [`GroundTruth`] for the live value.

use std::fmt::Debug;

use vfslog_ops::{
    AttributeRecordId, ContentRecordId, FileId, NameId, Operation, OperationTag, TagMask, NULL_FILE_ID,
};

use crate::equality::PropertyValue;
use crate::oracle::GroundTruth;
use crate::snapshot::VirtualFileSnapshot;
use crate::state::Property;

pub trait ScalarAttribute: Send + Sync + 'static {
    type Value: Clone + Debug + PartialEq + PropertyValue + Send + Sync;

    /// Name used in diagnostics
    const NAME: &'static str;

    /// Operation kinds that can change this attribute
    const MUTATORS: TagMask;

    /// New value of the attribute for `file_id` if `op` sets it
    fn extract(op: &Operation, file_id: FileId) -> Option<Self::Value>;

    fn cell(file: &VirtualFileSnapshot) -> &Property<Self::Value>;

    fn ground_truth(truth: &dyn GroundTruth, file_id: FileId) -> Option<Self::Value>;
}

pub struct NameIdAttr;
pub struct ParentIdAttr;
pub struct LengthAttr;
pub struct TimestampAttr;
pub struct FlagsAttr;
pub struct ContentRecordIdAttr;
pub struct AttributeRecordIdAttr;

impl ScalarAttribute for NameIdAttr {
    type Value = NameId;
    const NAME: &'static str = "nameId";
    const MUTATORS: TagMask =
        TagMask::of(&[OperationTag::SetNameId, OperationTag::FillRecord, OperationTag::CleanRecord]);

    fn extract(op: &Operation, file_id: FileId) -> Option<NameId> {
        match *op {
            Operation::SetNameId { file_id: f, name_id } if f == file_id => Some(name_id),
            Operation::FillRecord { file_id: f, name_id, .. } if f == file_id => Some(name_id),
            Operation::CleanRecord { file_id: f } if f == file_id => Some(0),
            _ => None,
        }
    }

    fn cell(file: &VirtualFileSnapshot) -> &Property<NameId> {
        &file.name_id
    }

    fn ground_truth(truth: &dyn GroundTruth, file_id: FileId) -> Option<NameId> {
        truth.name_id(file_id)
    }
}

impl ScalarAttribute for ParentIdAttr {
    type Value = FileId;
    const NAME: &'static str = "parentId";
    const MUTATORS: TagMask =
        TagMask::of(&[OperationTag::SetParent, OperationTag::FillRecord, OperationTag::CleanRecord]);

    fn extract(op: &Operation, file_id: FileId) -> Option<FileId> {
        match *op {
            Operation::SetParent { file_id: f, parent_id } if f == file_id => Some(parent_id),
            Operation::FillRecord { file_id: f, parent_id, .. } if f == file_id => Some(parent_id),
            Operation::CleanRecord { file_id: f } if f == file_id => Some(NULL_FILE_ID),
            _ => None,
        }
    }

    fn cell(file: &VirtualFileSnapshot) -> &Property<FileId> {
        &file.parent_id
    }

    fn ground_truth(truth: &dyn GroundTruth, file_id: FileId) -> Option<FileId> {
        truth.parent_id(file_id)
    }
}

impl ScalarAttribute for LengthAttr {
    type Value = i64;
    const NAME: &'static str = "length";
    const MUTATORS: TagMask =
        TagMask::of(&[OperationTag::SetLength, OperationTag::FillRecord, OperationTag::CleanRecord]);

    fn extract(op: &Operation, file_id: FileId) -> Option<i64> {
        match *op {
            Operation::SetLength { file_id: f, length } if f == file_id => Some(length),
            Operation::FillRecord { file_id: f, length, .. } if f == file_id => Some(length),
            Operation::CleanRecord { file_id: f } if f == file_id => Some(0),
            _ => None,
        }
    }

    fn cell(file: &VirtualFileSnapshot) -> &Property<i64> {
        &file.length
    }

    fn ground_truth(truth: &dyn GroundTruth, file_id: FileId) -> Option<i64> {
        truth.length(file_id)
    }
}

impl ScalarAttribute for TimestampAttr {
    type Value = i64;
    const NAME: &'static str = "timestamp";
    const MUTATORS: TagMask =
        TagMask::of(&[OperationTag::SetTimestamp, OperationTag::FillRecord, OperationTag::CleanRecord]);

    fn extract(op: &Operation, file_id: FileId) -> Option<i64> {
        match *op {
            Operation::SetTimestamp { file_id: f, timestamp } if f == file_id => Some(timestamp),
            Operation::FillRecord { file_id: f, timestamp, .. } if f == file_id => Some(timestamp),
            Operation::CleanRecord { file_id: f } if f == file_id => Some(0),
            _ => None,
        }
    }

    fn cell(file: &VirtualFileSnapshot) -> &Property<i64> {
        &file.timestamp
    }

    fn ground_truth(truth: &dyn GroundTruth, file_id: FileId) -> Option<i64> {
        truth.timestamp(file_id)
    }
}

impl ScalarAttribute for FlagsAttr {
    type Value = i32;
    const NAME: &'static str = "flags";
    const MUTATORS: TagMask =
        TagMask::of(&[OperationTag::SetFlags, OperationTag::FillRecord, OperationTag::CleanRecord]);

    fn extract(op: &Operation, file_id: FileId) -> Option<i32> {
        match *op {
            Operation::SetFlags { file_id: f, flags } if f == file_id => Some(flags),
            Operation::FillRecord { file_id: f, flags, .. } if f == file_id => Some(flags),
            Operation::CleanRecord { file_id: f } if f == file_id => Some(0),
            _ => None,
        }
    }

    fn cell(file: &VirtualFileSnapshot) -> &Property<i32> {
        &file.flags
    }

    fn ground_truth(truth: &dyn GroundTruth, file_id: FileId) -> Option<i32> {
        truth.flags(file_id)
    }
}

impl ScalarAttribute for ContentRecordIdAttr {
    type Value = ContentRecordId;
    const NAME: &'static str = "contentRecordId";
    const MUTATORS: TagMask = TagMask::of(&[OperationTag::SetContentRecordId, OperationTag::CleanRecord]);

    fn extract(op: &Operation, file_id: FileId) -> Option<ContentRecordId> {
        match *op {
            Operation::SetContentRecordId {
                file_id: f,
                content_record_id,
            } if f == file_id => Some(content_record_id),
            Operation::CleanRecord { file_id: f } if f == file_id => Some(0),
            _ => None,
        }
    }

    fn cell(file: &VirtualFileSnapshot) -> &Property<ContentRecordId> {
        &file.content_record_id
    }

    fn ground_truth(_truth: &dyn GroundTruth, _file_id: FileId) -> Option<ContentRecordId> {
        None
    }
}

impl ScalarAttribute for AttributeRecordIdAttr {
    type Value = AttributeRecordId;
    const NAME: &'static str = "attributesRecordId";
    const MUTATORS: TagMask = TagMask::of(&[
        OperationTag::SetAttributeRecordId,
        OperationTag::FillRecord,
        OperationTag::CleanRecord,
    ]);

    fn extract(op: &Operation, file_id: FileId) -> Option<AttributeRecordId> {
        match *op {
            Operation::SetAttributeRecordId {
                file_id: f,
                attribute_record_id,
            } if f == file_id => Some(attribute_record_id),
            Operation::FillRecord {
                file_id: f,
                overwrite_attribute_ref: true,
                ..
            } if f == file_id => Some(0),
            Operation::CleanRecord { file_id: f } if f == file_id => Some(0),
            _ => None,
        }
    }

    fn cell(file: &VirtualFileSnapshot) -> &Property<AttributeRecordId> {
        &file.attributes_record_id
    }

    fn ground_truth(_truth: &dyn GroundTruth, _file_id: FileId) -> Option<AttributeRecordId> {
        None
    }
}
