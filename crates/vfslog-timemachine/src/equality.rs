//! Deep equality used by the contradiction check.

use std::fmt;
use std::sync::Arc;

use vfslog_ops::FileId;

use crate::snapshot::{RecoveredChildren, VirtualFileSnapshot};

/// Borrowed, type-erased view of a property value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueRef<'a> {
    Int(i64),
    Text(&'a str),
    Bytes(&'a [u8]),
    File(FileId),
    Children(&'a RecoveredChildren),
    Absent,
}

/// Values a snapshot property can hold
pub trait PropertyValue {
    fn value_ref(&self) -> ValueRef<'_>;
}

impl PropertyValue for i32 {
    fn value_ref(&self) -> ValueRef<'_> {
        ValueRef::Int(i64::from(*self))
    }
}

impl PropertyValue for i64 {
    fn value_ref(&self) -> ValueRef<'_> {
        ValueRef::Int(*self)
    }
}

impl PropertyValue for String {
    fn value_ref(&self) -> ValueRef<'_> {
        ValueRef::Text(self)
    }
}

impl PropertyValue for Vec<u8> {
    fn value_ref(&self) -> ValueRef<'_> {
        ValueRef::Bytes(self)
    }
}

impl PropertyValue for RecoveredChildren {
    fn value_ref(&self) -> ValueRef<'_> {
        ValueRef::Children(self)
    }
}

impl PropertyValue for Arc<VirtualFileSnapshot> {
    fn value_ref(&self) -> ValueRef<'_> {
        ValueRef::File(self.file_id())
    }
}

impl<T: PropertyValue> PropertyValue for Option<T> {
    fn value_ref(&self) -> ValueRef<'_> {
        match self {
            Some(value) => value.value_ref(),
            None => ValueRef::Absent,
        }
    }
}

/// Equality judge for the contradiction check
pub trait DeepEquality: Send + Sync {
    fn equal(&self, a: ValueRef<'_>, b: ValueRef<'_>) -> bool;
}

impl<F> DeepEquality for F
where
    F: for<'a, 'b> Fn(ValueRef<'a>, ValueRef<'b>) -> bool + Send + Sync,
{
    fn equal(&self, a: ValueRef<'_>, b: ValueRef<'_>) -> bool {
        self(a, b)
    }
}

/// Bytes by content, files by id, recovered children by mutual
/// containment of their complete halves, everything else structurally.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEquality;

impl DeepEquality for DefaultEquality {
    fn equal(&self, a: ValueRef<'_>, b: ValueRef<'_>) -> bool {
        match (a, b) {
            (ValueRef::Children(a), ValueRef::Children(b)) => a.agrees_with(b),
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for ValueRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueRef::Int(v) => write!(f, "{v}"),
            ValueRef::Text(s) => write!(f, "{s:?}"),
            ValueRef::Bytes(b) => write!(f, "{} bytes", b.len()),
            ValueRef::File(id) => write!(f, "file #{id}"),
            ValueRef::Children(c) => write!(f, "{c}"),
            ValueRef::Absent => f.write_str("absent"),
        }
    }
}
