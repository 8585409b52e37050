//! Lazily computed, memoized property values.
//!
//! A [`Property`] starts out unknown and is resolved at most once into a
//! [`State`]: either `Ready(value)` or `NotAvailable(cause)`. "Not available"
//! is an ordinary answer ("the log does not say"), so it travels as data and
//! propagates through [`State::fmap`] / [`State::bind`].

use once_cell::sync::OnceCell;
use thiserror::Error;

use vfslog_ops::{FileId, LogPosition, NameId};

/// Why a property value could not be determined
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotAvailableCause {
    #[error("snapshot carries no information")]
    NoInformation,

    #[error("no mutation found within the scanned log ({invalid_skipped} unreadable entries skipped)")]
    ScanExhausted { invalid_skipped: usize },

    #[error("{count} unreadable entries in the scanned window")]
    UnreadableOperations { count: usize },

    #[error("name id {0} is unknown to the name resolver")]
    UnknownNameId(NameId),

    #[error("file has no content record")]
    NoContentRecord,

    #[error("content operations are inconsistent: {0}")]
    InconsistentContent(String),

    #[error("property was modified at {0}, at or after the snapshot position")]
    ModifiedAfterPosition(LogPosition),

    #[error("oracle does not provide this property")]
    NotProvidedByOracle,

    #[error("snapshot was released")]
    SnapshotReleased,

    #[error("parent chain loops back to file {0}")]
    ParentCycle(FileId),
}

/// Error returned by [`State::get`] on a non-ready state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PropertyError {
    #[error("property not available: {0}")]
    NotAvailable(NotAvailableCause),
}

pub type Result<T> = std::result::Result<T, PropertyError>;

/// Resolved state of a property
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State<T> {
    Ready(T),
    NotAvailable(NotAvailableCause),
}

impl<T> State<T> {
    pub fn not_available(cause: NotAvailableCause) -> Self {
        State::NotAvailable(cause)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, State::Ready(_))
    }

    pub fn fmap<R>(self, f: impl FnOnce(T) -> R) -> State<R> {
        match self {
            State::Ready(value) => State::Ready(f(value)),
            State::NotAvailable(cause) => State::NotAvailable(cause),
        }
    }

    pub fn bind<R>(self, f: impl FnOnce(T) -> State<R>) -> State<R> {
        match self {
            State::Ready(value) => f(value),
            State::NotAvailable(cause) => State::NotAvailable(cause),
        }
    }

    /// Replace a `NotAvailable` state with whatever `fallback` produces
    pub fn or_if_not_available(self, fallback: impl FnOnce(NotAvailableCause) -> State<T>) -> State<T> {
        match self {
            State::Ready(value) => State::Ready(value),
            State::NotAvailable(cause) => fallback(cause),
        }
    }

    pub fn as_ref(&self) -> State<&T> {
        match self {
            State::Ready(value) => State::Ready(value),
            State::NotAvailable(cause) => State::NotAvailable(cause.clone()),
        }
    }

    /// Value, or an error carrying the cause
    pub fn get(&self) -> Result<&T> {
        match self {
            State::Ready(value) => Ok(value),
            State::NotAvailable(cause) => Err(PropertyError::NotAvailable(cause.clone())),
        }
    }

    pub fn get_or_none(&self) -> Option<&T> {
        match self {
            State::Ready(value) => Some(value),
            State::NotAvailable(_) => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            State::Ready(value) => Some(value),
            State::NotAvailable(_) => None,
        }
    }

    pub fn cause(&self) -> Option<&NotAvailableCause> {
        match self {
            State::Ready(_) => None,
            State::NotAvailable(cause) => Some(cause),
        }
    }

    /// Dispatch on the state without ever failing
    pub fn observe<R>(
        &self,
        on_not_available: impl FnOnce(&NotAvailableCause) -> R,
        on_ready: impl FnOnce(&T) -> R,
    ) -> R {
        match self {
            State::Ready(value) => on_ready(value),
            State::NotAvailable(cause) => on_not_available(cause),
        }
    }
}

impl<T> From<Option<T>> for State<T> {
    /// `None` maps to [`NotAvailableCause::NoInformation`]
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => State::Ready(v),
            None => State::NotAvailable(NotAvailableCause::NoInformation),
        }
    }
}

/// One-shot memo cell.
///
/// An empty cell is the "unknown yet" state. The first caller of
/// [`Property::observe_state`] runs the computation while racing callers
/// block and then observe the same result.
#[derive(Debug)]
pub struct Property<T> {
    cell: OnceCell<State<T>>,
}

impl<T> Default for Property<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Property<T> {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Resolve the property, running `compute` if nobody has yet
    pub fn observe_state(&self, compute: impl FnOnce() -> State<T>) -> &State<T> {
        self.cell.get_or_init(compute)
    }

    /// Current state without computing; `None` while unknown
    pub fn peek(&self) -> Option<&State<T>> {
        self.cell.get()
    }

    pub fn is_resolved(&self) -> bool {
        self.cell.get().is_some()
    }
}
