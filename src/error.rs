use std::fmt;

use thiserror::Error;

use crate::{typesystem::TypeToken, value::SlotKind};

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Marshalling failures are reported through [`Error::Marshal`], which wraps the
/// more detailed [`MarshalError`]. All of them are fatal to the current interpreted
/// call: there is no retry semantic at this layer, the interpreter is expected to
/// tear down the call frame and surface the failure.
///
/// # Examples
///
/// ```rust
/// use crossbind::{Error, MarshalError, StackFrame, Slot};
///
/// let mut frame = StackFrame::new(1);
/// frame.push(Slot::from(1)).unwrap();
///
/// match frame.push(Slot::from(2)) {
///     Err(Error::Marshal(MarshalError::StackOverflow { capacity })) => {
///         assert_eq!(capacity, 1);
///     }
///     other => panic!("unexpected result: {other:?}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A marshalling, resolution or redirection failure.
    ///
    /// See [`MarshalError`] for the individual failure modes.
    #[error("{0}")]
    Marshal(#[from] MarshalError),
    /// Generic error for miscellaneous failures.
    ///
    /// Used for errors that don't fit into other categories, such as invalid
    /// configuration values passed to the runtime builder.
    #[error("{0}")]
    Error(String),
}

impl Error {
    /// Returns the wrapped [`MarshalError`], if this is a marshalling failure.
    #[must_use]
    pub fn as_marshal(&self) -> Option<&MarshalError> {
        match self {
            Error::Marshal(inner) => Some(inner),
            _ => None,
        }
    }
}

/// Errors raised by the descriptor table, stack frames, marshallers and the
/// redirection table.
///
/// These are programming or integration errors: a calling-convention
/// violation, a stale reference or a registration conflict.
#[derive(Debug, Clone, PartialEq)]
pub enum MarshalError {
    /// A reference slot points to a missing or destroyed object.
    DanglingReference {
        /// The id of the object that could not be found.
        reference_id: u64,
    },
    /// An array reference or element access is out of bounds.
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Length of the array.
        length: usize,
    },
    /// A push or reservation would exceed the frame capacity.
    StackOverflow {
        /// Configured slot capacity of the frame.
        capacity: usize,
    },
    /// A pop or read below the frame base.
    StackUnderflow,
    /// The same method signature was registered twice.
    DuplicateRedirection {
        /// Display form of the conflicting signature.
        signature: String,
    },
    /// The slot kind is not valid for the requested operation.
    UnsupportedSlotKind {
        /// Operation being performed.
        operation: &'static str,
        /// Kind of the offending slot.
        kind: SlotKind,
    },
    /// A type was looked up by name, token or native type and is not registered.
    TypeNotFound {
        /// Description of the lookup key.
        name: String,
    },
    /// A type with the same full name was registered twice.
    DuplicateType {
        /// Full name of the conflicting type.
        name: String,
    },
    /// Field index is not declared on the type.
    FieldNotFound {
        /// Owning type.
        type_token: TypeToken,
        /// The requested declaration index.
        index: u32,
    },
    /// A slot did not hold the kind of value a field codec expected.
    SlotTypeMismatch {
        /// Expected value kind.
        expected: &'static str,
        /// Actual value kind found.
        found: &'static str,
    },
    /// A value-type handle or boxed object has a different type than requested.
    ValueTypeMismatch {
        /// Type the caller asked for.
        expected: TypeToken,
        /// Type actually stored.
        found: TypeToken,
    },
    /// A value-type reservation was released out of order.
    InvalidValueTypeRelease {
        /// Base slot of the most recent reservation.
        expected: usize,
        /// Base slot of the handle being released.
        found: usize,
    },
    /// A heap object is not of the kind required by the operation.
    HeapObjectMismatch {
        /// Expected object kind.
        expected: &'static str,
        /// Actual object kind found.
        found: &'static str,
    },
    /// The heap object limit was reached.
    HeapLimitExceeded {
        /// Configured maximum number of live objects.
        limit: usize,
    },
    /// A trampoline reported a failure of its native computation.
    TrampolineFailed {
        /// Display form of the redirected signature.
        signature: String,
        /// Failure description supplied by the trampoline.
        message: String,
    },
}

impl fmt::Display for MarshalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarshalError::DanglingReference { reference_id } => {
                write!(f, "dangling reference to object {reference_id}")
            }
            MarshalError::IndexOutOfRange { index, length } => {
                write!(f, "index {index} out of range (length: {length})")
            }
            MarshalError::StackOverflow { capacity } => {
                write!(f, "stack overflow (capacity: {capacity} slots)")
            }
            MarshalError::StackUnderflow => write!(f, "stack underflow"),
            MarshalError::DuplicateRedirection { signature } => {
                write!(f, "duplicate redirection for {signature}")
            }
            MarshalError::UnsupportedSlotKind { operation, kind } => {
                write!(f, "{operation} does not support {kind} slots")
            }
            MarshalError::TypeNotFound { name } => write!(f, "type not registered: {name}"),
            MarshalError::DuplicateType { name } => {
                write!(f, "type registered twice: {name}")
            }
            MarshalError::FieldNotFound { type_token, index } => {
                write!(f, "type {type_token} has no field {index}")
            }
            MarshalError::SlotTypeMismatch { expected, found } => {
                write!(f, "slot type mismatch: expected {expected}, found {found}")
            }
            MarshalError::ValueTypeMismatch { expected, found } => {
                write!(
                    f,
                    "value type mismatch: expected {expected}, found {found}"
                )
            }
            MarshalError::InvalidValueTypeRelease { expected, found } => {
                write!(
                    f,
                    "value type released out of order: top reservation at {expected}, released {found}"
                )
            }
            MarshalError::HeapObjectMismatch { expected, found } => {
                write!(f, "heap object mismatch: expected {expected}, found {found}")
            }
            MarshalError::HeapLimitExceeded { limit } => {
                write!(f, "heap object limit exceeded (limit: {limit})")
            }
            MarshalError::TrampolineFailed { signature, message } => {
                write!(f, "redirected call {signature} failed: {message}")
            }
        }
    }
}

impl std::error::Error for MarshalError {}
