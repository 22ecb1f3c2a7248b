use crate::types::TypeDescriptor;
use thiserror::Error;

/// Broad family an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A value of one kind showed up where another kind was expected.
    TypeMismatch,
    /// A value decoded fine but does not fit the requested host type.
    ValueOutOfRange,
    /// Program and data disagree about the shape of the value.
    Shape,
    /// No factory could produce a translator.
    Unresolvable,
    OutOfMemory,
}

/// Errors raised while compiling or executing marshalling programs.
///
/// Composite translators never wrap these: an error raised for an array
/// element reaches the caller exactly as the element translator raised it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarshalError {
    #[error("Can't treat type {tag} as {kind}")]
    TypeMismatch { tag: u8, kind: &'static str },

    #[error("Can't pickle {found} as {expected}")]
    UnexpectedValue {
        found: &'static str,
        expected: &'static str,
    },

    #[error("host value {found} is not a {expected}")]
    HostMismatch {
        found: &'static str,
        expected: &'static str,
    },

    #[error("record '{record}' has no field '{field}'")]
    MissingField { record: String, field: String },

    #[error("Can't treat {value} as {kind}")]
    OutOfRange { value: String, kind: &'static str },

    #[error("value buffer underflow: {needed} bytes needed at offset {offset}, {remaining} remaining")]
    Underflow {
        needed: usize,
        offset: usize,
        remaining: usize,
    },

    #[error("value buffer has {remaining} unconsumed bytes")]
    TrailingBytes { remaining: usize },

    #[error("malformed value buffer at offset {offset}: {reason}")]
    MalformedValue { offset: usize, reason: &'static str },

    #[error("malformed program at offset {offset}: {reason}")]
    MalformedProgram { offset: usize, reason: String },

    #[error("length {length} does not fit a 4-byte frame")]
    LengthOverflow { length: usize },

    #[error("value buffer would exceed the addressable size")]
    OutOfMemory,

    #[error("no translator found for {0}")]
    NoTranslator(TypeDescriptor),

    #[error("interface '{interface}' declares '{method}' more than once")]
    DuplicateMethod { interface: String, method: String },

    #[error("interface '{interface}' has no method '{method}'")]
    NoMethod { interface: String, method: String },

    #[error("method '{method}' takes {expected} arguments, got {found}")]
    ArityMismatch {
        method: String,
        expected: usize,
        found: usize,
    },
}

impl MarshalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MarshalError::TypeMismatch { .. }
            | MarshalError::UnexpectedValue { .. }
            | MarshalError::HostMismatch { .. }
            | MarshalError::MissingField { .. }
            | MarshalError::ArityMismatch { .. } => ErrorKind::TypeMismatch,
            MarshalError::OutOfRange { .. } => ErrorKind::ValueOutOfRange,
            MarshalError::Underflow { .. }
            | MarshalError::TrailingBytes { .. }
            | MarshalError::MalformedValue { .. }
            | MarshalError::MalformedProgram { .. }
            | MarshalError::LengthOverflow { .. } => ErrorKind::Shape,
            MarshalError::NoTranslator(_)
            | MarshalError::DuplicateMethod { .. }
            | MarshalError::NoMethod { .. } => ErrorKind::Unresolvable,
            MarshalError::OutOfMemory => ErrorKind::OutOfMemory,
        }
    }

    pub(crate) fn out_of_range(value: impl ToString, kind: &'static str) -> Self {
        MarshalError::OutOfRange {
            value: value.to_string(),
            kind,
        }
    }

    pub(crate) fn malformed_program(offset: usize, reason: impl Into<String>) -> Self {
        MarshalError::MalformedProgram {
            offset,
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = MarshalError> = std::result::Result<T, E>;
