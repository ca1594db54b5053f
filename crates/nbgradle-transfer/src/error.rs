use crate::TargetKind;
use thiserror::Error;

/// Failures while encoding or reconstructing transferred records.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Codec(#[from] bincode::Error),

    #[error("record targets {actual} but a {expected} handle was expected")]
    WrongTarget {
        expected: TargetKind,
        actual: TargetKind,
    },

    #[error("expected a {expected} record")]
    RecordMismatch { expected: &'static str },

    #[error("failed to encode value of type `{type_name}`: {source}")]
    EncodeValue {
        type_name: String,
        #[source]
        source: bincode::Error,
    },
}

/// Failure to turn a builder handle into a live builder.
///
/// Resolution failures are local to one handle; callers record them and keep
/// going with the remaining handles.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("type `{type_name}` is not visible to code loader `{loader}`")]
    TypeNotFound { type_name: String, loader: String },

    #[error("type `{type_name}` has no constructor accepting ({arguments})")]
    NoMatchingConstructor { type_name: String, arguments: String },

    #[error("type `{type_name}` is not constructible")]
    NotAClass { type_name: String },

    #[error("type `{type_name}` is not an enumeration")]
    NotAnEnum { type_name: String },

    #[error("type `{type_name}` is not a restorable builder")]
    NotRestorable { type_name: String },

    #[error("enumeration `{type_name}` has no constant `{constant}`")]
    ConstantNotFound { type_name: String, constant: String },

    #[error("enumeration `{type_name}` declares no constants")]
    NoConstants { type_name: String },

    #[error(
        "enumeration `{type_name}` declares {} constants ({}); a constant name is required",
        .constants.len(),
        .constants.join(", ")
    )]
    AmbiguousConstant {
        type_name: String,
        constants: Vec<String>,
    },

    #[error("type `{type_name}` is a {actual}, not a {expected}")]
    WrongKind {
        type_name: String,
        expected: TargetKind,
        actual: TargetKind,
    },

    #[error("constructing `{type_name}` failed: {message}")]
    Construction { type_name: String, message: String },

    #[error("restoring `{type_name}` failed: {message}")]
    Restore { type_name: String, message: String },
}

/// Failure to decode one partition of a [`crate::PartitionedMap`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("partition is corrupted: {0}")]
    Corrupted(String),

    #[error("type `{type_name}` is not visible to code loader `{loader}`")]
    TypeNotVisible { type_name: String, loader: String },

    #[error("failed to decode value of type `{type_name}`: {message}")]
    Payload { type_name: String, message: String },

    #[error("expected values of type `{expected}` but found `{actual}`")]
    UnexpectedType { expected: String, actual: String },
}
