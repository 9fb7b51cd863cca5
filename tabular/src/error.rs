use std::{error::Error, fmt};

use crate::DType;

/// The tabular module's result type.
pub type Result<T> = std::result::Result<T, TabularErr>;

/// Failures of the frame, scaling and feature registry layers.
#[derive(Debug, Clone, PartialEq)]
pub enum TabularErr {
    /// The registry can't be built from what it was given.
    Configuration(String),
    /// A scaler was used before being fit.
    NotFitted,
    /// A scaler was fit twice.
    AlreadyFitted,
    /// A scaler was fit on a sample without finite values.
    EmptySample,
    UnknownScaler(String),
    ColumnMissing(String),
    DuplicateColumn(String),
    LengthMismatch {
        column: String,
        got: usize,
        expected: usize,
    },
    InvalidBinary {
        column: String,
        distinct: usize,
    },
    /// A column arrived with a type its feature can't be read from.
    TypeMismatch {
        column: String,
        expected: &'static str,
        got: DType,
    },
}

impl fmt::Display for TabularErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TabularErr::Configuration(s) => write!(f, "configuration error: {s}"),
            TabularErr::NotFitted => write!(f, "the scaler must be fit before transforming"),
            TabularErr::AlreadyFitted => write!(f, "the scaler has already been fit"),
            TabularErr::EmptySample => write!(f, "cannot fit a scaler without finite values"),
            TabularErr::UnknownScaler(name) => write!(f, "unknown scaler {name:?}"),
            TabularErr::ColumnMissing(name) => write!(f, "column {name:?} is missing"),
            TabularErr::DuplicateColumn(name) => write!(f, "column {name:?} already exists"),
            TabularErr::LengthMismatch {
                column,
                got,
                expected,
            } => write!(
                f,
                "column {column:?} has {got} rows, expected {expected}"
            ),
            TabularErr::InvalidBinary { column, distinct } => write!(
                f,
                "binary column {column:?} has {distinct} distinct values, at most 2 are allowed"
            ),
            TabularErr::TypeMismatch {
                column,
                expected,
                got,
            } => write!(f, "column {column:?} must be {expected}, got {got:?}"),
        }
    }
}

impl Error for TabularErr {}
