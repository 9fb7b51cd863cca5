use std::{
    error::Error,
    fmt::{self, Display},
};

use ndarray::ShapeError;
use rand_distr::{NormalError, uniform::Error as UniformError};

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        a: &'static str,
        b: &'static str,
        got: usize,
        expected: usize,
    },
    Shape(ShapeError),
    NotBuilt,
    AlreadyBuilt,
    EmptyLayout,
    CodeOutOfRange {
        column: usize,
        code: usize,
        cardinality: usize,
    },
    ColumnOutOfRange {
        column: usize,
        columns: usize,
    },
    Rand(String),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                a,
                b,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch between {a} and {b}, got {got} and expected {expected}"
            ),
            MlErr::Shape(e) => write!(f, "invalid array shape: {e}"),
            MlErr::NotBuilt => write!(f, "the model has not been built yet"),
            MlErr::AlreadyBuilt => write!(f, "the model has already been built"),
            MlErr::EmptyLayout => write!(f, "cannot build a model without input features"),
            MlErr::CodeOutOfRange {
                column,
                code,
                cardinality,
            } => write!(
                f,
                "code {code} is out of range for categorical column {column} with {cardinality} classes"
            ),
            MlErr::ColumnOutOfRange { column, columns } => write!(
                f,
                "categorical column {column} does not exist, the model has {columns}"
            ),
            MlErr::Rand(s) => write!(f, "failed to build a distribution: {s}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Shape(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShapeError> for MlErr {
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}

impl From<NormalError> for MlErr {
    fn from(value: NormalError) -> Self {
        Self::Rand(value.to_string())
    }
}

impl From<UniformError> for MlErr {
    fn from(value: UniformError) -> Self {
        Self::Rand(value.to_string())
    }
}
