use std::ops::Range;

use ndarray::Array2;

/// The shape of the tabular data a model is built for.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeatureLayout {
    /// The amount of numeric columns.
    pub numeric: usize,
    /// The amount of binary columns.
    pub binary: usize,
    /// The amount of classes of every categorical column, the reserved `_other` class included.
    pub categorical: Vec<usize>,
}

impl FeatureLayout {
    pub fn new(numeric: usize, binary: usize, categorical: Vec<usize>) -> Self {
        Self {
            numeric,
            binary,
            categorical,
        }
    }
}

/// One tensor per feature-type head.
///
/// The same struct carries the model's outputs and the gradients of the loss with respect to
/// them.
#[derive(Clone, Debug)]
pub struct ModelOutput {
    pub numeric: Array2<f32>,
    pub binary: Array2<f32>,
    pub categorical: Vec<Array2<f32>>,
}

impl ModelOutput {
    /// The amount of rows of the batch this output belongs to.
    pub fn rows(&self) -> usize {
        self.numeric.nrows()
    }
}

/// A named contiguous range of a model's flat parameter buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamGroup {
    pub name: String,
    pub range: Range<usize>,
}
