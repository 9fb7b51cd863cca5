use ndarray::{Array2, Axis};

/// A batch after the feature registry's transform: numeric columns scaled, binary columns as
/// 0/1 and categorical columns as class codes.
///
/// Column order follows the registry. The same struct doubles as the reconstruction target of a
/// batch.
#[derive(Clone, Debug, PartialEq)]
pub struct ScaledFrame {
    pub numeric: Array2<f32>,
    pub binary: Array2<f32>,
    /// One vector of codes per categorical column.
    pub categorical: Vec<Vec<usize>>,
}

impl ScaledFrame {
    pub fn nrows(&self) -> usize {
        self.numeric.nrows()
    }

    /// Gathers the given rows into a new frame.
    pub fn take(&self, rows: &[usize]) -> ScaledFrame {
        ScaledFrame {
            numeric: self.numeric.select(Axis(0), rows),
            binary: self.binary.select(Axis(0), rows),
            categorical: self
                .categorical
                .iter()
                .map(|codes| rows.iter().map(|&r| codes[r]).collect())
                .collect(),
        }
    }
}
