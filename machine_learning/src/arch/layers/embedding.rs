use ndarray::prelude::*;

use crate::{MlErr, Result};

/// A lookup table mapping integer codes in `0..cardinality` to dense vectors of width `dim`.
///
/// As with `Dense`, the table lives in a flat slice owned by the model, stored row-major with one
/// row per code.
#[derive(Clone, Debug)]
pub struct Embedding {
    column: usize,
    cardinality: usize,
    dim: usize,
}

impl Embedding {
    /// Creates a new `Embedding`.
    ///
    /// # Arguments
    /// * `column` - The categorical column this table belongs to, used for error reporting.
    /// * `cardinality` - The amount of distinct codes.
    /// * `dim` - The width of each embedding vector.
    ///
    /// # Returns
    /// A new `Embedding` instance.
    pub fn new(column: usize, cardinality: usize, dim: usize) -> Self {
        Self {
            column,
            cardinality,
            dim,
        }
    }

    pub fn size(&self) -> usize {
        self.cardinality * self.dim
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    /// Looks up the vector of every code.
    ///
    /// # Arguments
    /// * `params` - The embedding table.
    /// * `codes` - One code per row.
    ///
    /// # Returns
    /// A `codes.len() x dim` array or an error if a code is out of range.
    pub fn forward(&self, params: &[f32], codes: &[usize]) -> Result<Array2<f32>> {
        let table = self.view_table(params)?;
        let mut out = Array2::zeros((codes.len(), self.dim));

        for (mut row, &code) in out.rows_mut().into_iter().zip(codes) {
            self.check_code(code)?;
            row.assign(&table.row(code));
        }

        Ok(out)
    }

    /// Accumulates `d` into the rows of `grad` selected by `codes`.
    ///
    /// Unlike `Dense::backward` this adds to `grad`, since a code may appear more than once in a
    /// batch.
    pub fn backward(&self, grad: &mut [f32], codes: &[usize], d: ArrayView2<f32>) -> Result<()> {
        if d.nrows() != codes.len() || d.ncols() != self.dim {
            return Err(MlErr::SizeMismatch {
                a: "embedding delta",
                b: "embedding output",
                got: d.len(),
                expected: codes.len() * self.dim,
            });
        }

        if grad.len() != self.size() {
            return Err(MlErr::SizeMismatch {
                a: "gradient",
                b: "embedding table",
                got: grad.len(),
                expected: self.size(),
            });
        }

        let mut table = ArrayViewMut2::from_shape((self.cardinality, self.dim), grad)?;
        for (row, &code) in d.rows().into_iter().zip(codes) {
            self.check_code(code)?;
            let mut target = table.row_mut(code);
            target += &row;
        }

        Ok(())
    }

    fn view_table<'a>(&self, params: &'a [f32]) -> Result<ArrayView2<'a, f32>> {
        if params.len() != self.size() {
            return Err(MlErr::SizeMismatch {
                a: "parameters",
                b: "embedding table",
                got: params.len(),
                expected: self.size(),
            });
        }

        Ok(ArrayView2::from_shape((self.cardinality, self.dim), params)?)
    }

    fn check_code(&self, code: usize) -> Result<()> {
        if code >= self.cardinality {
            return Err(MlErr::CodeOutOfRange {
                column: self.column,
                code,
                cardinality: self.cardinality,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_selects_rows() {
        let emb = Embedding::new(0, 3, 2);
        let params = [0., 1., 10., 11., 20., 21.];

        let out = emb.forward(&params, &[2, 0, 2]).unwrap();
        assert_eq!(out, array![[20., 21.], [0., 1.], [20., 21.]]);
    }

    #[test]
    fn backward_accumulates_repeated_codes() {
        let emb = Embedding::new(0, 3, 2);
        let mut grad = [0.; 6];
        let d = array![[1., 1.], [2., 0.], [0.5, 0.5]];

        emb.backward(&mut grad, &[1, 0, 1], d.view()).unwrap();
        assert_eq!(grad, [2., 0., 1.5, 1.5, 0., 0.]);
    }

    #[test]
    fn out_of_range_code_is_an_error() {
        let emb = Embedding::new(4, 2, 1);
        assert!(matches!(
            emb.forward(&[0., 1.], &[2]),
            Err(MlErr::CodeOutOfRange { column: 4, code: 2, cardinality: 2 })
        ));
    }
}
