use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Categorical cross entropy between raw logits and integer class codes.
#[derive(Default, Clone, Copy)]
pub struct CrossEntropy;

impl CrossEntropy {
    /// Returns a new `CrossEntropy`.
    pub fn new() -> Self {
        Self
    }

    /// Computes the loss of every row.
    ///
    /// # Arguments
    /// * `logits` - One row of unnormalized class scores per sample.
    /// * `codes` - The target class of every row, must be lower than `logits.ncols()`.
    ///
    /// # Returns
    /// The per-row negative log likelihood.
    pub fn loss(&self, logits: ArrayView2<f32>, codes: &[usize]) -> Array1<f32> {
        logits
            .axis_iter(Axis(0))
            .zip(codes)
            .map(|(row, &code)| {
                let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
                let lse = row.fold(0., |acc, &v| acc + (v - max).exp()).ln() + max;
                lse - row[code]
            })
            .collect()
    }

    /// Computes the gradient of the mean row loss with respect to the logits, that is
    /// `(softmax(logits) - onehot(codes)) / rows`.
    pub fn loss_prime(&self, logits: ArrayView2<f32>, codes: &[usize]) -> Array2<f32> {
        let n = logits.nrows().max(1) as f32;
        let mut grad = logits.to_owned();

        for (mut row, &code) in grad.axis_iter_mut(Axis(0)).zip(codes) {
            let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
            row.mapv_inplace(|v| (v - max).exp());
            let sum = row.sum();
            row.mapv_inplace(|v| v / sum);
            row[code] -= 1.;
            row.mapv_inplace(|v| v / n);
        }

        grad
    }
}
