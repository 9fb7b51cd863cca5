use ndarray::Array2;
use rand::Rng;

use crate::ScaledFrame;

/// Swap noise: every cell is independently replaced, with probability `probability`, by the
/// value of the same column in a uniformly drawn row.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SwapNoise {
    probability: f64,
}

impl SwapNoise {
    /// Creates a new `SwapNoise`, `probability` is clamped into `[0, 1]` and `NaN` disables it.
    pub fn new(probability: f64) -> Self {
        let probability = if probability.is_nan() {
            0.
        } else {
            probability.clamp(0., 1.)
        };

        Self { probability }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Returns a corrupted copy of `frame`.
    ///
    /// Replacement values are drawn from the uncorrupted column, with replacement, so a cell
    /// may be "swapped" with itself.
    pub fn corrupt<R: Rng>(&self, frame: &ScaledFrame, rng: &mut R) -> ScaledFrame {
        let mut corrupted = frame.clone();
        if self.probability == 0. || frame.nrows() == 0 {
            return corrupted;
        }

        self.swap_dense(&frame.numeric, &mut corrupted.numeric, rng);
        self.swap_dense(&frame.binary, &mut corrupted.binary, rng);

        for (codes, out) in frame.categorical.iter().zip(&mut corrupted.categorical) {
            for cell in out.iter_mut() {
                if rng.random_bool(self.probability) {
                    *cell = codes[rng.random_range(0..codes.len())];
                }
            }
        }

        corrupted
    }

    fn swap_dense<R: Rng>(&self, src: &Array2<f32>, out: &mut Array2<f32>, rng: &mut R) {
        let rows = src.nrows();

        for (col, mut out_col) in out.columns_mut().into_iter().enumerate() {
            for cell in out_col.iter_mut() {
                if rng.random_bool(self.probability) {
                    *cell = src[[rng.random_range(0..rows), col]];
                }
            }
        }
    }
}
