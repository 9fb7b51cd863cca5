mod dense;
mod embedding;

pub use dense::Dense;
pub use embedding::Embedding;

use ndarray::Array2;

/// Reuses `buf`'s allocation when it already has the requested shape, otherwise replaces it with
/// a zeroed array of that shape.
fn reshape_buf(buf: &mut Array2<f32>, shape: (usize, usize)) {
    if buf.dim() != shape {
        *buf = Array2::zeros(shape);
    }
}
