use ndarray::{Array2, ArrayView2};

use super::{FeatureLayout, ModelOutput, ParamGroup};
use crate::Result;

/// A trainable function from an encoded tabular row to one output per feature-type head.
///
/// Parameters and gradients are exposed as flat buffers so optimizers and collectives can work on
/// them without knowing the model's structure.
pub trait Model {
    /// Allocates and initializes the model's parameters for the given layout.
    ///
    /// # Returns
    /// An error if the model was already built or the layout is invalid.
    fn build(&mut self, layout: &FeatureLayout) -> Result<()>;

    /// Whether `build` has already been called.
    fn is_built(&self) -> bool;

    /// Embeds the codes of a categorical column.
    ///
    /// # Arguments
    /// * `column` - The index of the categorical column in the layout.
    /// * `codes` - One code per row.
    ///
    /// # Returns
    /// One embedding per row.
    fn embed(&self, column: usize, codes: &[usize]) -> Result<Array2<f32>>;

    /// Makes a forward pass over an encoded batch.
    fn forward(&mut self, x: ArrayView2<f32>) -> Result<ModelOutput>;

    /// Backpropagates the gradient of the loss with respect to the last `forward` outputs.
    ///
    /// # Arguments
    /// * `grad` - The gradient of the loss with respect to every head.
    /// * `codes` - The categorical codes that were embedded to build the forwarded input, one
    ///   vector per categorical column.
    fn backward(&mut self, grad: ModelOutput, codes: &[Vec<usize>]) -> Result<()>;

    /// Returns the parameters and their gradient.
    fn parameters(&mut self) -> (&mut [f32], &mut [f32]);

    /// Sets the whole gradient to zero.
    fn zero_grad(&mut self);

    /// Names the regions of the parameter buffer.
    fn param_groups(&self) -> Vec<ParamGroup>;

    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;
}
