//! Turning raw frames into the batches of a training or validation step.

use machine_learning::arch::Model;
use rand::{Rng, seq::SliceRandom};
use tabular::{FeatureRegistry, Frame, ScaledFrame, SwapNoise};

use crate::{
    Result,
    encoding::{self, EncodedInput},
};

/// How a raw frame is preprocessed into a `Batch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchMode {
    /// Rows are shuffled and only the corrupted input is built.
    #[default]
    Training,
    /// Rows keep their order and the uncorrupted input and corrupted targets are built too.
    Validation,
}

/// The tensors of one step.
#[derive(Debug, Clone)]
pub struct Batch {
    /// The model input built from the swap noise corrupted frame.
    pub input_swapped: EncodedInput,
    /// The uncorrupted frame, what the model has to reconstruct.
    pub target: ScaledFrame,
    pub size: usize,
    /// The model input built from the uncorrupted frame, validation only.
    pub input_original: Option<EncodedInput>,
    /// The corrupted frame itself, validation only.
    pub swapped: Option<ScaledFrame>,
}

/// Scales and codes a raw frame with the registry.
pub fn prepare(registry: &FeatureRegistry, frame: &Frame) -> Result<ScaledFrame> {
    Ok(registry.transform(frame)?)
}

/// Builds the batch of a step.
///
/// # Arguments
/// * `registry` - The fitted features.
/// * `model` - The built model, whose embeddings encode the categorical columns.
/// * `noise` - The corruption applied to the input.
/// * `frame` - The raw rows of the batch.
/// * `mode` - Whether this is a training or a validation step.
/// * `rng` - Drives both the row shuffle and the noise.
pub fn build_batch<M, R>(
    registry: &FeatureRegistry,
    model: &M,
    noise: &SwapNoise,
    frame: &Frame,
    mode: BatchMode,
    rng: &mut R,
) -> Result<Batch>
where
    M: Model + ?Sized,
    R: Rng,
{
    let mut scaled = prepare(registry, frame)?;
    let size = scaled.nrows();

    if mode == BatchMode::Training {
        let mut rows: Vec<usize> = (0..size).collect();
        rows.shuffle(rng);
        scaled = scaled.take(&rows);
    }

    let swapped = noise.corrupt(&scaled, rng);
    let input_swapped = encoding::encode(model, &swapped)?;

    let (input_original, swapped) = match mode {
        BatchMode::Training => (None, None),
        BatchMode::Validation => (Some(encoding::encode(model, &scaled)?), Some(swapped)),
    };

    Ok(Batch {
        input_swapped,
        target: scaled,
        size,
        input_original,
        swapped,
    })
}
