//! Sources of raw training and evaluation batches.

mod dataset;
mod loader;
mod shard;

use tabular::Frame;

pub use dataset::FrameDataset;
pub use loader::ShardedLoader;
pub use shard::{ShardSpec, shard_range};

use crate::preprocessing::BatchMode;

/// Yields the raw frame batches of an epoch.
pub trait BatchSource {
    /// The amount of batches of an epoch.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Prepares the batches of `epoch`, sources that shuffle reseed here.
    fn set_epoch(&mut self, epoch: usize);

    /// How the batches of this source are meant to be preprocessed.
    fn mode(&self) -> BatchMode;

    /// Returns the batch at `index`, `None` past the end of the epoch.
    fn batch(&self, index: usize) -> Option<Frame>;
}

/// The forms training data may be handed to `AutoEncoder::fit` in.
#[derive(Debug, Clone)]
pub enum TrainData {
    /// A raw frame, served in training batches of the configured size.
    Frame(Frame),
    Dataset(FrameDataset),
    Loader(ShardedLoader),
}

impl TrainData {
    /// The whole underlying data.
    pub fn frame(&self) -> &Frame {
        match self {
            TrainData::Frame(frame) => frame,
            TrainData::Dataset(dataset) => dataset.frame(),
            TrainData::Loader(loader) => loader.dataset().frame(),
        }
    }

    /// The batches `fit` iterates over, raw frames are split into `batch_size` rows in `mode`.
    pub fn into_batches(self, batch_size: usize, mode: BatchMode) -> Batches {
        match self {
            TrainData::Frame(frame) => Batches::Dataset(FrameDataset::new(frame, batch_size, mode)),
            TrainData::Dataset(dataset) => Batches::Dataset(dataset),
            TrainData::Loader(loader) => Batches::Loader(loader),
        }
    }
}

impl From<Frame> for TrainData {
    fn from(value: Frame) -> Self {
        TrainData::Frame(value)
    }
}

impl From<FrameDataset> for TrainData {
    fn from(value: FrameDataset) -> Self {
        TrainData::Dataset(value)
    }
}

impl From<ShardedLoader> for TrainData {
    fn from(value: ShardedLoader) -> Self {
        TrainData::Loader(value)
    }
}

/// Training data ready to be iterated in batches.
#[derive(Debug, Clone)]
pub enum Batches {
    Dataset(FrameDataset),
    Loader(ShardedLoader),
}

impl Batches {
    /// The whole data, unsharded and served for evaluation.
    pub fn into_validation(self) -> FrameDataset {
        match self {
            Batches::Dataset(dataset) => dataset.into_validation(),
            Batches::Loader(loader) => loader.into_dataset().into_validation(),
        }
    }
}

impl BatchSource for Batches {
    fn len(&self) -> usize {
        match self {
            Batches::Dataset(dataset) => dataset.len(),
            Batches::Loader(loader) => loader.len(),
        }
    }

    fn set_epoch(&mut self, epoch: usize) {
        match self {
            Batches::Dataset(dataset) => dataset.set_epoch(epoch),
            Batches::Loader(loader) => loader.set_epoch(epoch),
        }
    }

    fn mode(&self) -> BatchMode {
        match self {
            Batches::Dataset(dataset) => dataset.mode(),
            Batches::Loader(loader) => loader.mode(),
        }
    }

    fn batch(&self, index: usize) -> Option<Frame> {
        match self {
            Batches::Dataset(dataset) => dataset.batch(index),
            Batches::Loader(loader) => loader.batch(index),
        }
    }
}

#[cfg(test)]
mod tests {
    use tabular::Column;

    use super::*;

    fn frame(rows: usize) -> Frame {
        let values: Vec<f64> = (0..rows).map(|i| i as f64).collect();
        Frame::from_columns([("x", Column::from(values))]).unwrap()
    }

    #[test]
    fn raw_frames_are_split_into_batches() {
        let batches = TrainData::from(frame(70)).into_batches(32, BatchMode::Training);

        assert_eq!(batches.len(), 3);
        assert_eq!(batches.mode(), BatchMode::Training);
        assert_eq!(batches.batch(2).map(|b| b.nrows()), Some(6));
        assert!(batches.batch(3).is_none());
    }

    #[test]
    fn prepared_datasets_keep_their_batch_size() {
        let dataset = FrameDataset::validation(frame(70), 50);
        let batches = TrainData::from(dataset).into_batches(32, BatchMode::Training);

        assert_eq!(batches.len(), 2);
        assert_eq!(batches.mode(), BatchMode::Validation);
        assert_eq!(batches.into_validation().batch_size(), 50);
    }
}
