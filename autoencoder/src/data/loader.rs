use log::debug;
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use tabular::Frame;

use super::{BatchSource, FrameDataset, ShardSpec};
use crate::preprocessing::BatchMode;

/// Serves one rank's shard of a `FrameDataset`.
///
/// Every epoch the rows are permuted with a generator seeded by `seed + epoch`, so all ranks
/// agree on the permutation without communicating. The permutation is padded by wrapping around
/// to a multiple of the world size, which gives every rank the same amount of batches.
#[derive(Debug, Clone)]
pub struct ShardedLoader {
    dataset: FrameDataset,
    shard: ShardSpec,
    seed: u64,
    indices: Vec<usize>,
}

impl ShardedLoader {
    /// Creates a new `ShardedLoader` positioned at epoch zero.
    ///
    /// # Arguments
    /// * `dataset` - The whole data, identical on every rank.
    /// * `shard` - The rank this loader serves.
    /// * `seed` - The seed shared by every rank.
    pub fn new(dataset: FrameDataset, shard: ShardSpec, seed: u64) -> Self {
        let mut loader = Self {
            dataset,
            shard,
            seed,
            indices: Vec::new(),
        };

        loader.set_epoch(0);
        loader
    }

    #[inline]
    pub fn shard(&self) -> ShardSpec {
        self.shard
    }

    pub fn dataset(&self) -> &FrameDataset {
        &self.dataset
    }

    /// Drops the sharding, giving back the whole dataset.
    pub fn into_dataset(self) -> FrameDataset {
        self.dataset
    }

    /// The rows of the dataset this rank serves in the current epoch, in order.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}

impl BatchSource for ShardedLoader {
    fn len(&self) -> usize {
        self.indices.len().div_ceil(self.dataset.batch_size())
    }

    fn set_epoch(&mut self, epoch: usize) {
        let total = self.dataset.rows();

        let mut order: Vec<usize> = (0..total).collect();
        if self.dataset.mode() == BatchMode::Training {
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(epoch as u64));
            order.shuffle(&mut rng);
        }

        if total > 0 {
            let padded = self.shard.padded_len(total);
            let mut i = 0;
            while order.len() < padded {
                order.push(order[i]);
                i += 1;
            }
        }

        let range = self.shard.range(order.len());
        self.indices = order[range].to_vec();

        debug!(
            rank = self.shard.rank,
            epoch = epoch,
            rows = self.indices.len();
            "sharded epoch"
        );
    }

    fn mode(&self) -> BatchMode {
        self.dataset.mode()
    }

    fn batch(&self, index: usize) -> Option<Frame> {
        let size = self.dataset.batch_size();
        let start = index.checked_mul(size)?;
        if start >= self.indices.len() {
            return None;
        }

        let end = (start + size).min(self.indices.len());
        Some(self.dataset.frame().take(&self.indices[start..end]))
    }
}

#[cfg(test)]
mod tests {
    use tabular::Column;

    use super::*;

    fn dataset(rows: usize) -> FrameDataset {
        let xs: Vec<i64> = (0..rows as i64).collect();
        let frame = Frame::from_columns([("x", Column::from(xs))]).unwrap();
        FrameDataset::training(frame, 2)
    }

    #[test]
    fn ranks_cover_every_row_with_equal_batches() {
        let loaders: Vec<_> = (0..3)
            .map(|rank| ShardedLoader::new(dataset(10), ShardSpec::new(rank, 3).unwrap(), 7))
            .collect();

        for loader in &loaders {
            assert_eq!(loader.indices().len(), 4);
            assert_eq!(loader.len(), 2);
        }

        let mut seen: Vec<usize> = loaders.iter().flat_map(|l| l.indices().to_vec()).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn epochs_reshuffle_deterministically() {
        let mut a = ShardedLoader::new(dataset(50), ShardSpec::whole(), 1);
        let mut b = ShardedLoader::new(dataset(50), ShardSpec::whole(), 1);

        a.set_epoch(3);
        b.set_epoch(3);
        assert_eq!(a.indices(), b.indices());

        let third = a.indices().to_vec();
        a.set_epoch(4);
        assert_ne!(a.indices(), third.as_slice());
    }

    #[test]
    fn validation_data_keeps_its_order() {
        let loader = ShardedLoader::new(dataset(4).into_validation(), ShardSpec::whole(), 1);
        assert_eq!(loader.indices(), [0, 1, 2, 3]);
    }
}
