use std::{num::NonZeroUsize, ops::Range};

use crate::{AutoEncoderErr, Result};

/// Splits `total` samples among `world_size` ranks and returns the shard of `rank`.
///
/// Ranges are contiguous, disjoint and cover `0..total`, their sizes differ by at most one.
pub fn shard_range(total: usize, rank: usize, world_size: usize) -> Range<usize> {
    let base = total / world_size;
    let rem = total % world_size;

    let start = rank * base + rank.min(rem);
    let extra = if rank < rem { 1 } else { 0 };
    let end = start + base + extra;

    start..end
}

/// The shard of the data a rank trains on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardSpec {
    pub rank: usize,
    pub world_size: NonZeroUsize,
}

impl ShardSpec {
    /// Creates a new `ShardSpec`.
    ///
    /// # Returns
    /// An `InvalidArgument` error if `world_size` is zero or `rank` is not below it.
    pub fn new(rank: usize, world_size: usize) -> Result<Self> {
        let world_size = NonZeroUsize::new(world_size).ok_or_else(|| {
            AutoEncoderErr::InvalidArgument("world_size must be positive".to_string())
        })?;

        if rank >= world_size.get() {
            return Err(AutoEncoderErr::InvalidArgument(format!(
                "rank {rank} out of range for world size {world_size}"
            )));
        }

        Ok(Self { rank, world_size })
    }

    /// A single rank owning all of the data.
    pub fn whole() -> Self {
        Self {
            rank: 0,
            world_size: NonZeroUsize::MIN,
        }
    }

    #[inline]
    pub fn range(self, total: usize) -> Range<usize> {
        shard_range(total, self.rank, self.world_size.get())
    }

    /// The smallest multiple of the world size not below `total`, what every rank's shard is
    /// padded to so all of them run the same amount of steps.
    pub fn padded_len(self, total: usize) -> usize {
        total.div_ceil(self.world_size.get()) * self.world_size.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_range_balanced() {
        // total 10, ranks 3 => sizes 4,3,3
        assert_eq!(shard_range(10, 0, 3), 0..4);
        assert_eq!(shard_range(10, 1, 3), 4..7);
        assert_eq!(shard_range(10, 2, 3), 7..10);
    }

    #[test]
    fn padded_shards_are_equal() {
        let spec = ShardSpec::new(1, 3).unwrap();

        assert_eq!(spec.padded_len(10), 12);
        assert_eq!(spec.range(12), 4..8);
    }

    #[test]
    fn rank_out_of_range_is_rejected() {
        assert!(ShardSpec::new(3, 3).is_err());
        assert!(ShardSpec::new(0, 0).is_err());
    }
}
