//! Process group primitives and the cross rank decisions built on them.

use std::{
    ops::Range,
    sync::{Arc, Barrier},
};

use log::debug;
use machine_learning::arch::{FeatureLayout, ParamGroup};
use parking_lot::Mutex;

use crate::{AutoEncoderErr, Result};

/// A group of ranks training the same model on different shards of the data.
///
/// Every operation is collective: all ranks must call it, in the same order, or the group
/// deadlocks.
pub trait Collective: Send + Sync {
    fn rank(&self) -> usize;

    fn world_size(&self) -> usize;

    /// Gathers one flag from every rank, indexed by rank.
    fn all_gather_flag(&self, flag: bool) -> Result<Vec<bool>>;

    /// Replaces `buf` on every rank with the elementwise mean of all the ranks' buffers.
    fn all_reduce_mean(&self, buf: &mut [f32]) -> Result<()>;

    /// Replaces `buf` on every rank with the leader's buffer.
    fn broadcast(&self, buf: &mut [f32]) -> Result<()>;
}

/// The group of a single rank, every collective is the identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalGroup;

impl Collective for LocalGroup {
    fn rank(&self) -> usize {
        0
    }

    fn world_size(&self) -> usize {
        1
    }

    fn all_gather_flag(&self, flag: bool) -> Result<Vec<bool>> {
        Ok(vec![flag])
    }

    fn all_reduce_mean(&self, _buf: &mut [f32]) -> Result<()> {
        Ok(())
    }

    fn broadcast(&self, _buf: &mut [f32]) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
struct Shared {
    barrier: Barrier,
    flags: Mutex<Vec<bool>>,
    slots: Mutex<Vec<Vec<f32>>>,
    reduced: Mutex<Option<Vec<f32>>>,
}

/// A process group whose ranks are threads of the same process.
///
/// Ranks write into shared slots, the leader (rank 0) reduces them and every rank reads the
/// result back. Barriers separate the phases.
#[derive(Debug, Clone)]
pub struct ThreadGroup {
    rank: usize,
    world_size: usize,
    shared: Arc<Shared>,
}

impl ThreadGroup {
    /// Creates the handles of every rank of a new group, to be moved into one thread each.
    pub fn new(world_size: usize) -> Vec<ThreadGroup> {
        let world_size = world_size.max(1);
        let shared = Arc::new(Shared {
            barrier: Barrier::new(world_size),
            flags: Mutex::new(vec![false; world_size]),
            slots: Mutex::new(vec![Vec::new(); world_size]),
            reduced: Mutex::new(None),
        });

        (0..world_size)
            .map(|rank| ThreadGroup {
                rank,
                world_size,
                shared: Arc::clone(&shared),
            })
            .collect()
    }

    fn is_leader(&self) -> bool {
        self.rank == 0
    }

    /// Copies the buffer the leader left in the shared result into `buf`.
    fn read_result(&self, buf: &mut [f32], mismatch: &str) -> Result<()> {
        let result = match self.shared.reduced.lock().as_deref() {
            Some(shared) if shared.len() == buf.len() => {
                buf.copy_from_slice(shared);
                Ok(())
            }
            _ => Err(AutoEncoderErr::Collective(mismatch.to_string())),
        };
        self.shared.barrier.wait();

        result
    }
}

impl Collective for ThreadGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }

    fn all_gather_flag(&self, flag: bool) -> Result<Vec<bool>> {
        self.shared.flags.lock()[self.rank] = flag;
        self.shared.barrier.wait();

        let flags = self.shared.flags.lock().clone();
        self.shared.barrier.wait();

        Ok(flags)
    }

    fn all_reduce_mean(&self, buf: &mut [f32]) -> Result<()> {
        self.shared.slots.lock()[self.rank] = buf.to_vec();
        self.shared.barrier.wait();

        if self.is_leader() {
            let slots = self.shared.slots.lock();
            let reduced = slots
                .iter()
                .all(|slot| slot.len() == buf.len())
                .then(|| {
                    let mut mean = vec![0.; buf.len()];
                    for slot in slots.iter() {
                        for (m, &x) in mean.iter_mut().zip(slot) {
                            *m += x;
                        }
                    }
                    mean.iter_mut().for_each(|m| *m /= self.world_size as f32);
                    mean
                });

            *self.shared.reduced.lock() = reduced;
        }
        self.shared.barrier.wait();

        self.read_result(buf, "ranks reduced buffers of different lengths")
    }

    fn broadcast(&self, buf: &mut [f32]) -> Result<()> {
        if self.is_leader() {
            *self.shared.reduced.lock() = Some(buf.to_vec());
        }
        self.shared.barrier.wait();

        self.read_result(buf, "the leader broadcast a buffer of a different length")
    }
}

/// Keeps the parameter groups that take part in training identical across ranks.
///
/// Replicas start from the leader's parameters and then average their gradients every step.
/// The output heads of feature types without columns never receive a gradient, they are left
/// out of both exchanges.
#[derive(Debug, Clone)]
pub struct GradientSync {
    ranges: Vec<Range<usize>>,
}

impl GradientSync {
    /// Creates a new `GradientSync`.
    ///
    /// # Arguments
    /// * `groups` - The named regions of the model's parameter buffer.
    /// * `layout` - The layout the model was built for.
    pub fn new(groups: &[ParamGroup], layout: &FeatureLayout) -> Self {
        let unused = |name: &str| {
            (layout.numeric == 0 && name.starts_with("numeric_output"))
                || (layout.binary == 0 && name.starts_with("binary_output"))
        };

        let ranges: Vec<_> = groups
            .iter()
            .filter(|group| !unused(&group.name))
            .map(|group| group.range.clone())
            .collect();

        debug!(groups = ranges.len(); "gradient sync prepared");
        Self { ranges }
    }

    /// The amount of synchronized parameters.
    pub fn len(&self) -> usize {
        self.ranges.iter().map(|r| r.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn pack(&self, buf: &[f32]) -> Vec<f32> {
        let mut packed = Vec::with_capacity(self.len());
        for range in &self.ranges {
            packed.extend_from_slice(&buf[range.clone()]);
        }
        packed
    }

    fn unpack(&self, packed: &[f32], buf: &mut [f32]) {
        let mut offset = 0;
        for range in &self.ranges {
            let len = range.len();
            buf[range.clone()].copy_from_slice(&packed[offset..offset + len]);
            offset += len;
        }
    }

    /// Replaces the synchronized regions of `grad` with their mean across ranks.
    pub fn apply(&self, collective: &dyn Collective, grad: &mut [f32]) -> Result<()> {
        if collective.world_size() <= 1 {
            return Ok(());
        }

        let mut packed = self.pack(grad);
        collective.all_reduce_mean(&mut packed)?;
        self.unpack(&packed, grad);

        Ok(())
    }

    /// Overwrites the synchronized regions of `params` with the leader's.
    ///
    /// Called once, right after the model is built, so every replica starts from the same
    /// weights however they were initialized.
    pub fn broadcast_params(&self, collective: &dyn Collective, params: &mut [f32]) -> Result<()> {
        if collective.world_size() <= 1 {
            return Ok(());
        }

        let mut packed = self.pack(params);
        collective.broadcast(&mut packed)?;
        self.unpack(&packed, params);

        debug!(rank = collective.rank(), params = packed.len(); "parameters taken from the leader");
        Ok(())
    }
}

/// Counts the consecutive epochs the validation loss went up.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    count: usize,
    last: f32,
}

impl EarlyStopping {
    /// Creates a new `EarlyStopping`, a zero `patience` never stops.
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            count: 0,
            last: f32::INFINITY,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.patience > 0
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Records an epoch's validation loss.
    ///
    /// A loss above the previous one increments the counter, an equal or lower one resets it.
    ///
    /// # Returns
    /// Whether the counter reached the patience.
    pub fn observe(&mut self, loss: f32) -> bool {
        if loss > self.last {
            self.count += 1;
        } else {
            self.count = 0;
        }
        self.last = loss;

        self.is_enabled() && self.count >= self.patience
    }
}

/// Agrees on the leader's early stopping decision.
///
/// Every rank must call this once per epoch, whatever its own decision was.
pub fn synchronize_stop(collective: &dyn Collective, local: bool) -> Result<bool> {
    let flags = collective.all_gather_flag(local)?;

    flags
        .first()
        .copied()
        .ok_or_else(|| AutoEncoderErr::Collective("gathered no flags".to_string()))
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn stops_exactly_at_patience() {
        let mut es = EarlyStopping::new(2);

        assert!(!es.observe(1.0));
        assert!(!es.observe(1.1));
        assert_eq!(es.count(), 1);
        assert!(!es.observe(1.1)); // tie resets
        assert_eq!(es.count(), 0);
        assert!(!es.observe(1.2));
        assert!(es.observe(1.3));
    }

    #[test]
    fn zero_patience_never_stops() {
        let mut es = EarlyStopping::new(0);
        assert!((0..10).all(|i| !es.observe(i as f32)));
    }

    #[test]
    fn thread_group_reduces_and_broadcasts_the_leader_flag() {
        let results: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = ThreadGroup::new(3)
                .into_iter()
                .map(|group| {
                    s.spawn(move || {
                        let mut buf = vec![group.rank() as f32; 2];
                        group.all_reduce_mean(&mut buf).unwrap();

                        let stop = synchronize_stop(&group, group.rank() == 0).unwrap();
                        (buf, stop)
                    })
                })
                .collect();

            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for (buf, stop) in results {
            assert_eq!(buf, [1., 1.]);
            assert!(stop);
        }
    }

    #[test]
    fn broadcast_copies_the_leaders_buffer() {
        let results: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = ThreadGroup::new(3)
                .into_iter()
                .map(|group| {
                    s.spawn(move || {
                        let mut buf = vec![group.rank() as f32 + 1.; 3];
                        group.broadcast(&mut buf).unwrap();
                        buf
                    })
                })
                .collect();

            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(results.iter().all(|buf| buf == &[1., 1., 1.]));
    }

    #[test]
    fn broadcast_of_a_shorter_buffer_fails_on_the_follower() {
        let results: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = ThreadGroup::new(2)
                .into_iter()
                .map(|group| {
                    s.spawn(move || {
                        let mut buf = vec![0.; 2 + group.rank()];
                        group.broadcast(&mut buf).is_ok()
                    })
                })
                .collect();

            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results, [true, false]);
    }

    #[test]
    fn leader_parameters_reach_every_rank_except_unused_heads() {
        let groups = vec![
            ParamGroup {
                name: "encoder.0".into(),
                range: 0..2,
            },
            ParamGroup {
                name: "binary_output".into(),
                range: 2..3,
            },
        ];
        let layout = FeatureLayout::new(1, 0, vec![]);

        let results: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = ThreadGroup::new(2)
                .into_iter()
                .map(|group| {
                    let sync = GradientSync::new(&groups, &layout);
                    s.spawn(move || {
                        let mut params = vec![group.rank() as f32 * 10.; 3];
                        sync.broadcast_params(&group, &mut params).unwrap();
                        params
                    })
                })
                .collect();

            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results[0], [0., 0., 0.]);
        assert_eq!(results[1], [0., 0., 10.]);
    }

    #[test]
    fn gradient_sync_skips_unused_heads() {
        let groups = vec![
            ParamGroup {
                name: "encoder.0".into(),
                range: 0..4,
            },
            ParamGroup {
                name: "numeric_output".into(),
                range: 4..6,
            },
            ParamGroup {
                name: "binary_output".into(),
                range: 6..8,
            },
        ];
        let layout = FeatureLayout::new(0, 1, vec![]);

        assert_eq!(GradientSync::new(&groups, &layout).len(), 6);
    }
}
