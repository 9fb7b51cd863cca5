use tabular::Frame;

use super::BatchSource;
use crate::preprocessing::BatchMode;

/// An in-memory frame served in contiguous batches.
#[derive(Debug, Clone)]
pub struct FrameDataset {
    frame: Frame,
    batch_size: usize,
    mode: BatchMode,
}

impl FrameDataset {
    /// Creates a new `FrameDataset`, a zero `batch_size` is treated as one.
    pub fn new(frame: Frame, batch_size: usize, mode: BatchMode) -> Self {
        Self {
            frame,
            batch_size: batch_size.max(1),
            mode,
        }
    }

    pub fn training(frame: Frame, batch_size: usize) -> Self {
        Self::new(frame, batch_size, BatchMode::Training)
    }

    pub fn validation(frame: Frame, batch_size: usize) -> Self {
        Self::new(frame, batch_size, BatchMode::Validation)
    }

    /// The same data served for evaluation: unshuffled, with the uncorrupted input kept.
    pub fn into_validation(self) -> Self {
        Self {
            mode: BatchMode::Validation,
            ..self
        }
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn rows(&self) -> usize {
        self.frame.nrows()
    }
}

impl BatchSource for FrameDataset {
    fn len(&self) -> usize {
        self.rows().div_ceil(self.batch_size)
    }

    fn set_epoch(&mut self, _epoch: usize) {}

    fn mode(&self) -> BatchMode {
        self.mode
    }

    fn batch(&self, index: usize) -> Option<Frame> {
        let start = index.checked_mul(self.batch_size)?;
        if start >= self.rows() {
            return None;
        }

        let end = (start + self.batch_size).min(self.rows());
        Some(self.frame.slice(start..end))
    }
}
