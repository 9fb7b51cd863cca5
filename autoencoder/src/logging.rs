//! Sinks for the per step losses of training and validation.

use std::{
    fs::File,
    io::{BufWriter, Write},
};

use log::info;
use serde::Serialize;

use crate::{Result, config::LoggerSpec};

/// Which pass a step's losses come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Training,
    /// The corrupted validation input.
    Validation,
    /// The uncorrupted validation input.
    IdentityValidation,
}

/// Receives the per column losses of every step.
pub trait LossLogger {
    /// Records the losses of one step, one per column in registry order.
    fn record_step(&mut self, kind: StepKind, losses: &[f32]);

    /// Closes the current epoch.
    fn end_epoch(&mut self) -> Result<()>;

    /// Records the loss of echoing the corrupted validation input.
    fn set_baseline(&mut self, loss: f32);
}

/// Running per column sums of the steps of one kind.
#[derive(Debug, Clone, Default)]
struct Accumulator {
    sums: Vec<f64>,
    steps: usize,
}

impl Accumulator {
    fn add(&mut self, losses: &[f32]) {
        if self.sums.len() < losses.len() {
            self.sums.resize(losses.len(), 0.);
        }

        for (sum, &loss) in self.sums.iter_mut().zip(losses) {
            *sum += loss as f64;
        }
        self.steps += 1;
    }

    fn take(&mut self) -> Option<Vec<f32>> {
        let Accumulator { sums, steps } = std::mem::take(self);
        (steps > 0).then(|| sums.into_iter().map(|s| (s / steps as f64) as f32).collect())
    }
}

/// The mean losses of one epoch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpochSummary {
    pub epoch: usize,
    /// Per column mean over the epoch's training steps.
    pub training: Option<Vec<f32>>,
    pub validation: Option<Vec<f32>>,
    pub identity_validation: Option<Vec<f32>>,
}

impl EpochSummary {
    fn net(losses: &Option<Vec<f32>>) -> Option<f32> {
        losses
            .as_ref()
            .filter(|l| !l.is_empty())
            .map(|l| l.iter().sum::<f32>() / l.len() as f32)
    }

    pub fn training_loss(&self) -> Option<f32> {
        Self::net(&self.training)
    }

    pub fn validation_loss(&self) -> Option<f32> {
        Self::net(&self.validation)
    }

    pub fn identity_validation_loss(&self) -> Option<f32> {
        Self::net(&self.identity_validation)
    }
}

/// The loss history shared by every logger variant.
#[derive(Debug, Clone, Default)]
pub struct History {
    training: Accumulator,
    validation: Accumulator,
    identity_validation: Accumulator,
    epochs: Vec<EpochSummary>,
    baseline: Option<f32>,
}

impl History {
    fn record(&mut self, kind: StepKind, losses: &[f32]) {
        match kind {
            StepKind::Training => self.training.add(losses),
            StepKind::Validation => self.validation.add(losses),
            StepKind::IdentityValidation => self.identity_validation.add(losses),
        }
    }

    fn close_epoch(&mut self) -> &EpochSummary {
        let summary = EpochSummary {
            epoch: self.epochs.len(),
            training: self.training.take(),
            validation: self.validation.take(),
            identity_validation: self.identity_validation.take(),
        };

        self.epochs.push(summary);
        &self.epochs[self.epochs.len() - 1]
    }

    pub fn epochs(&self) -> &[EpochSummary] {
        &self.epochs
    }

    pub fn baseline(&self) -> Option<f32> {
        self.baseline
    }
}

/// The logger variants, selected by `LoggerSpec`.
#[derive(Debug)]
pub enum Logger {
    /// Only keeps the history.
    Basic(History),
    /// Also reports every epoch through the `log` facade.
    Console(History),
    /// Also appends every epoch to a JSON lines file.
    Metrics {
        history: History,
        out: BufWriter<File>,
    },
}

impl Logger {
    /// Creates the logger a spec describes.
    ///
    /// # Returns
    /// An io error if the metrics file can't be created.
    pub fn from_spec(spec: &LoggerSpec) -> Result<Self> {
        let logger = match spec {
            LoggerSpec::Basic => Logger::Basic(History::default()),
            LoggerSpec::Console => Logger::Console(History::default()),
            LoggerSpec::Metrics { path } => Logger::Metrics {
                history: History::default(),
                out: BufWriter::new(File::create(path)?),
            },
        };

        Ok(logger)
    }

    pub fn history(&self) -> &History {
        match self {
            Logger::Basic(history) | Logger::Console(history) => history,
            Logger::Metrics { history, .. } => history,
        }
    }

    fn history_mut(&mut self) -> &mut History {
        match self {
            Logger::Basic(history) | Logger::Console(history) => history,
            Logger::Metrics { history, .. } => history,
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Logger::Basic(History::default())
    }
}

#[derive(Serialize)]
struct MetricsLine<'a> {
    #[serde(flatten)]
    summary: &'a EpochSummary,
    training_loss: Option<f32>,
    validation_loss: Option<f32>,
    identity_validation_loss: Option<f32>,
    baseline: Option<f32>,
}

impl LossLogger for Logger {
    fn record_step(&mut self, kind: StepKind, losses: &[f32]) {
        self.history_mut().record(kind, losses);
    }

    fn end_epoch(&mut self) -> Result<()> {
        match self {
            Logger::Basic(history) => {
                history.close_epoch();
            }
            Logger::Console(history) => {
                let summary = history.close_epoch();
                let fmt = |loss: Option<f32>| loss.map_or("-".to_string(), |l| format!("{l:.4}"));

                info!(
                    "epoch {}: training loss {}, validation loss {}, identity loss {}",
                    summary.epoch + 1,
                    fmt(summary.training_loss()),
                    fmt(summary.validation_loss()),
                    fmt(summary.identity_validation_loss()),
                );
            }
            Logger::Metrics { history, out } => {
                let baseline = history.baseline;
                let summary = history.close_epoch();
                let line = MetricsLine {
                    summary,
                    training_loss: summary.training_loss(),
                    validation_loss: summary.validation_loss(),
                    identity_validation_loss: summary.identity_validation_loss(),
                    baseline,
                };

                serde_json::to_writer(&mut *out, &line)?;
                writeln!(out)?;
                out.flush()?;
            }
        }

        Ok(())
    }

    fn set_baseline(&mut self, loss: f32) {
        self.history_mut().baseline = Some(loss);
    }
}
